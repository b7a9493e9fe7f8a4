//! Key-value snapshot stores (in-memory and libSQL).

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlSnapshotStore;
pub use memory::InMemorySnapshotStore;
pub use traits::SnapshotStore;
