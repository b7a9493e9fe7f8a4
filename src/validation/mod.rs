//! Live field validation — debounced uniqueness checks against a remote
//! availability source.

pub mod checker;
pub mod debounce;
pub mod http;
pub mod status;

pub use checker::{Availability, InMemoryUniquenessChecker, UniquenessChecker};
pub use debounce::DebouncedValidator;
pub use http::HttpUniquenessChecker;
pub use status::{FieldKind, FieldValidationStatus};
