//! `SnapshotStore` trait — minimal async key-value persistence for workflow
//! snapshots.

use async_trait::async_trait;

use crate::error::StoreError;

/// Backend-agnostic string key-value store.
///
/// Keys are chosen by the caller and must not collide across workflow
/// kinds or sessions. `get` and `delete` on a missing key are not errors.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite the value under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}
