//! In-memory snapshot store, for tests and ephemeral hosts.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::traits::SnapshotStore;
use crate::error::StoreError;

/// `SnapshotStore` backed by a process-local map.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let store = InMemorySnapshotStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len().await, 1);

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let store = InMemorySnapshotStore::new();
        store.set("registration:customer:1", "a").await.unwrap();
        store.set("registration:restaurant:1", "b").await.unwrap();

        store.delete("registration:customer:1").await.unwrap();
        assert_eq!(
            store.get("registration:restaurant:1").await.unwrap().as_deref(),
            Some("b")
        );
    }
}
