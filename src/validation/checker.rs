//! Remote uniqueness checker seam and an in-memory implementation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::status::FieldKind;
use crate::error::RemoteCheckError;

/// Answer from the availability service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
}

/// Backend-agnostic availability check for unique fields.
#[async_trait]
pub trait UniquenessChecker: Send + Sync {
    /// Check whether `value` is still free for `kind`.
    async fn check(&self, kind: FieldKind, value: &str) -> Result<Availability, RemoteCheckError>;
}

/// Availability checker backed by an in-memory set of taken values.
///
/// Values are compared case-insensitively after trimming.
#[derive(Default)]
pub struct InMemoryUniquenessChecker {
    taken: RwLock<HashMap<FieldKind, HashSet<String>>>,
}

impl InMemoryUniquenessChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a value as already registered.
    pub async fn reserve(&self, kind: FieldKind, value: &str) {
        self.taken
            .write()
            .await
            .entry(kind)
            .or_default()
            .insert(normalize(value));
    }

    /// Mark a value as free again. Returns true if it was reserved.
    pub async fn release(&self, kind: FieldKind, value: &str) -> bool {
        self.taken
            .write()
            .await
            .get_mut(&kind)
            .map(|values| values.remove(&normalize(value)))
            .unwrap_or(false)
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[async_trait]
impl UniquenessChecker for InMemoryUniquenessChecker {
    async fn check(&self, kind: FieldKind, value: &str) -> Result<Availability, RemoteCheckError> {
        let taken = self.taken.read().await;
        let available = !taken
            .get(&kind)
            .is_some_and(|values| values.contains(&normalize(value)));
        Ok(Availability { available })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserved_values_are_unavailable() {
        let checker = InMemoryUniquenessChecker::new();
        checker.reserve(FieldKind::Email, "ana@example.com").await;

        let taken = checker.check(FieldKind::Email, " ANA@example.com ").await.unwrap();
        assert!(!taken.available);

        let free = checker.check(FieldKind::Email, "bo@example.com").await.unwrap();
        assert!(free.available);
    }

    #[tokio::test]
    async fn kinds_are_isolated() {
        let checker = InMemoryUniquenessChecker::new();
        checker.reserve(FieldKind::Username, "ana").await;

        let other_kind = checker.check(FieldKind::BusinessName, "ana").await.unwrap();
        assert!(other_kind.available);
    }

    #[tokio::test]
    async fn release_frees_value() {
        let checker = InMemoryUniquenessChecker::new();
        checker.reserve(FieldKind::Phone, "5551234567").await;
        assert!(checker.release(FieldKind::Phone, "5551234567").await);
        assert!(!checker.release(FieldKind::Phone, "5551234567").await);

        let result = checker.check(FieldKind::Phone, "5551234567").await.unwrap();
        assert!(result.available);
    }
}
