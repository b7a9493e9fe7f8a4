//! Snapshot persistence for resumable workflow runs.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::registry::StepRegistry;
use super::state::WorkflowState;
use super::step::FormData;
use crate::error::StoreError;
use crate::store::SnapshotStore;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Conventional snapshot key for a registration session.
pub fn snapshot_key(kind: &str, session: &str) -> String {
    format!("registration:{kind}:{session}")
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Serializable projection of a run's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub data: FormData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_step_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl PersistedSnapshot {
    pub fn new(current_index: usize, data: FormData) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            current_index,
            data,
            completed_step_ids: None,
            saved_at: None,
        }
    }

    pub fn with_completed<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completed_step_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Capture the persistable part of `state`.
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            current_index: state.current_index(),
            data: state.data().clone(),
            completed_step_ids: Some(state.completed_step_ids().clone()),
            saved_at: Some(Utc::now()),
        }
    }

    /// Rebuild run state for `registry`.
    ///
    /// An index past the last step is clamped to it, and completed ids the
    /// registry does not know are dropped. Validators are not re-run.
    pub(crate) fn into_state(self, registry: &StepRegistry) -> WorkflowState {
        let mut current_index = self.current_index;
        if current_index > registry.last_index() {
            warn!(
                kind = registry.kind(),
                saved = current_index,
                steps = registry.len(),
                "Snapshot index out of range, clamping to last step"
            );
            current_index = registry.last_index();
        }

        let completed = self
            .completed_step_ids
            .unwrap_or_default()
            .into_iter()
            .filter(|id| {
                let known = registry.contains(id);
                if !known {
                    warn!(kind = registry.kind(), step_id = %id, "Dropping unknown completed step");
                }
                known
            })
            .collect();

        WorkflowState::with_progress(registry.step_order(), current_index, self.data, completed)
    }
}

/// Saves, restores and clears one run's snapshot under a fixed key.
#[derive(Clone)]
pub struct SnapshotPersistence {
    store: Arc<dyn SnapshotStore>,
    key: String,
}

impl SnapshotPersistence {
    pub fn new(store: Arc<dyn SnapshotStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        let value = serde_json::to_string(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.set(&self.key, &value).await
    }

    /// Load the snapshot, if one is stored.
    pub async fn load(&self) -> Result<Option<PersistedSnapshot>, StoreError> {
        match self.store.get(&self.key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Serialization(format!("snapshot {}: {e}", self.key))),
            None => Ok(None),
        }
    }

    /// Erase the snapshot. A no-op if none is stored.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.delete(&self.key).await.map(|_| ())
    }
}

impl std::fmt::Debug for SnapshotPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotPersistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
