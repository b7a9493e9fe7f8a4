//! WorkflowEngine — drives one registration run through its steps.
//!
//! The engine owns the run state, validates before moving forward, writes a
//! snapshot after every change, and hands the collected answers to the
//! completion sink when the last step is done.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

use super::completion::CompletionSink;
use super::navigation;
use super::persistence::{PersistedSnapshot, SnapshotPersistence};
use super::registry::StepRegistry;
use super::state::{RunStatus, WorkflowState};
use super::step::{FormData, StepDefinition, ValidationResult};
use crate::error::WorkflowError;

/// Collaborators the engine needs besides its step registry.
#[derive(Clone)]
pub struct EngineDeps {
    pub persistence: SnapshotPersistence,
    pub completion: Arc<dyn CompletionSink>,
}

impl EngineDeps {
    pub fn new(persistence: SnapshotPersistence, completion: Arc<dyn CompletionSink>) -> Self {
        Self {
            persistence,
            completion,
        }
    }
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The run moved between step indices (`from == to` when already at the edge).
    Moved { from: usize, to: usize },
    /// The run finished and the sink accepted the answers.
    Completed { data: FormData },
}

/// Serializable view of a run for hosts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub kind: String,
    pub status: RunStatus,
    pub current_index: usize,
    pub current_step_id: String,
    pub current_step_title: String,
    pub current_step_optional: bool,
    pub total_steps: usize,
    pub completed_step_ids: BTreeSet<String>,
    pub reachable_indices: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validation: Option<ValidationResult>,
}

/// Runs one guided registration.
///
/// All operations take `&self`. Mutating operations are serialised: a call
/// made while another is still awaiting fails with [`WorkflowError::Busy`].
/// State is only changed once an operation's validation and completion
/// awaits have finished, so dropping an in-flight future leaves it intact.
pub struct WorkflowEngine {
    registry: Arc<StepRegistry>,
    state: RwLock<WorkflowState>,
    op_lock: Mutex<()>,
    persistence: SnapshotPersistence,
    completion: Arc<dyn CompletionSink>,
}

impl WorkflowEngine {
    /// Start a run, optionally hydrated from a saved snapshot.
    ///
    /// Hydration never runs step validators.
    pub fn initialize(
        registry: StepRegistry,
        persisted: Option<PersistedSnapshot>,
        deps: EngineDeps,
    ) -> Self {
        let hydrated = persisted.is_some();
        let state = match persisted {
            Some(snapshot) => snapshot.into_state(&registry),
            None => WorkflowState::new(registry.step_order()),
        };

        info!(
            kind = registry.kind(),
            key = deps.persistence.key(),
            index = state.current_index(),
            hydrated,
            "Workflow initialized"
        );

        Self {
            registry: Arc::new(registry),
            state: RwLock::new(state),
            op_lock: Mutex::new(()),
            persistence: deps.persistence,
            completion: deps.completion,
        }
    }

    /// Start a run from whatever snapshot is stored under the persistence key.
    ///
    /// A missing or unreadable snapshot starts a fresh run.
    pub async fn resume(registry: StepRegistry, deps: EngineDeps) -> Self {
        let persisted = match deps.persistence.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    key = deps.persistence.key(),
                    "Ignoring unreadable workflow snapshot: {}", e
                );
                None
            }
        };
        Self::initialize(registry, persisted, deps)
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn snapshot_key(&self) -> &str {
        self.persistence.key()
    }

    // ── Operations ────────────────────────────────────────────────────

    /// Shallow-merge `partial` into the answers and save a snapshot.
    pub async fn update_data(&self, partial: FormData) -> Result<(), WorkflowError> {
        let _op = self.begin()?;
        let snapshot = {
            let mut state = self.state.write().await;
            ensure_active(&state)?;
            state.merge(partial);
            PersistedSnapshot::from_state(&state)
        };
        self.persist(&snapshot).await;
        Ok(())
    }

    /// Validate the current step without moving.
    pub async fn validate_current(&self) -> Result<ValidationResult, WorkflowError> {
        let _op = self.begin()?;
        let (_, step, data) = self.current().await?;
        let result = step.validate(&data).await;
        debug!(step_id = %step.id, valid = result.is_valid, "Validated current step");
        self.state
            .write()
            .await
            .record_validation(&step.id, result.clone());
        Ok(result)
    }

    /// Validate the current step and move to the next one, or finish the run
    /// when the current step is the last.
    pub async fn advance(&self) -> Result<StepOutcome, WorkflowError> {
        let _op = self.begin()?;
        let (index, step, data) = self.current().await?;

        let result = step.validate(&data).await;
        if !result.is_valid {
            debug!(
                step_id = %step.id,
                errors = result.errors.len(),
                "Step invalid, staying put"
            );
            self.state
                .write()
                .await
                .record_validation(&step.id, result.clone());
            return Err(WorkflowError::Validation {
                step_id: step.id,
                result,
            });
        }

        if index == self.registry.last_index() {
            return self.finish_run(data, Some((&step.id, result))).await;
        }

        let snapshot = {
            let mut state = self.state.write().await;
            state.record_validation(&step.id, result);
            state.mark_completed(&step.id);
            state.set_index(index + 1);
            PersistedSnapshot::from_state(&state)
        };
        debug!(step_id = %step.id, from = index, to = index + 1, "Advanced");
        self.persist(&snapshot).await;
        Ok(StepOutcome::Moved {
            from: index,
            to: index + 1,
        })
    }

    /// Move back one step. Completion progress and answers are kept.
    pub async fn retreat(&self) -> Result<StepOutcome, WorkflowError> {
        let _op = self.begin()?;
        let (from, to, snapshot) = {
            let mut state = self.state.write().await;
            ensure_active(&state)?;
            let from = state.current_index();
            let to = from.saturating_sub(1);
            state.set_index(to);
            (from, to, PersistedSnapshot::from_state(&state))
        };
        if from != to {
            debug!(from, to, "Retreated");
            self.persist(&snapshot).await;
        }
        Ok(StepOutcome::Moved { from, to })
    }

    /// Leave an optional step without validating or completing it.
    pub async fn skip_optional(&self) -> Result<StepOutcome, WorkflowError> {
        let _op = self.begin()?;
        let (index, step, data) = self.current().await?;
        if !step.is_optional {
            return Err(WorkflowError::NotSkippable { step_id: step.id });
        }

        if index == self.registry.last_index() {
            return self.finish_run(data, None).await;
        }

        let snapshot = {
            let mut state = self.state.write().await;
            state.set_index(index + 1);
            PersistedSnapshot::from_state(&state)
        };
        debug!(step_id = %step.id, from = index, to = index + 1, "Skipped optional step");
        self.persist(&snapshot).await;
        Ok(StepOutcome::Moved {
            from: index,
            to: index + 1,
        })
    }

    /// Move straight to `index` if navigation allows it.
    pub async fn jump_to(&self, index: usize) -> Result<StepOutcome, WorkflowError> {
        let _op = self.begin()?;
        let (from, snapshot) = {
            let mut state = self.state.write().await;
            ensure_active(&state)?;
            navigation::check_reachable(&self.registry, &state, index).map_err(|blocker| {
                WorkflowError::Navigation {
                    target: index,
                    reason: blocker.to_string(),
                }
            })?;
            let from = state.current_index();
            state.set_index(index);
            (from, PersistedSnapshot::from_state(&state))
        };
        debug!(from, to = index, "Jumped");
        if from != index {
            self.persist(&snapshot).await;
        }
        Ok(StepOutcome::Moved { from, to: index })
    }

    /// Abandon the run: discard all answers and progress and erase the snapshot.
    pub async fn reset(&self) -> Result<(), WorkflowError> {
        let _op = self.begin()?;
        {
            let mut state = self.state.write().await;
            ensure_active(&state)?;
            state.reset();
        }
        if let Err(e) = self.persistence.clear().await {
            warn!(key = self.persistence.key(), "Failed to clear workflow snapshot: {}", e);
        }
        info!(kind = self.registry.kind(), key = self.persistence.key(), "Workflow reset");
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub async fn current_index(&self) -> usize {
        self.state.read().await.current_index()
    }

    pub async fn current_step(&self) -> StepDefinition {
        let index = self.current_index().await;
        self.registry.steps()[index].clone()
    }

    pub async fn data(&self) -> FormData {
        self.state.read().await.data().clone()
    }

    pub async fn completed_step_ids(&self) -> BTreeSet<String> {
        self.state.read().await.completed_step_ids().clone()
    }

    pub async fn last_validation(&self, step_id: &str) -> Option<ValidationResult> {
        self.state.read().await.last_validation(step_id).cloned()
    }

    pub async fn last_validation_by_step(&self) -> HashMap<String, ValidationResult> {
        self.state.read().await.last_validation_by_step().clone()
    }

    pub async fn is_completed(&self) -> bool {
        self.state.read().await.status().is_terminal()
    }

    pub async fn reachable_indices(&self) -> Vec<usize> {
        let state = self.state.read().await;
        navigation::reachable_indices(&self.registry, &state)
    }

    pub async fn status(&self) -> WorkflowStatus {
        let state = self.state.read().await;
        let step = &self.registry.steps()[state.current_index()];
        WorkflowStatus {
            kind: self.registry.kind().to_string(),
            status: state.status(),
            current_index: state.current_index(),
            current_step_id: step.id.clone(),
            current_step_title: step.title.clone(),
            current_step_optional: step.is_optional,
            total_steps: self.registry.len(),
            completed_step_ids: state.completed_step_ids().clone(),
            reachable_indices: navigation::reachable_indices(&self.registry, &state),
            last_validation: state.last_validation(&step.id).cloned(),
        }
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn begin(&self) -> Result<MutexGuard<'_, ()>, WorkflowError> {
        self.op_lock.try_lock().map_err(|_| WorkflowError::Busy)
    }

    /// Index, definition and a copy of the answers for the current step.
    async fn current(&self) -> Result<(usize, StepDefinition, FormData), WorkflowError> {
        let state = self.state.read().await;
        ensure_active(&state)?;
        let index = state.current_index();
        Ok((
            index,
            self.registry.steps()[index].clone(),
            state.data().clone(),
        ))
    }

    /// Hand the answers to the sink and enter the terminal state on success.
    async fn finish_run(
        &self,
        data: FormData,
        validated: Option<(&str, ValidationResult)>,
    ) -> Result<StepOutcome, WorkflowError> {
        if let Err(e) = self.completion.complete(self.registry.kind(), &data).await {
            warn!(
                kind = self.registry.kind(),
                key = self.persistence.key(),
                "Completion sink failed: {}", e
            );
            if let Some((step_id, result)) = validated {
                let mut state = self.state.write().await;
                state.record_validation(step_id, result);
                state.mark_completed(step_id);
            }
            return Err(e.into());
        }

        let data = self.state.write().await.finish();
        if let Err(e) = self.persistence.clear().await {
            warn!(key = self.persistence.key(), "Failed to clear workflow snapshot: {}", e);
        }
        info!(
            kind = self.registry.kind(),
            key = self.persistence.key(),
            fields = data.len(),
            "Registration completed"
        );
        Ok(StepOutcome::Completed { data })
    }

    async fn persist(&self, snapshot: &PersistedSnapshot) {
        if let Err(e) = self.persistence.save(snapshot).await {
            warn!(key = self.persistence.key(), "Failed to persist workflow snapshot: {}", e);
        }
    }
}

fn ensure_active(state: &WorkflowState) -> Result<(), WorkflowError> {
    if state.status().is_terminal() {
        Err(WorkflowError::Finished)
    } else {
        Ok(())
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("kind", &self.registry.kind())
            .field("key", &self.persistence.key())
            .finish_non_exhaustive()
    }
}
