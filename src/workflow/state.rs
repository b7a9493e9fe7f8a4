//! Workflow run state.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::step::{FormData, ValidationResult};

/// Lifecycle of a workflow run.
///
/// A run moves `InProgress` → `Completed` exactly once; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
}

impl RunStatus {
    pub fn can_transition_to(&self, target: RunStatus) -> bool {
        matches!((self, target), (Self::InProgress, Self::Completed))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::InProgress
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Position, answers and completion progress of one workflow run.
///
/// Only the engine mutates it; hosts get read access.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    step_order: Vec<String>,
    current_index: usize,
    data: FormData,
    completed_step_ids: BTreeSet<String>,
    last_validation_by_step: HashMap<String, ValidationResult>,
    status: RunStatus,
}

impl WorkflowState {
    /// Fresh run positioned on the first step.
    pub(crate) fn new(step_order: Vec<String>) -> Self {
        Self::with_progress(step_order, 0, FormData::new(), BTreeSet::new())
    }

    /// Run restored from saved progress. `current_index` must be in range.
    pub(crate) fn with_progress(
        step_order: Vec<String>,
        current_index: usize,
        data: FormData,
        completed_step_ids: BTreeSet<String>,
    ) -> Self {
        debug_assert!(current_index < step_order.len());
        Self {
            step_order,
            current_index,
            data,
            completed_step_ids,
            last_validation_by_step: HashMap::new(),
            status: RunStatus::InProgress,
        }
    }

    pub fn step_order(&self) -> &[String] {
        &self.step_order
    }

    pub fn len(&self) -> usize {
        self.step_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.step_order.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_step_id(&self) -> &str {
        &self.step_order[self.current_index]
    }

    pub fn is_last_step(&self) -> bool {
        self.current_index + 1 == self.step_order.len()
    }

    pub fn data(&self) -> &FormData {
        &self.data
    }

    pub fn completed_step_ids(&self) -> &BTreeSet<String> {
        &self.completed_step_ids
    }

    pub fn is_step_completed(&self, step_id: &str) -> bool {
        self.completed_step_ids.contains(step_id)
    }

    pub fn last_validation(&self, step_id: &str) -> Option<&ValidationResult> {
        self.last_validation_by_step.get(step_id)
    }

    pub fn last_validation_by_step(&self) -> &HashMap<String, ValidationResult> {
        &self.last_validation_by_step
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Shallow merge; keys in `partial` overwrite existing ones.
    pub(crate) fn merge(&mut self, partial: FormData) {
        self.data.extend(partial);
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        debug_assert!(index < self.step_order.len());
        self.current_index = index.min(self.step_order.len() - 1);
    }

    pub(crate) fn mark_completed(&mut self, step_id: &str) {
        self.completed_step_ids.insert(step_id.to_string());
    }

    pub(crate) fn record_validation(&mut self, step_id: &str, result: ValidationResult) {
        self.last_validation_by_step.insert(step_id.to_string(), result);
    }

    /// Enter the terminal state and hand back the collected answers.
    pub(crate) fn finish(&mut self) -> FormData {
        debug_assert!(self.status.can_transition_to(RunStatus::Completed));
        self.status = RunStatus::Completed;
        self.completed_step_ids.clear();
        self.last_validation_by_step.clear();
        std::mem::take(&mut self.data)
    }

    /// Discard all progress and start over on the first step.
    pub(crate) fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.step_order));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> WorkflowState {
        WorkflowState::new(vec!["a".into(), "b".into(), "c".into()])
    }

    fn partial(value: serde_json::Value) -> FormData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn new_state_starts_at_first_step() {
        let s = state();
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.current_step_id(), "a");
        assert!(s.data().is_empty());
        assert!(s.completed_step_ids().is_empty());
        assert_eq!(s.status(), RunStatus::InProgress);
        assert!(!s.is_last_step());
    }

    #[test]
    fn merge_is_additive_and_overwrites_keys() {
        let mut s = state();
        s.merge(partial(json!({"name": "Ana", "city": "Lisbon"})));
        s.merge(partial(json!({"city": "Porto", "phone": "5551234567"})));

        assert_eq!(s.data()["name"], "Ana");
        assert_eq!(s.data()["city"], "Porto");
        assert_eq!(s.data()["phone"], "5551234567");
    }

    #[test]
    fn merge_is_shallow() {
        let mut s = state();
        s.merge(partial(json!({"address": {"street": "Rua A", "city": "Lisbon"}})));
        s.merge(partial(json!({"address": {"city": "Porto"}})));
        assert_eq!(s.data()["address"], json!({"city": "Porto"}));
    }

    #[test]
    fn finish_hands_back_data_and_is_terminal() {
        let mut s = state();
        s.merge(partial(json!({"name": "Ana"})));
        s.mark_completed("a");
        s.record_validation("a", ValidationResult::valid());

        let data = s.finish();
        assert_eq!(data["name"], "Ana");
        assert!(s.data().is_empty());
        assert!(s.completed_step_ids().is_empty());
        assert!(s.last_validation("a").is_none());
        assert!(s.status().is_terminal());
    }

    #[test]
    fn reset_keeps_step_order() {
        let mut s = state();
        s.merge(partial(json!({"name": "Ana"})));
        s.set_index(2);
        s.mark_completed("a");

        s.reset();
        assert_eq!(s.step_order(), &["a", "b", "c"]);
        assert_eq!(s.current_index(), 0);
        assert!(s.data().is_empty());
        assert!(!s.is_step_completed("a"));
    }

    #[test]
    fn run_status_transitions() {
        assert!(RunStatus::InProgress.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Completed.can_transition_to(RunStatus::InProgress));
        assert!(!RunStatus::InProgress.can_transition_to(RunStatus::InProgress));
        assert_eq!(RunStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            serde_json::to_string(&RunStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
