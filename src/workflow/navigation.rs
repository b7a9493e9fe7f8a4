//! Which step indices may currently be jumped to.

use super::registry::StepRegistry;
use super::state::WorkflowState;

/// Why a step index cannot be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blocker {
    OutOfRange { len: usize },
    /// A required step before the target has not been completed.
    IncompleteStep { step_id: String },
    /// The target declares a dependency that has not been completed.
    MissingDependency { step_id: String },
}

impl std::fmt::Display for Blocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { len } => write!(f, "workflow has only {len} steps"),
            Self::IncompleteStep { step_id } => {
                write!(f, "required step {step_id} has not been completed")
            }
            Self::MissingDependency { step_id } => {
                write!(f, "depends on step {step_id}, which has not been completed")
            }
        }
    }
}

/// Check whether `index` is reachable, reporting the first blocker if not.
///
/// Going back is always allowed. Going forward requires every non-optional
/// step before the target to be completed, plus every step the target
/// depends on.
pub fn check_reachable(
    registry: &StepRegistry,
    state: &WorkflowState,
    index: usize,
) -> Result<(), Blocker> {
    if index >= registry.len() {
        return Err(Blocker::OutOfRange {
            len: registry.len(),
        });
    }
    if index <= state.current_index() {
        return Ok(());
    }

    if let Some(step) = registry.steps()[..index]
        .iter()
        .find(|s| !s.is_optional && !state.is_step_completed(&s.id))
    {
        return Err(Blocker::IncompleteStep {
            step_id: step.id.clone(),
        });
    }

    if let Some(dep) = registry.steps()[index]
        .depends_on
        .iter()
        .find(|dep| !state.is_step_completed(dep))
    {
        return Err(Blocker::MissingDependency {
            step_id: dep.clone(),
        });
    }

    Ok(())
}

pub fn can_reach(registry: &StepRegistry, state: &WorkflowState, index: usize) -> bool {
    check_reachable(registry, state, index).is_ok()
}

/// All indices the run may currently jump to, in order.
pub fn reachable_indices(registry: &StepRegistry, state: &WorkflowState) -> Vec<usize> {
    (0..registry.len())
        .filter(|&i| can_reach(registry, state, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::step::{FormData, StepDefinition};
    use std::collections::BTreeSet;

    /// A(required), B(optional), C(required), D(required, depends on B)
    fn registry() -> StepRegistry {
        StepRegistry::new(
            "test",
            vec![
                StepDefinition::new("a", "A"),
                StepDefinition::new("b", "B").optional(),
                StepDefinition::new("c", "C"),
                StepDefinition::new("d", "D").depends_on(["b"]),
            ],
        )
        .unwrap()
    }

    fn state_at(index: usize, completed: &[&str]) -> WorkflowState {
        WorkflowState::with_progress(
            registry().step_order(),
            index,
            FormData::new(),
            completed.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        )
    }

    #[test]
    fn backward_and_current_are_always_reachable() {
        let reg = registry();
        let state = state_at(2, &[]);
        assert!(can_reach(&reg, &state, 0));
        assert!(can_reach(&reg, &state, 1));
        assert!(can_reach(&reg, &state, 2));
    }

    #[test]
    fn forward_requires_prior_required_steps() {
        let reg = registry();
        let state = state_at(0, &[]);
        assert_eq!(
            check_reachable(&reg, &state, 2),
            Err(Blocker::IncompleteStep {
                step_id: "a".into()
            })
        );

        let state = state_at(0, &["a"]);
        assert!(can_reach(&reg, &state, 2), "optional B must not block C");
    }

    #[test]
    fn dependency_adds_requirement() {
        let reg = registry();
        let state = state_at(2, &["a", "c"]);
        assert_eq!(
            check_reachable(&reg, &state, 3),
            Err(Blocker::MissingDependency {
                step_id: "b".into()
            })
        );

        let state = state_at(2, &["a", "b", "c"]);
        assert!(can_reach(&reg, &state, 3));
    }

    #[test]
    fn out_of_range_is_unreachable() {
        let reg = registry();
        let state = state_at(0, &["a", "b", "c", "d"]);
        assert_eq!(
            check_reachable(&reg, &state, 4),
            Err(Blocker::OutOfRange { len: 4 })
        );
    }

    #[test]
    fn lists_reachable_indices() {
        let reg = registry();
        assert_eq!(reachable_indices(&reg, &state_at(0, &[])), vec![0]);
        assert_eq!(reachable_indices(&reg, &state_at(0, &["a"])), vec![0, 1, 2]);
        assert_eq!(
            reachable_indices(&reg, &state_at(1, &["a", "b", "c"])),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn every_forward_target_behind_incomplete_required_step_is_blocked() {
        let reg = registry();
        for current in 0..reg.len() {
            let state = state_at(current, &[]);
            for target in (current + 1)..reg.len() {
                let blocked_by_required = reg.steps()[..target]
                    .iter()
                    .any(|s| !s.is_optional && !state.is_step_completed(&s.id));
                if blocked_by_required {
                    assert!(
                        !can_reach(&reg, &state, target),
                        "target {target} from {current} should be blocked"
                    );
                }
            }
        }
    }
}
