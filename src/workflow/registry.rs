//! Ordered, immutable step registries.

use std::collections::HashSet;

use super::step::StepDefinition;
use crate::error::ConfigError;

/// The ordered list of steps making up one workflow kind.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    kind: String,
    steps: Vec<StepDefinition>,
}

impl StepRegistry {
    /// Build a registry, rejecting empty or malformed step lists.
    pub fn new(kind: impl Into<String>, steps: Vec<StepDefinition>) -> Result<Self, ConfigError> {
        let kind = kind.into();
        if steps.is_empty() {
            return Err(ConfigError::EmptyRegistry { kind });
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if step.id.trim().is_empty() {
                return Err(ConfigError::BlankStepId { kind });
            }
            if !seen.insert(step.id.as_str()) {
                return Err(ConfigError::DuplicateStepId {
                    kind,
                    step_id: step.id.clone(),
                });
            }
        }

        for step in &steps {
            for dep in &step.depends_on {
                if *dep == step.id {
                    return Err(ConfigError::SelfDependency {
                        step_id: step.id.clone(),
                    });
                }
                if !seen.contains(dep.as_str()) {
                    return Err(ConfigError::UnknownDependency {
                        step_id: step.id.clone(),
                        depends_on: dep.clone(),
                    });
                }
            }
        }

        Ok(Self { kind, steps })
    }

    /// Workflow kind this registry belongs to, e.g. `"customer"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false: construction rejects empty registries.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.position(step_id).is_some()
    }

    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    /// Step ids in order.
    pub fn step_order(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str) -> StepDefinition {
        StepDefinition::new(id, id.to_uppercase())
    }

    #[test]
    fn empty_registry_is_rejected() {
        let err = StepRegistry::new("customer", vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRegistry { ref kind } if kind == "customer"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = StepRegistry::new("customer", vec![step("a"), step("b"), step("a")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStepId { ref step_id, .. } if step_id == "a"));
    }

    #[test]
    fn blank_ids_are_rejected() {
        let err = StepRegistry::new("customer", vec![step("a"), step("  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::BlankStepId { .. }));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = StepRegistry::new("customer", vec![step("a"), step("b").depends_on(["z"])])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownDependency { ref step_id, ref depends_on }
                if step_id == "b" && depends_on == "z"
        ));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let err = StepRegistry::new("customer", vec![step("a").depends_on(["a"])]).unwrap_err();
        assert!(matches!(err, ConfigError::SelfDependency { .. }));
    }

    #[test]
    fn forward_dependencies_are_allowed() {
        let registry =
            StepRegistry::new("customer", vec![step("a").depends_on(["c"]), step("b"), step("c")])
                .unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn lookups() {
        let registry = StepRegistry::new("restaurant", vec![step("owner"), step("business")]).unwrap();
        assert_eq!(registry.kind(), "restaurant");
        assert_eq!(registry.position("business"), Some(1));
        assert!(registry.contains("owner"));
        assert!(!registry.contains("payout"));
        assert_eq!(registry.last_index(), 1);
        assert_eq!(registry.step_order(), vec!["owner", "business"]);
        assert_eq!(registry.get(0).map(|s| s.title.as_str()), Some("OWNER"));
        assert!(registry.get(2).is_none());
        assert!(!registry.is_empty());
    }
}
