//! Step definitions and validation results.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Answers accumulated across all steps of a run.
pub type FormData = serde_json::Map<String, serde_json::Value>;

/// Outcome of validating a step. A new value is produced on every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Field name → error message.
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
    /// Field name → non-blocking warning.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub warnings: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: BTreeMap::new(),
            warnings: BTreeMap::new(),
        }
    }

    /// Build a result from field errors; valid iff there are none.
    pub fn from_errors(errors: BTreeMap<String, String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings: BTreeMap::new(),
        }
    }

    /// Record an error for `field`. The first error per field wins.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_insert_with(|| message.into());
        self.is_valid = false;
    }

    /// Record a warning for `field`. Warnings never affect validity.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn with_warning(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add_warning(field, message);
        self
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::valid()
    }
}

/// Async validation contract of a step.
///
/// Always receives the full accumulated form data, so later steps can
/// cross-check answers given earlier.
#[async_trait]
pub trait StepValidator: Send + Sync {
    async fn validate(&self, data: &FormData) -> ValidationResult;
}

/// Adapter turning a synchronous closure into a `StepValidator`.
pub struct FnValidator<F>(pub F);

#[async_trait]
impl<F> StepValidator for FnValidator<F>
where
    F: Fn(&FormData) -> ValidationResult + Send + Sync,
{
    async fn validate(&self, data: &FormData) -> ValidationResult {
        (self.0)(data)
    }
}

/// One screen of a guided workflow.
#[derive(Clone)]
pub struct StepDefinition {
    /// Stable identifier, unique within a registry.
    pub id: String,
    pub title: String,
    /// Optional steps may be skipped without validation.
    pub is_optional: bool,
    /// Steps that must be completed before this one can be jumped to.
    pub depends_on: BTreeSet<String>,
    /// Field names the step collects. Informational for hosts.
    pub fields: Vec<String>,
    validator: Option<Arc<dyn StepValidator>>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            is_optional: false,
            depends_on: BTreeSet::new(),
            fields: Vec::new(),
            validator: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_validator(mut self, validator: impl StepValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Shorthand for a synchronous validation closure.
    pub fn validate_with<F>(self, f: F) -> Self
    where
        F: Fn(&FormData) -> ValidationResult + Send + Sync + 'static,
    {
        self.with_validator(FnValidator(f))
    }

    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    /// Run the step's validator. Steps without one are always valid.
    pub async fn validate(&self, data: &FormData) -> ValidationResult {
        match &self.validator {
            Some(validator) => validator.validate(data).await,
            None => ValidationResult::valid(),
        }
    }
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("is_optional", &self.is_optional)
            .field("depends_on", &self.depends_on)
            .field("fields", &self.fields)
            .field("has_validator", &self.has_validator())
            .finish()
    }
}
