//! Error types for signup-flow.

use std::time::Duration;

use crate::workflow::step::ValidationResult;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Remote check error: {0}")]
    RemoteCheck(#[from] RemoteCheckError),
}

/// Configuration errors. These indicate a programming or deployment mistake
/// and are never recovered from silently.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Step registry for {kind} has no steps")]
    EmptyRegistry { kind: String },

    #[error("Step registry for {kind} contains a step with a blank id")]
    BlankStepId { kind: String },

    #[error("Step id {step_id} appears more than once in registry {kind}")]
    DuplicateStepId { kind: String, step_id: String },

    #[error("Step {step_id} depends on unknown step {depends_on}")]
    UnknownDependency { step_id: String, depends_on: String },

    #[error("Step {step_id} depends on itself")]
    SelfDependency { step_id: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown registration kind: {0}")]
    UnknownKind(String),
}

/// Errors surfaced by workflow engine operations. All of them are
/// recoverable: state is left exactly as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Step {step_id} is not valid ({} field errors)", result.errors.len())]
    Validation {
        step_id: String,
        result: ValidationResult,
    },

    #[error("Step index {target} is not reachable: {reason}")]
    Navigation { target: usize, reason: String },

    #[error("Step {step_id} is required and cannot be skipped")]
    NotSkippable { step_id: String },

    #[error("Registration could not be completed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Another workflow operation is already in progress")]
    Busy,

    #[error("Workflow run has already completed")]
    Finished,
}

/// Failure reported by the completion sink for a finished registration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    #[error("Registration rejected: {0}")]
    Rejected(String),

    #[error("Registration service unavailable: {0}")]
    Unavailable(String),
}

/// Remote uniqueness check failures. These never escape the debounced
/// validator; they are mapped to an `Invalid` field status.
#[derive(Debug, thiserror::Error)]
pub enum RemoteCheckError {
    #[error("Availability request failed: {0}")]
    RequestFailed(String),

    #[error("Availability check timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid availability response: {0}")]
    InvalidResponse(String),
}

/// Snapshot store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
