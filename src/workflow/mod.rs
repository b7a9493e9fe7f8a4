//! Guided multi-step workflow engine.
//!
//! A workflow is an ordered registry of steps. The engine walks a user
//! through them, validating each step before moving on, saving a snapshot so
//! the run can be resumed later, and handing the collected answers to a
//! completion sink at the end.

pub mod completion;
pub mod engine;
pub mod navigation;
pub mod persistence;
pub mod registry;
pub mod state;
pub mod step;

pub use completion::CompletionSink;
pub use engine::{EngineDeps, StepOutcome, WorkflowEngine, WorkflowStatus};
pub use navigation::{Blocker, can_reach, check_reachable, reachable_indices};
pub use persistence::{PersistedSnapshot, SNAPSHOT_VERSION, SnapshotPersistence, snapshot_key};
pub use registry::StepRegistry;
pub use state::{RunStatus, WorkflowState};
pub use step::{FnValidator, FormData, StepDefinition, StepValidator, ValidationResult};
