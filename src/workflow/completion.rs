//! Receives the collected answers when a run finishes.

use async_trait::async_trait;

use super::step::FormData;
use crate::error::CompletionError;

/// Destination for a finished registration, e.g. an account-creation API.
///
/// A failure leaves the run on its final step so the host can retry.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn complete(&self, kind: &str, data: &FormData) -> Result<(), CompletionError>;
}
