//! Errors raised by external collaborators.

use std::time::Duration;
use thiserror::Error;

/// Failure of a call to a collaborator (loader, generator, oracle, executor, analyst).
///
/// Every variant is recoverable from the pipeline's point of view: the caller
/// decides whether to retry, skip the unit of work, or fail the run.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Transport-level or non-success HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The caller-imposed deadline elapsed.
    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The collaborator answered, but the answer could not be understood.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The upstream provider rejected the request or returned nothing usable.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The request could not be built from the given inputs.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(e: serde_json::Error) -> Self {
        CollaboratorError::Parse(e.to_string())
    }
}
