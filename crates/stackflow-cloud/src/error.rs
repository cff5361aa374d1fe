//! Cloud provider error types

use thiserror::Error;

/// Provider and state errors.
///
/// The first four variants are the failure classes a provider call can end
/// in; the executor decides per class whether to retry, fail the resource or
/// abort the run.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("name taken by an incompatible resource: {0}")]
    Conflict(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("state file error: {0}")]
    StateError(String),

    #[error("lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Worth another attempt after a backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, CloudError::Transient(_))
    }

    /// Stops the whole run rather than just the failing resource
    pub fn aborts_run(&self) -> bool {
        matches!(self, CloudError::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
