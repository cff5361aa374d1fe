//! Google Cloud provider error types

use stackflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcloudError {
    #[error("gcloud not found. Please install the Google Cloud SDK: https://cloud.google.com/sdk/docs/install")]
    GcloudNotFound,

    #[error("gcloud authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("gcloud command failed: {0}")]
    CommandFailed(String),

    #[error("resource '{resource}' requires setting '{key}'")]
    MissingSetting { resource: String, key: String },

    #[error("resource '{resource}' reads environment variable '{var}', which is not set")]
    MissingEnv { resource: String, var: String },

    #[error("'{resource}' exists with incompatible settings: {detail}")]
    Incompatible { resource: String, detail: String },

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GcloudError {
    /// Classify gcloud's stderr into an error kind
    pub fn classify(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let upper = message.to_uppercase();
        let has = |needles: &[&str]| needles.iter().any(|n| upper.contains(n));

        if has(&[
            "PERMISSION_DENIED",
            "UNAUTHENTICATED",
            "DOES NOT HAVE PERMISSION",
            "GCLOUD AUTH LOGIN",
            "REAUTHENTICATION",
            "INVALID_GRANT",
        ]) {
            GcloudError::AuthenticationFailed(message)
        } else if has(&["RESOURCE_EXHAUSTED", "QUOTA"]) {
            GcloudError::QuotaExceeded(message)
        } else if has(&["ALREADY_EXISTS", "ALREADY EXISTS", "ALREADY OWN IT"]) {
            GcloudError::AlreadyExists(message)
        } else if has(&[
            "NOT_FOUND",
            "NOT FOUND",
            "DOES NOT EXIST",
            "CANNOT FIND",
            "HTTPERROR 404",
            // Cloud SQL answers 403 for instances that do not exist
            "NOT AUTHORIZED TO MAKE THIS REQUEST",
        ]) {
            GcloudError::NotFound(message)
        } else if has(&[
            "UNAVAILABLE",
            "DEADLINE_EXCEEDED",
            "INTERNAL",
            "ABORTED",
            "HTTPERROR 500",
            "HTTPERROR 502",
            "HTTPERROR 503",
            "HTTPERROR 504",
            "CONNECTION RESET",
            "CONNECTION REFUSED",
            "TIMED OUT",
            "TRY AGAIN",
            "OPERATION IN PROGRESS",
        ]) {
            GcloudError::Unavailable(message)
        } else {
            GcloudError::CommandFailed(message)
        }
    }
}

impl From<GcloudError> for CloudError {
    fn from(err: GcloudError) -> Self {
        match err {
            GcloudError::AuthenticationFailed(m) => CloudError::Auth(m),
            GcloudError::QuotaExceeded(m) => CloudError::Quota(m),
            GcloudError::AlreadyExists(m) => CloudError::Conflict(m),
            e @ GcloudError::Incompatible { .. } => CloudError::Conflict(e.to_string()),
            GcloudError::NotFound(m) => CloudError::NotFound(m),
            GcloudError::Unavailable(m) => CloudError::Transient(m),
            GcloudError::IoError(e) => CloudError::Transient(e.to_string()),
            e @ (GcloudError::GcloudNotFound
            | GcloudError::CommandFailed(_)
            | GcloudError::MissingSetting { .. }
            | GcloudError::MissingEnv { .. }
            | GcloudError::JsonError(_)) => CloudError::InvalidConfig(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GcloudError>;
