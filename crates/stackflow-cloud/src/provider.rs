//! Provider adapter trait definition

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_core::{ResourceDescriptor, ResourceKind};
use std::time::Duration;

/// Boundary between the executor and one cloud backend.
///
/// Every `create_*` call is idempotent: when an equivalent resource already
/// exists the adapter returns its handle instead of failing. Failures are
/// reported through [`CloudError`](crate::CloudError):
/// `Auth`, `Quota`, `Conflict` or `Transient`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Returns the provider name (e.g., "gcp")
    fn name(&self) -> &str;

    /// Check that credentials are present and valid
    async fn check_auth(&self) -> Result<AuthStatus>;

    async fn create_network(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle>;

    async fn create_subnet(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle>;

    async fn create_database(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle>;

    async fn create_cache(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle>;

    async fn create_secret(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle>;

    async fn create_service(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle>;

    async fn create_scheduler_job(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle>;

    async fn create_function(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle>;

    /// Delete a resource previously returned by a create call.
    ///
    /// Returns `CloudError::NotFound` when it is already gone.
    async fn destroy(&self, desc: &ResourceDescriptor, handle: &ProviderHandle) -> Result<()>;

    /// Dispatch to the create operation for the descriptor's kind
    async fn create(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        match desc.kind {
            ResourceKind::Network => self.create_network(desc).await,
            ResourceKind::Subnet => self.create_subnet(desc).await,
            ResourceKind::DatabaseInstance => self.create_database(desc).await,
            ResourceKind::CacheInstance => self.create_cache(desc).await,
            ResourceKind::Secret => self.create_secret(desc).await,
            ResourceKind::Service => self.create_service(desc).await,
            ResourceKind::SchedulerJob => self.create_scheduler_job(desc).await,
            ResourceKind::Function => self.create_function(desc).await,
        }
    }
}

/// What a provider returns for a created resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHandle {
    /// Provider-side identifier (resource name, self link, secret path)
    pub id: String,

    /// Address clients use: URL, `host:port` or connection target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ProviderHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Endpoint when there is one, otherwise the id
    pub fn address(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.id)
    }
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Retry configuration for transient provider failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()).max(0.0))
    }

    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}
