//! Dependency-ordered executor
//!
//! Walks a [`DescriptorSet`] in topological order and drives the provider
//! adapter one resource at a time. The execution state is saved after every
//! transition so an interrupted run can be resumed.

use crate::error::{CloudError, Result};
use crate::provider::{ProviderAdapter, RetryConfig};
use crate::state::{ExecutionState, ResourceStatus, StateManager};
use serde::Serialize;
use stackflow_core::reference::OutputField;
use stackflow_core::{DescriptorSet, ResourceDescriptor, ResourceKind, resolve_references};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Executor tunables
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub retry: RetryConfig,

    /// Upper bound of a single provider call
    pub call_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            call_timeout: Duration::from_secs(120),
        }
    }
}

/// Shared flag requesting the executor to stop between resources
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every resource reached its target status
    Succeeded,
    /// Some resources failed or were blocked
    PartialFailure,
    /// An authentication failure stopped the run
    Aborted,
    /// Stopped on request before finishing
    Cancelled,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Succeeded => write!(f, "succeeded"),
            RunOutcome::PartialFailure => write!(f, "partial failure"),
            RunOutcome::Aborted => write!(f, "aborted"),
            RunOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Provision,
    Teardown,
}

/// Final status of one resource after a run
#[derive(Debug, Clone, Serialize)]
pub struct ResourceOutcome {
    pub id: String,
    pub kind: ResourceKind,
    pub status: ResourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

/// Result of a provision or teardown run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub operation: Operation,
    pub outcome: RunOutcome,
    /// Every resource, in dependency order
    pub resources: Vec<ResourceOutcome>,
    #[serde(skip)]
    pub state: ExecutionState,
}

impl RunReport {
    fn collect(operation: Operation, outcome: RunOutcome, set: &DescriptorSet, state: ExecutionState) -> Self {
        let resources = set
            .ordered()
            .map(|desc| {
                let record = state.record(&desc.id);
                ResourceOutcome {
                    id: desc.id.clone(),
                    kind: desc.kind,
                    status: state.status(&desc.id),
                    error: record.and_then(|r| r.last_error.clone()),
                    attempts: record.map(|r| r.attempts).unwrap_or(0),
                }
            })
            .collect();
        Self {
            operation,
            outcome,
            resources,
            state,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    /// Process exit code: 0 on full success, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn with_status(&self, status: ResourceStatus) -> impl Iterator<Item = &ResourceOutcome> {
        self.resources.iter().filter(move |r| r.status == status)
    }
}

/// Drives a provider through a descriptor set
pub struct Executor<'a> {
    provider: &'a dyn ProviderAdapter,
    state_manager: &'a StateManager,
    config: ExecutorConfig,
    cancel: CancellationFlag,
}

impl<'a> Executor<'a> {
    pub fn new(provider: &'a dyn ProviderAdapter, state_manager: &'a StateManager) -> Self {
        Self {
            provider,
            state_manager,
            config: ExecutorConfig::default(),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Create every resource that is not created yet.
    ///
    /// Resources whose dependencies are not all created are marked blocked.
    /// Nothing is rolled back on failure; a re-run retries only what is not
    /// created.
    pub async fn provision(&self, set: &DescriptorSet) -> Result<RunReport> {
        let lock = self.state_manager.acquire_lock().await?;
        let result = self.provision_locked(set).await;
        lock.release().await?;
        result
    }

    async fn provision_locked(&self, set: &DescriptorSet) -> Result<RunReport> {
        let mut state = self.state_manager.load().await?;
        state.prepare_run(set);
        self.state_manager.save(&state).await?;

        info!(
            deployment = %set.deployment,
            provider = self.provider.name(),
            resources = set.len(),
            "Provisioning"
        );

        let mut stopped: Option<RunOutcome> = None;

        for desc in set.ordered() {
            if state.status(&desc.id) == ResourceStatus::Created {
                debug!(resource = %desc.id, "Already created, skipping");
                continue;
            }
            if stopped.is_some() {
                continue;
            }
            if self.cancel.is_cancelled() {
                warn!("Cancellation requested, leaving remaining resources pending");
                stopped = Some(RunOutcome::Cancelled);
                continue;
            }

            let waiting_on: Vec<&str> = desc
                .depends_on
                .iter()
                .filter(|dep| state.status(dep) != ResourceStatus::Created)
                .map(String::as_str)
                .collect();
            if !waiting_on.is_empty() {
                info!(resource = %desc.id, waiting_on = ?waiting_on, "Blocked");
                state.mark_blocked(
                    &desc.id,
                    desc.kind,
                    format!("dependency not created: {}", waiting_on.join(", ")),
                )?;
                self.state_manager.save(&state).await?;
                continue;
            }

            if state.status(&desc.id) == ResourceStatus::Unknown {
                warn!(resource = %desc.id, "Reconciling resource left unknown by an earlier run");
            }
            state.transition(&desc.id, desc.kind, ResourceStatus::Creating)?;
            self.state_manager.save(&state).await?;

            let (result, attempts) = match resolve_outputs(desc, &state) {
                Ok(resolved) => {
                    self.call_with_retry(&desc.id, || self.provider.create(&resolved))
                        .await
                }
                Err(e) => (Err(e), 0),
            };

            match result {
                Ok(handle) => {
                    info!(resource = %desc.id, kind = %desc.kind, handle = %handle.id, "Created");
                    state.mark_created(&desc.id, desc.kind, handle, attempts)?;
                }
                Err(e) => {
                    warn!(resource = %desc.id, kind = %desc.kind, error = %e, attempts, "Create failed");
                    if e.aborts_run() {
                        stopped = Some(RunOutcome::Aborted);
                    }
                    state.mark_failed(&desc.id, desc.kind, e.to_string(), attempts)?;
                }
            }
            self.state_manager.save(&state).await?;
        }

        let outcome = stopped.unwrap_or_else(|| {
            if set
                .iter()
                .all(|d| state.status(&d.id) == ResourceStatus::Created)
            {
                RunOutcome::Succeeded
            } else {
                RunOutcome::PartialFailure
            }
        });
        info!(outcome = %outcome, "Provision finished");
        Ok(RunReport::collect(Operation::Provision, outcome, set, state))
    }

    /// Delete every created resource in reverse dependency order.
    ///
    /// A resource is deleted only after all of its created dependents are
    /// gone. Resources the provider no longer knows count as deleted.
    pub async fn teardown(&self, set: &DescriptorSet) -> Result<RunReport> {
        let lock = self.state_manager.acquire_lock().await?;
        let result = self.teardown_locked(set).await;
        lock.release().await?;
        result
    }

    async fn teardown_locked(&self, set: &DescriptorSet) -> Result<RunReport> {
        let mut state = self.state_manager.load().await?;

        info!(
            deployment = %set.deployment,
            provider = self.provider.name(),
            "Tearing down"
        );

        let mut stopped: Option<RunOutcome> = None;

        for desc in set.ordered().rev() {
            let status = state.status(&desc.id);
            if status == ResourceStatus::Unknown {
                warn!(resource = %desc.id, "State unknown, provision to reconcile before teardown");
                state.note_error(
                    &desc.id,
                    "state unknown; run provision to reconcile before teardown".to_string(),
                );
                continue;
            }
            let handle = match (status, state.handle(&desc.id)) {
                (ResourceStatus::Created, Some(handle)) => handle.clone(),
                _ => continue,
            };
            if stopped.is_some() {
                continue;
            }
            if self.cancel.is_cancelled() {
                warn!("Cancellation requested, leaving remaining resources in place");
                stopped = Some(RunOutcome::Cancelled);
                continue;
            }

            let remaining: Vec<&str> = set
                .dependents_of(&desc.id)
                .filter(|d| state.status(&d.id).may_exist())
                .map(|d| d.id.as_str())
                .collect();
            if !remaining.is_empty() {
                info!(resource = %desc.id, dependents = ?remaining, "Kept, dependents still exist");
                state.note_error(
                    &desc.id,
                    format!("still required by: {}", remaining.join(", ")),
                );
                self.state_manager.save(&state).await?;
                continue;
            }

            let (result, attempts) = self
                .call_with_retry(&desc.id, || self.provider.destroy(desc, &handle))
                .await;

            match result {
                Ok(()) => {
                    info!(resource = %desc.id, kind = %desc.kind, "Deleted");
                    state.mark_deleted(&desc.id, desc.kind)?;
                }
                Err(CloudError::NotFound(_)) => {
                    info!(resource = %desc.id, "Already gone at provider");
                    state.mark_deleted(&desc.id, desc.kind)?;
                }
                Err(e) => {
                    warn!(resource = %desc.id, error = %e, attempts, "Delete failed");
                    if e.aborts_run() {
                        stopped = Some(RunOutcome::Aborted);
                    }
                    state.note_error(&desc.id, e.to_string());
                }
            }
            self.state_manager.save(&state).await?;
        }

        let outcome = stopped.unwrap_or_else(|| {
            if set.iter().any(|d| state.status(&d.id).may_exist()) {
                RunOutcome::PartialFailure
            } else {
                RunOutcome::Succeeded
            }
        });
        info!(outcome = %outcome, "Teardown finished");
        Ok(RunReport::collect(Operation::Teardown, outcome, set, state))
    }

    /// Run a provider call under the per-call timeout, retrying transient
    /// failures with backoff. Returns the result and the number of calls made.
    async fn call_with_retry<T, F, Fut>(&self, resource: &str, mut call: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.config.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(CloudError::Transient(format!(
                    "provider call timed out after {}s",
                    self.config.call_timeout.as_secs_f64()
                ))),
            };

            match result {
                Err(e)
                    if e.is_retryable()
                        && attempt < retry.max_attempts
                        && !self.cancel.is_cancelled() =>
                {
                    let delay = retry.delay_after(attempt);
                    warn!(
                        resource = %resource,
                        attempt,
                        max_attempts = retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return (other, attempt),
            }
        }
    }
}

/// Substitute `${id.handle}` and `${id.endpoint}` from dependency handles
fn resolve_outputs(desc: &ResourceDescriptor, state: &ExecutionState) -> Result<ResourceDescriptor> {
    resolve_references(desc, |reference| {
        let handle = state.handle(&reference.resource)?;
        match reference.field {
            OutputField::Handle => Some(handle.id.clone()),
            OutputField::Endpoint => handle.endpoint.clone(),
        }
    })
    .map_err(|e| CloudError::InvalidConfig(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_exit_codes() {
        let set = DescriptorSet::new("demo", vec![]).unwrap();
        let ok = RunReport::collect(
            Operation::Provision,
            RunOutcome::Succeeded,
            &set,
            ExecutionState::new("demo"),
        );
        assert_eq!(ok.exit_code(), 0);

        let cancelled = RunReport::collect(
            Operation::Provision,
            RunOutcome::Cancelled,
            &set,
            ExecutionState::new("demo"),
        );
        assert_eq!(cancelled.exit_code(), 1);
    }
}
