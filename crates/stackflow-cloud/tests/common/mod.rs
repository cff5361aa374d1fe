use async_trait::async_trait;
use stackflow_cloud::{
    AuthStatus, CancellationFlag, CloudError, ExecutorConfig, ProviderAdapter, ProviderHandle,
    Result, RetryConfig,
};
use stackflow_core::{ResourceConfig, ResourceDescriptor, ResourceKind};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Failure a [`FakeProvider`] can be told to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Fault {
    Auth,
    Quota,
    Conflict,
    Transient,
    NotFound,
    /// Never answers; only a timeout ends the call
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Destroy(String),
}

/// In-memory provider that records every call
#[derive(Default)]
pub struct FakeProvider {
    calls: Mutex<Vec<Call>>,
    configs: Mutex<HashMap<String, ResourceConfig>>,
    next_faults: Mutex<HashMap<String, VecDeque<Fault>>>,
    always: Mutex<HashMap<String, Fault>>,
    existing: Mutex<BTreeSet<String>>,
    cancel_on: Mutex<Option<(String, CancellationFlag)>>,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call for `id` once
    pub fn fail_next(&self, id: &str, fault: Fault) {
        self.next_faults
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push_back(fault);
    }

    /// Fail every call for `id`
    pub fn fail_always(&self, id: &str, fault: Fault) {
        self.always.lock().unwrap().insert(id.to_string(), fault);
    }

    pub fn clear_faults(&self) {
        self.next_faults.lock().unwrap().clear();
        self.always.lock().unwrap().clear();
    }

    /// Request cancellation once `id` has been created
    pub fn cancel_after(&self, id: &str, flag: CancellationFlag) {
        *self.cancel_on.lock().unwrap() = Some((id.to_string(), flag));
    }

    /// Drop a resource behind the executor's back
    pub fn forget(&self, id: &str) {
        self.existing.lock().unwrap().remove(id);
    }

    pub fn exists(&self, id: &str) -> bool {
        self.existing.lock().unwrap().contains(id)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn creates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(id) => Some(id),
                Call::Destroy(_) => None,
            })
            .collect()
    }

    pub fn destroys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Destroy(id) => Some(id),
                Call::Create(_) => None,
            })
            .collect()
    }

    pub fn create_count(&self, id: &str) -> usize {
        self.creates().iter().filter(|c| c.as_str() == id).count()
    }

    /// Config of the most recent create call for `id`, after reference resolution
    pub fn last_config(&self, id: &str) -> Option<ResourceConfig> {
        self.configs.lock().unwrap().get(id).cloned()
    }

    async fn inject_fault(&self, id: &str) -> Result<()> {
        let fault = {
            let queued = self
                .next_faults
                .lock()
                .unwrap()
                .get_mut(id)
                .and_then(|q| q.pop_front());
            queued.or_else(|| self.always.lock().unwrap().get(id).copied())
        };

        let message = format!("injected for {}", id);
        match fault {
            None => Ok(()),
            Some(Fault::Auth) => Err(CloudError::Auth(message)),
            Some(Fault::Quota) => Err(CloudError::Quota(message)),
            Some(Fault::Conflict) => Err(CloudError::Conflict(message)),
            Some(Fault::Transient) => Err(CloudError::Transient(message)),
            Some(Fault::NotFound) => Err(CloudError::NotFound(message)),
            Some(Fault::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    async fn create_any(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Create(desc.id.clone()));
        self.configs
            .lock()
            .unwrap()
            .insert(desc.id.clone(), desc.config.clone());

        self.inject_fault(&desc.id).await?;

        // create-or-get: an existing resource is simply returned
        self.existing.lock().unwrap().insert(desc.id.clone());

        if let Some((id, flag)) = self.cancel_on.lock().unwrap().as_ref() {
            if id == &desc.id {
                flag.cancel();
            }
        }

        let handle = ProviderHandle::new(format!("fake/{}/{}", desc.kind, desc.id));
        Ok(match desc.kind {
            ResourceKind::Network | ResourceKind::Subnet | ResourceKind::Secret => handle,
            _ => handle.with_endpoint(format!("{}.fake.internal", desc.id)),
        })
    }
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        Ok(AuthStatus::ok("fake-account"))
    }

    async fn create_network(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_any(desc).await
    }

    async fn create_subnet(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_any(desc).await
    }

    async fn create_database(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_any(desc).await
    }

    async fn create_cache(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_any(desc).await
    }

    async fn create_secret(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_any(desc).await
    }

    async fn create_service(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_any(desc).await
    }

    async fn create_scheduler_job(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_any(desc).await
    }

    async fn create_function(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_any(desc).await
    }

    async fn destroy(&self, desc: &ResourceDescriptor, _handle: &ProviderHandle) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Destroy(desc.id.clone()));

        self.inject_fault(&desc.id).await?;

        if self.existing.lock().unwrap().remove(&desc.id) {
            Ok(())
        } else {
            Err(CloudError::NotFound(desc.id.clone()))
        }
    }
}

/// Executor settings without backoff waits
#[allow(dead_code)]
pub fn fast_config() -> ExecutorConfig {
    ExecutorConfig {
        retry: RetryConfig::immediate(3),
        call_timeout: Duration::from_secs(5),
    }
}
