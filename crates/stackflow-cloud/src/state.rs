//! Execution state of a deployment
//!
//! Persisted as `<root>/.stackflow/<deployment>/state.json` so that a re-run
//! resumes where the previous one stopped.

use crate::error::{CloudError, Result};
use crate::provider::ProviderHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackflow_core::{DescriptorSet, ResourceKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stackflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Status of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Not attempted yet
    #[default]
    Pending,
    /// A create call is in flight
    Creating,
    /// Exists at the provider
    Created,
    /// Last create attempt failed
    Failed,
    /// A dependency is not created
    Blocked,
    /// A create call may have been in flight when the process stopped
    Unknown,
    /// Removed by teardown
    Deleted,
}

impl ResourceStatus {
    /// Whether the executor may move a record from `self` to `next`
    pub fn can_transition_to(self, next: ResourceStatus) -> bool {
        use ResourceStatus::*;

        if self == next {
            return true;
        }
        match (self, next) {
            (Pending | Unknown | Deleted | Failed | Blocked, Creating | Blocked) => true,
            (Creating, Created | Failed | Unknown) => true,
            (Failed | Blocked, Pending) => true,
            (Created, Deleted) => true,
            _ => false,
        }
    }

    /// Whether a provider-side resource may exist
    pub fn may_exist(self) -> bool {
        matches!(
            self,
            ResourceStatus::Created | ResourceStatus::Creating | ResourceStatus::Unknown
        )
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::Creating => "creating",
            ResourceStatus::Created => "created",
            ResourceStatus::Failed => "failed",
            ResourceStatus::Blocked => "blocked",
            ResourceStatus::Unknown => "unknown",
            ResourceStatus::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Record of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,

    pub status: ResourceStatus,

    /// Present once the resource has been created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<ProviderHandle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Provider calls made by the most recent attempt
    #[serde(default)]
    pub attempts: u32,

    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            status: ResourceStatus::Pending,
            handle: None,
            last_error: None,
            attempts: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Per-deployment execution state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    /// State file version
    pub version: u32,

    pub deployment: String,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Records keyed by resource id
    pub resources: BTreeMap<String, ResourceRecord>,
}

impl ExecutionState {
    pub fn new(deployment: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION,
            deployment: deployment.into(),
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }

    pub fn record(&self, id: &str) -> Option<&ResourceRecord> {
        self.resources.get(id)
    }

    /// Status of `id`; resources without a record are pending
    pub fn status(&self, id: &str) -> ResourceStatus {
        self.resources
            .get(id)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    pub fn handle(&self, id: &str) -> Option<&ProviderHandle> {
        self.resources.get(id).and_then(|r| r.handle.as_ref())
    }

    /// Ensure every descriptor has a record and reset what the previous run
    /// left failed or blocked
    pub fn prepare_run(&mut self, set: &DescriptorSet) {
        for desc in set.iter() {
            let record = self
                .resources
                .entry(desc.id.clone())
                .or_insert_with(|| ResourceRecord::new(desc.kind));
            match record.status {
                ResourceStatus::Failed | ResourceStatus::Blocked => {
                    record.status = ResourceStatus::Pending;
                    record.updated_at = Utc::now();
                }
                // errors left by a partial teardown no longer apply
                ResourceStatus::Created => record.last_error = None,
                _ => {}
            }
        }
        self.touch();
    }

    /// Records left in `creating` belong to a process that stopped mid-call
    fn mark_interrupted(&mut self) -> usize {
        let mut count = 0;
        for (id, record) in self.resources.iter_mut() {
            if record.status == ResourceStatus::Creating {
                tracing::warn!(resource = %id, "Create call was interrupted, marking unknown");
                record.status = ResourceStatus::Unknown;
                record.updated_at = Utc::now();
                count += 1;
            }
        }
        count
    }

    /// Move `id` to `next`, rejecting transitions the lifecycle forbids
    pub fn transition(&mut self, id: &str, kind: ResourceKind, next: ResourceStatus) -> Result<&mut ResourceRecord> {
        let record = self
            .resources
            .entry(id.to_string())
            .or_insert_with(|| ResourceRecord::new(kind));

        if !record.status.can_transition_to(next) {
            return Err(CloudError::StateError(format!(
                "resource '{}' cannot move from {} to {}",
                id, record.status, next
            )));
        }

        record.status = next;
        record.updated_at = Utc::now();
        self.updated_at = record.updated_at;
        Ok(record)
    }

    pub fn mark_created(&mut self, id: &str, kind: ResourceKind, handle: ProviderHandle, attempts: u32) -> Result<()> {
        let record = self.transition(id, kind, ResourceStatus::Created)?;
        record.handle = Some(handle);
        record.last_error = None;
        record.attempts = attempts;
        Ok(())
    }

    pub fn mark_failed(&mut self, id: &str, kind: ResourceKind, error: String, attempts: u32) -> Result<()> {
        let record = self.transition(id, kind, ResourceStatus::Failed)?;
        record.last_error = Some(error);
        record.attempts = attempts;
        Ok(())
    }

    pub fn mark_blocked(&mut self, id: &str, kind: ResourceKind, reason: String) -> Result<()> {
        let record = self.transition(id, kind, ResourceStatus::Blocked)?;
        record.last_error = Some(reason);
        record.attempts = 0;
        Ok(())
    }

    pub fn mark_deleted(&mut self, id: &str, kind: ResourceKind) -> Result<()> {
        let record = self.transition(id, kind, ResourceStatus::Deleted)?;
        record.handle = None;
        record.last_error = None;
        Ok(())
    }

    /// Keep the status, remember why an operation on it did not succeed
    pub fn note_error(&mut self, id: &str, error: String) {
        if let Some(record) = self.resources.get_mut(id) {
            record.last_error = Some(error);
            record.updated_at = Utc::now();
        }
        self.touch();
    }

    /// Count of records per status
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.resources.values() {
            *counts.entry(record.status.to_string()).or_insert(0) += 1;
        }
        counts
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// State manager for reading/writing the state file of one deployment
pub struct StateManager {
    deployment: String,
    state_dir: PathBuf,
}

impl StateManager {
    pub fn new(root: impl AsRef<Path>, deployment: impl Into<String>) -> Self {
        let deployment = deployment.into();
        let state_dir = root.as_ref().join(STATE_DIR).join(&deployment);
        Self {
            deployment,
            state_dir,
        }
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir.join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE)
    }

    /// Whether a state file has been written for this deployment
    pub fn exists(&self) -> bool {
        self.state_path().exists()
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    /// Load the current state; a missing file yields an empty state
    pub async fn load(&self) -> Result<ExecutionState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(ExecutionState::new(&self.deployment));
        }

        let content = fs::read_to_string(&path).await?;
        let mut state: ExecutionState = serde_json::from_str(&content).map_err(|e| {
            CloudError::StateError(format!("{} is unreadable: {}", path.display(), e))
        })?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }
        if state.deployment != self.deployment {
            return Err(CloudError::StateError(format!(
                "State file belongs to deployment '{}', expected '{}'",
                state.deployment, self.deployment
            )));
        }

        let interrupted = state.mark_interrupted();
        tracing::debug!(
            resources = state.resources.len(),
            interrupted,
            "Loaded state"
        );
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &ExecutionState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }

        let tmp = self.state_dir.join(format!("{}.tmp", STATE_FILE));
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire the single-writer lock of this deployment
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            match serde_json::from_str::<LockInfo>(&content) {
                Ok(lock_info) => {
                    // Locks older than an hour are considered abandoned
                    let age = Utc::now().signed_duration_since(lock_info.acquired_at);
                    if age.num_hours() < 1 {
                        return Err(CloudError::LockError(format!(
                            "Deployment '{}' is locked by {} (pid {}) since {}",
                            self.deployment, lock_info.holder, lock_info.pid, lock_info.acquired_at
                        )));
                    }
                    tracing::warn!("Removing stale lock from {}", lock_info.holder);
                }
                Err(e) => tracing::warn!(error = %e, "Removing unreadable lock file"),
            }
            fs::remove_file(&lock_path).await?;
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => CloudError::LockError(format!(
                    "Deployment '{}' was locked concurrently",
                    self.deployment
                )),
                _ => CloudError::Io(e),
            })?;
        file.write_all(serde_json::to_string_pretty(&lock_info)?.as_bytes())
            .await?;
        file.flush().await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
