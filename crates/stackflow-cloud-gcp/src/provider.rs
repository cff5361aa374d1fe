//! Google Cloud provider implementation

use crate::error::GcloudError;
use crate::gcloud::{Gcloud, Invocation};
use crate::resources::{self, Target};
use async_trait::async_trait;
use stackflow_cloud::{AuthStatus, CloudError, ProviderAdapter, ProviderHandle, Result};
use stackflow_core::{ResourceDescriptor, ResourceKind};

/// Google Cloud provider backed by the gcloud CLI
pub struct GcpProvider {
    gcloud: Gcloud,
    region: String,
}

impl GcpProvider {
    pub fn new(project: Option<String>, region: impl Into<String>) -> Self {
        Self {
            gcloud: Gcloud::new(project),
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn target(&self, desc: &ResourceDescriptor) -> Target {
        Target::of(desc, &self.region)
    }

    async fn describe(&self, kind: ResourceKind, target: &Target) -> std::result::Result<Option<serde_json::Value>, GcloudError> {
        match self.gcloud.run_json(&resources::describe(kind, target)).await {
            Ok(value) => Ok(Some(value)),
            Err(GcloudError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Return the existing resource or create it.
    ///
    /// `build` is only invoked when the resource does not exist yet, so
    /// secret payloads are not generated for resources that already exist.
    async fn create_or_get<F>(&self, desc: &ResourceDescriptor, build: F) -> Result<ProviderHandle>
    where
        F: FnOnce(&ResourceDescriptor, &Target) -> crate::error::Result<Invocation> + Send,
    {
        let target = self.target(desc);

        if let Some(existing) = self.describe(desc.kind, &target).await? {
            resources::check_compatible(desc, &existing)?;
            tracing::info!(resource = %desc.id, name = %target.name, "Found existing resource");
            return Ok(resources::handle_from(desc.kind, &target, &existing));
        }

        let invocation = build(desc, &target)?;
        tracing::info!(resource = %desc.id, kind = %desc.kind, name = %target.name, "Creating");
        match self.gcloud.run(&invocation).await {
            Ok(_) => {}
            // Created concurrently; whatever exists now is checked below
            Err(GcloudError::AlreadyExists(msg)) => {
                tracing::debug!(resource = %desc.id, "Create raced: {}", msg);
            }
            Err(e) => return Err(e.into()),
        }

        match self.describe(desc.kind, &target).await? {
            Some(created) => {
                resources::check_compatible(desc, &created)?;
                Ok(resources::handle_from(desc.kind, &target, &created))
            }
            // Names such as Cloud SQL instances stay reserved after deletion
            None => Err(CloudError::Conflict(format!(
                "name '{}' is taken but the {} cannot be described",
                target.name, desc.kind
            ))),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GcpProvider {
    fn name(&self) -> &str {
        "gcp"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        match self.gcloud.active_account().await {
            Ok(Some(account)) => {
                let info = match self.gcloud.project() {
                    Some(project) => format!("{} (project {})", account, project),
                    None => account,
                };
                Ok(AuthStatus::ok(info))
            }
            Ok(None) => Ok(AuthStatus::failed(
                "No active gcloud account. Run: gcloud auth login",
            )),
            Err(GcloudError::GcloudNotFound) => Ok(AuthStatus::failed(
                GcloudError::GcloudNotFound.to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_network(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_or_get(desc, resources::create_network).await
    }

    async fn create_subnet(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_or_get(desc, resources::create_subnet).await
    }

    async fn create_database(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        let handle = self.create_or_get(desc, resources::create_database).await?;

        let instance = self.target(desc).name;
        for database in resources::database_names(desc) {
            match self
                .gcloud
                .run(&resources::create_sql_database(&instance, &database))
                .await
            {
                Ok(_) => tracing::info!(resource = %desc.id, database = %database, "Created database"),
                Err(GcloudError::AlreadyExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(handle)
    }

    async fn create_cache(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_or_get(desc, resources::create_cache).await
    }

    async fn create_secret(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_or_get(desc, resources::create_secret).await
    }

    async fn create_service(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_or_get(desc, resources::create_service).await
    }

    async fn create_scheduler_job(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_or_get(desc, resources::create_scheduler_job).await
    }

    async fn create_function(&self, desc: &ResourceDescriptor) -> Result<ProviderHandle> {
        self.create_or_get(desc, resources::create_function).await
    }

    async fn destroy(&self, desc: &ResourceDescriptor, handle: &ProviderHandle) -> Result<()> {
        let target = self.target(desc);
        tracing::info!(resource = %desc.id, handle = %handle.id, "Deleting");
        self.gcloud
            .run(&resources::delete(desc.kind, &target))
            .await
            .map(|_| ())
            .map_err(CloudError::from)
    }
}
