//! Deployment result reporting

use crate::state::{ExecutionState, ResourceStatus};
use serde::Serialize;
use stackflow_core::{DescriptorSet, ResourceKind};
use std::fmt;

/// One reported output of a created resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputEntry {
    pub id: String,
    pub kind: ResourceKind,
    /// Endpoint when the resource has one, otherwise the provider id
    pub value: String,
}

/// Outputs of created resources grouped by category.
///
/// Secrets are listed by reference only; their values never appear here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploymentResult {
    pub deployment: String,
    pub networks: Vec<OutputEntry>,
    pub databases: Vec<OutputEntry>,
    pub caches: Vec<OutputEntry>,
    pub services: Vec<OutputEntry>,
    pub jobs: Vec<OutputEntry>,
    pub secrets: Vec<OutputEntry>,
    pub functions: Vec<OutputEntry>,
}

impl DeploymentResult {
    /// Gather handles of created resources in dependency order
    pub fn collect(set: &DescriptorSet, state: &ExecutionState) -> Self {
        let mut result = DeploymentResult {
            deployment: set.deployment.clone(),
            ..Default::default()
        };

        for desc in set.ordered() {
            if state.status(&desc.id) != ResourceStatus::Created {
                continue;
            }
            let Some(handle) = state.handle(&desc.id) else {
                continue;
            };

            let value = match desc.kind {
                ResourceKind::Secret => handle.id.clone(),
                _ => handle.address().to_string(),
            };
            let entry = OutputEntry {
                id: desc.id.clone(),
                kind: desc.kind,
                value,
            };

            match desc.kind {
                ResourceKind::Network | ResourceKind::Subnet => result.networks.push(entry),
                ResourceKind::DatabaseInstance => result.databases.push(entry),
                ResourceKind::CacheInstance => result.caches.push(entry),
                ResourceKind::Service => result.services.push(entry),
                ResourceKind::SchedulerJob => result.jobs.push(entry),
                ResourceKind::Secret => result.secrets.push(entry),
                ResourceKind::Function => result.functions.push(entry),
            }
        }

        result
    }

    pub fn is_empty(&self) -> bool {
        self.sections().iter().all(|(_, entries)| entries.is_empty())
    }

    fn sections(&self) -> [(&'static str, &Vec<OutputEntry>); 7] {
        [
            ("Networks", &self.networks),
            ("Databases", &self.databases),
            ("Caches", &self.caches),
            ("Services", &self.services),
            ("Scheduled jobs", &self.jobs),
            ("Secrets", &self.secrets),
            ("Functions", &self.functions),
        ]
    }
}

impl fmt::Display for DeploymentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Deployment: {}", self.deployment)?;
        if self.is_empty() {
            return writeln!(f, "  (no resources created)");
        }

        let width = self
            .sections()
            .iter()
            .flat_map(|(_, entries)| entries.iter().map(|e| e.id.len()))
            .max()
            .unwrap_or(0);

        for (title, entries) in self.sections() {
            if entries.is_empty() {
                continue;
            }
            writeln!(f, "  {}:", title)?;
            for entry in entries {
                writeln!(f, "    {:width$}  {}", entry.id, entry.value, width = width)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderHandle;
    use stackflow_core::ResourceDescriptor;

    fn created(state: &mut ExecutionState, id: &str, kind: ResourceKind, handle: ProviderHandle) {
        state.transition(id, kind, ResourceStatus::Creating).unwrap();
        state.mark_created(id, kind, handle, 1).unwrap();
    }

    #[test]
    fn test_collect_groups_created_resources() {
        let set = DescriptorSet::new(
            "demo",
            vec![
                ResourceDescriptor::new("vpc", ResourceKind::Network),
                ResourceDescriptor::new("db-password", ResourceKind::Secret),
                ResourceDescriptor::new("api", ResourceKind::Service)
                    .with_dependency("vpc")
                    .with_dependency("db-password"),
                ResourceDescriptor::new("cache", ResourceKind::CacheInstance),
            ],
        )
        .unwrap();

        let mut state = ExecutionState::new("demo");
        created(&mut state, "vpc", ResourceKind::Network, ProviderHandle::new("vpc"));
        created(
            &mut state,
            "db-password",
            ResourceKind::Secret,
            ProviderHandle::new("projects/demo/secrets/db-password"),
        );
        created(
            &mut state,
            "api",
            ResourceKind::Service,
            ProviderHandle::new("api").with_endpoint("https://api-xyz.a.run.app"),
        );
        state
            .mark_blocked("cache", ResourceKind::CacheInstance, "quota".into())
            .unwrap();

        let result = DeploymentResult::collect(&set, &state);
        assert_eq!(result.networks.len(), 1);
        assert_eq!(result.services[0].value, "https://api-xyz.a.run.app");
        assert_eq!(result.secrets[0].value, "projects/demo/secrets/db-password");
        assert!(result.caches.is_empty());

        let text = result.to_string();
        assert!(text.contains("Deployment: demo"));
        assert!(text.contains("https://api-xyz.a.run.app"));
        assert!(!text.contains("Caches"));
    }

    #[test]
    fn test_empty_result() {
        let set = DescriptorSet::new("demo", vec![ResourceDescriptor::new("vpc", ResourceKind::Network)])
            .unwrap();
        let result = DeploymentResult::collect(&set, &ExecutionState::new("demo"));
        assert!(result.is_empty());
        assert!(result.to_string().contains("no resources created"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["deployment"], "demo");
        assert_eq!(json["networks"], serde_json::json!([]));
    }
}
