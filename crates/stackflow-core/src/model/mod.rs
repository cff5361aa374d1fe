//! Descriptor model

mod descriptor;
mod kind;

pub use descriptor::{ResourceConfig, ResourceDescriptor, value_to_string};
pub use kind::ResourceKind;

use crate::error::{ConfigError, Result};
use crate::graph::DependencyGraph;
use crate::reference::references_in;
use crate::validate::scan_for_credentials;
use serde::Serialize;
use std::collections::HashMap;

/// Validated, immutable set of descriptors for one deployment
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorSet {
    /// Deployment identifier, also the key of the persisted state
    pub deployment: String,

    descriptors: Vec<ResourceDescriptor>,

    #[serde(skip)]
    index: HashMap<String, usize>,

    /// Indices into `descriptors` in dependency order
    #[serde(skip)]
    order: Vec<usize>,
}

impl DescriptorSet {
    /// Validate descriptors and compute their dependency order
    pub fn new(deployment: impl Into<String>, descriptors: Vec<ResourceDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(descriptors.len());
        for (i, desc) in descriptors.iter().enumerate() {
            if index.insert(desc.id.clone(), i).is_some() {
                return Err(ConfigError::DuplicateResource(desc.id.clone()));
            }
        }

        for desc in &descriptors {
            for dep in &desc.depends_on {
                if !index.contains_key(dep) {
                    return Err(ConfigError::UnknownDependency {
                        resource: desc.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }

            for reference in references_in(&desc.config)? {
                if !desc.depends_on(&reference.resource) {
                    return Err(ConfigError::InvalidReference {
                        resource: desc.id.clone(),
                        reference: reference.to_string(),
                    });
                }
            }

            scan_for_credentials(desc)?;
        }

        let mut graph = DependencyGraph::new();
        for desc in &descriptors {
            graph.add_resource(&desc.id);
        }
        for desc in &descriptors {
            for dep in &desc.depends_on {
                graph.add_dependency(&desc.id, dep)?;
            }
        }

        let order = graph
            .toposort()?
            .into_iter()
            .filter_map(|id| index.get(&id).copied())
            .collect();

        Ok(Self {
            deployment: deployment.into(),
            descriptors,
            index,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ResourceDescriptor> {
        self.index.get(id).map(|&i| &self.descriptors[i])
    }

    /// Descriptors in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.iter()
    }

    /// Descriptors in dependency order: every descriptor comes after all of
    /// its dependencies
    pub fn ordered(&self) -> impl DoubleEndedIterator<Item = &ResourceDescriptor> {
        self.order.iter().map(|&i| &self.descriptors[i])
    }

    /// Descriptors that directly depend on `id`
    pub fn dependents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ResourceDescriptor> {
        self.descriptors.iter().filter(move |d| d.depends_on(id))
    }

    pub fn by_kind(&self, kind: ResourceKind) -> Vec<&ResourceDescriptor> {
        self.descriptors.iter().filter(|d| d.kind == kind).collect()
    }
}
