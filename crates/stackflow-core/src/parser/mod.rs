//! KDL parser
//!
//! Parses a rendered descriptor file into a validated `DescriptorSet`.

mod resource;

pub use resource::parse_resource;

use crate::error::{ConfigError, Result};
use crate::model::DescriptorSet;
use kdl::KdlDocument;

/// Parse rendered KDL into a descriptor set.
///
/// `default_deployment` is used when the file has no `deployment` node.
pub fn parse_kdl_string(content: &str, default_deployment: String) -> Result<DescriptorSet> {
    let doc: KdlDocument = content.parse()?;

    let mut deployment = default_deployment;
    let mut descriptors = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "deployment" => {
                deployment = node
                    .entries()
                    .first()
                    .and_then(|e| e.value().as_string())
                    .ok_or_else(|| {
                        ConfigError::InvalidConfig("deployment requires a name".to_string())
                    })?
                    .to_string();
            }
            "resource" => descriptors.push(parse_resource(node)?),
            // consumed before rendering
            "variables" => {}
            other => {
                tracing::debug!(node = other, "Skipping unknown top-level node");
            }
        }
    }

    // the name becomes a directory under the state root
    if deployment.is_empty()
        || !deployment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::InvalidConfig(format!(
            "invalid deployment name '{}': use letters, digits, '-' or '_'",
            deployment
        )));
    }

    DescriptorSet::new(deployment, descriptors)
}
