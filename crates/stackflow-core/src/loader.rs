//! Descriptor loader
//!
//! Ties together variable extraction, template expansion and parsing.

use crate::error::{ConfigError, Result};
use crate::model::DescriptorSet;
use crate::parser::parse_kdl_string;
use crate::template::{TemplateProcessor, extract_variables};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Load and validate the descriptor file at `path`.
///
/// The deployment name defaults to the name of the directory holding the
/// file when the file has no `deployment` node.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<DescriptorSet> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let default_name = path
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(deployment_name_from_dir)
        .unwrap_or_else(|| "default".to_string());

    let mut processor = TemplateProcessor::new();
    if let Some(root) = path.parent() {
        processor.add_variable(
            "STACK_ROOT",
            serde_json::Value::String(root.to_string_lossy().to_string()),
        );
    }
    load_str_with(&content, default_name, processor)
}

/// Turn a directory name into a usable deployment name: leading dots are
/// dropped and anything outside `[A-Za-z0-9_-]` becomes `-`
fn deployment_name_from_dir(dir: &str) -> String {
    let name: String = dir
        .trim_start_matches('.')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if name.is_empty() {
        "default".to_string()
    } else {
        name
    }
}

/// Load descriptors from a string, with environment variables available to
/// templates
pub fn load_str(content: &str, default_deployment: impl Into<String>) -> Result<DescriptorSet> {
    load_str_with(content, default_deployment.into(), TemplateProcessor::new())
}

fn load_str_with(
    content: &str,
    default_deployment: String,
    mut processor: TemplateProcessor,
) -> Result<DescriptorSet> {
    debug!("Step 1: Extracting variables");
    let variables = extract_variables(content)?;

    debug!("Step 2: Expanding templates");
    processor.add_env_variables();
    processor.add_variables(variables);
    let expanded = processor.render_str(content)?;

    debug!("Step 3: Parsing KDL");
    let set = parse_kdl_string(&expanded, default_deployment)?;
    info!(
        deployment = %set.deployment,
        resources = set.len(),
        "Descriptor set loaded"
    );
    Ok(set)
}
