//! Output references between resources
//!
//! A config string may embed `${<id>.handle}` or `${<id>.endpoint}`. The
//! referenced resource must be a declared dependency; the executor substitutes
//! its provider handle once it has been created.

use crate::error::{ConfigError, Result};
use crate::model::{ResourceConfig, ResourceDescriptor};
use regex::{Captures, Regex};
use std::fmt;

const REFERENCE_PATTERN: &str = r"\$\{([A-Za-z0-9_\-]+)\.(handle|endpoint)\}";

/// Which part of a dependency's handle is referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputField {
    Handle,
    Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    pub resource: String,
    pub field: OutputField,
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self.field {
            OutputField::Handle => "handle",
            OutputField::Endpoint => "endpoint",
        };
        write!(f, "${{{}.{}}}", self.resource, field)
    }
}

fn pattern() -> Result<Regex> {
    Regex::new(REFERENCE_PATTERN)
        .map_err(|e| ConfigError::InvalidConfig(format!("reference pattern: {}", e)))
}

fn to_ref(caps: &Captures<'_>) -> OutputRef {
    OutputRef {
        resource: caps[1].to_string(),
        field: if &caps[2] == "endpoint" {
            OutputField::Endpoint
        } else {
            OutputField::Handle
        },
    }
}

fn walk_strings<'a>(value: &'a serde_json::Value, out: &mut Vec<&'a str>) {
    match value {
        serde_json::Value::String(s) => out.push(s),
        serde_json::Value::Array(items) => items.iter().for_each(|v| walk_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| walk_strings(v, out)),
        _ => {}
    }
}

/// All output references found anywhere in `config`
pub fn references_in(config: &ResourceConfig) -> Result<Vec<OutputRef>> {
    let re = pattern()?;
    let mut strings = Vec::new();
    config.values().for_each(|v| walk_strings(v, &mut strings));

    let mut refs: Vec<OutputRef> = Vec::new();
    for s in strings {
        for caps in re.captures_iter(s) {
            let r = to_ref(&caps);
            if !refs.contains(&r) {
                refs.push(r);
            }
        }
    }
    Ok(refs)
}

/// Substitute every output reference in the descriptor's config.
///
/// `lookup` returns the value for a reference, or `None` when the dependency
/// has no such output (for example a network without an endpoint).
pub fn resolve_references<F>(desc: &ResourceDescriptor, lookup: F) -> Result<ResourceDescriptor>
where
    F: Fn(&OutputRef) -> Option<String>,
{
    let re = pattern()?;
    let mut resolved = desc.clone();
    for value in resolved.config.values_mut() {
        resolve_value(value, &re, &lookup, &desc.id)?;
    }
    Ok(resolved)
}

fn resolve_value<F>(
    value: &mut serde_json::Value,
    re: &Regex,
    lookup: &F,
    resource: &str,
) -> Result<()>
where
    F: Fn(&OutputRef) -> Option<String>,
{
    match value {
        serde_json::Value::String(s) => {
            let mut missing: Option<OutputRef> = None;
            let replaced = re.replace_all(s.as_str(), |caps: &Captures<'_>| {
                let r = to_ref(caps);
                match lookup(&r) {
                    Some(v) => v,
                    None => {
                        missing.get_or_insert(r);
                        String::new()
                    }
                }
            });
            if let Some(r) = missing {
                return Err(ConfigError::InvalidReference {
                    resource: resource.to_string(),
                    reference: r.to_string(),
                });
            }
            *s = replaced.into_owned();
        }
        serde_json::Value::Array(items) => {
            for item in items {
                resolve_value(item, re, lookup, resource)?;
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values_mut() {
                resolve_value(item, re, lookup, resource)?;
            }
        }
        _ => {}
    }
    Ok(())
}
