//! resource node parsing

use crate::error::{ConfigError, Result};
use crate::model::{ResourceDescriptor, ResourceKind};
use crate::template::kdl_to_json;
use kdl::{KdlEntry, KdlNode};

fn positional(node: &KdlNode) -> impl Iterator<Item = &KdlEntry> {
    node.entries().iter().filter(|e| e.name().is_none())
}

fn property<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlEntry> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
}

/// Parse a `resource "<id>" kind="<kind>" { ... }` node
pub fn parse_resource(node: &KdlNode) -> Result<ResourceDescriptor> {
    let id = positional(node)
        .next()
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| ConfigError::InvalidConfig("resource requires an id".to_string()))?
        .to_string();

    let kind_name = property(node, "kind")
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| {
            ConfigError::InvalidConfig(format!("resource '{}' requires kind=\"...\"", id))
        })?;
    let kind: ResourceKind = kind_name.parse().map_err(|kind| ConfigError::UnknownKind {
        resource: id.clone(),
        kind,
    })?;

    let mut desc = ResourceDescriptor::new(id, kind);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "depends_on" | "depends-on" => {
                    for dep in positional(child).filter_map(|e| e.value().as_string()) {
                        desc = desc.with_dependency(dep);
                    }
                }
                key => {
                    desc.config.insert(key.to_string(), node_value(child));
                }
            }
        }
    }

    Ok(desc)
}

/// Value of a config node: a block becomes a map, several arguments a list,
/// a bare node `true`
fn node_value(node: &KdlNode) -> serde_json::Value {
    if let Some(children) = node.children() {
        let mut map = serde_json::Map::new();
        for child in children.nodes() {
            map.insert(child.name().value().to_string(), node_value(child));
        }
        return serde_json::Value::Object(map);
    }

    let mut values: Vec<serde_json::Value> =
        positional(node).map(|e| kdl_to_json(e.value())).collect();
    match values.len() {
        0 => serde_json::Value::Bool(true),
        1 => values.remove(0),
        _ => serde_json::Value::Array(values),
    }
}
