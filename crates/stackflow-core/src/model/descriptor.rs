use super::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource-specific settings, ordered for stable output
pub type ResourceConfig = BTreeMap<String, serde_json::Value>;

/// Declarative description of one resource to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Unique identifier within the deployment
    pub id: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Kind-specific settings
    #[serde(default)]
    pub config: ResourceConfig,

    /// Ids that must be created before this one, in declaration order
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            config: ResourceConfig::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    /// Nested string map such as `env { KEY "value" }`
    pub fn get_map(&self, key: &str) -> BTreeMap<String, String> {
        self.config
            .get(key)
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| value_to_string(v).map(|s| (k.clone(), s)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.depends_on.iter().any(|d| d == id)
    }
}

/// Render scalar JSON values the way a CLI flag expects them
pub fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
