//! Credential scan over descriptor configuration
//!
//! Descriptors are committed alongside application code, so literal secret
//! material is refused at load time. Secrets reach the provider through
//! `value_env` (read from the environment when the resource is created),
//! `generate`, or an output reference to a `secret` resource.

use crate::error::{ConfigError, Result};
use crate::model::{ResourceDescriptor, ResourceKind};
use regex::Regex;

const SENSITIVE_KEY_PARTS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "api_key",
    "apikey",
    "private_key",
    "credential",
    "client_secret",
];

/// A value made only of output references, e.g. `${db-password.handle}`
const REFERENCE_ONLY: &str = r"^(\s*\$\{[A-Za-z0-9_\-]+\.(handle|endpoint)\}\s*)+$";

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase().replace('-', "_");
    if key.ends_with("_env") {
        return false;
    }
    SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part))
}

fn is_literal(value: &str, reference_only: &Regex) -> bool {
    !value.trim().is_empty() && !reference_only.is_match(value)
}

/// Reject descriptors that carry literal credentials
pub fn scan_for_credentials(desc: &ResourceDescriptor) -> Result<()> {
    let reference_only = Regex::new(REFERENCE_ONLY)
        .map_err(|e| ConfigError::InvalidConfig(format!("credential pattern: {}", e)))?;

    // a secret's payload is always sensitive, whatever the key is called
    if desc.kind == ResourceKind::Secret
        && let Some(value) = desc.get_str("value")
        && is_literal(value, &reference_only)
    {
        return Err(ConfigError::EmbeddedCredential {
            resource: desc.id.clone(),
            key: "value".to_string(),
        });
    }

    for (key, value) in &desc.config {
        scan_value(desc, key, value, &reference_only)?;
    }
    Ok(())
}

fn scan_value(
    desc: &ResourceDescriptor,
    path: &str,
    value: &serde_json::Value,
    reference_only: &Regex,
) -> Result<()> {
    match value {
        serde_json::Value::String(s) => {
            let key = path.rsplit('.').next().unwrap_or(path);
            if is_sensitive_key(key) && is_literal(s, reference_only) {
                return Err(ConfigError::EmbeddedCredential {
                    resource: desc.id.clone(),
                    key: path.to_string(),
                });
            }
        }
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                scan_value(desc, &format!("{}.{}", path, k), v, reference_only)?;
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                scan_value(desc, path, item, reference_only)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_password_rejected() {
        let desc = ResourceDescriptor::new("db", ResourceKind::DatabaseInstance)
            .with_config("root_password", json!("hunter2"));
        let err = scan_for_credentials(&desc).unwrap_err();
        assert!(matches!(err, ConfigError::EmbeddedCredential { ref key, .. } if key == "root_password"));
    }

    #[test]
    fn test_nested_literal_token_rejected() {
        let desc = ResourceDescriptor::new("api", ResourceKind::Service)
            .with_config("env", json!({ "GITHUB_TOKEN": "ghp_abc" }));
        let err = scan_for_credentials(&desc).unwrap_err();
        assert!(matches!(err, ConfigError::EmbeddedCredential { ref key, .. } if key == "env.GITHUB_TOKEN"));
    }

    #[test]
    fn test_references_and_env_names_allowed() {
        let desc = ResourceDescriptor::new("api", ResourceKind::Service)
            .with_config("secrets", json!({ "DB_PASSWORD": "${db-password.handle}" }))
            .with_config("password_env", json!("DB_PASSWORD"))
            .with_config("password_length", json!(32));
        assert!(scan_for_credentials(&desc).is_ok());
    }

    #[test]
    fn test_secret_value_must_not_be_literal() {
        let literal = ResourceDescriptor::new("s", ResourceKind::Secret)
            .with_config("value", json!("plaintext"));
        assert!(scan_for_credentials(&literal).is_err());

        let from_env = ResourceDescriptor::new("s", ResourceKind::Secret)
            .with_config("value_env", json!("APP_SECRET"));
        assert!(scan_for_credentials(&from_env).is_ok());

        // a plain "value" on other kinds is not a credential
        let svc = ResourceDescriptor::new("svc", ResourceKind::Service)
            .with_config("value", json!("anything"));
        assert!(scan_for_credentials(&svc).is_ok());
    }
}
