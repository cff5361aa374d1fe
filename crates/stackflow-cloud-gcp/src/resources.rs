//! gcloud commands per resource kind
//!
//! Builds describe/create/delete invocations from descriptors and extracts
//! provider handles from describe output.

use crate::error::{GcloudError, Result};
use crate::gcloud::Invocation;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;
use stackflow_cloud::ProviderHandle;
use stackflow_core::{ResourceDescriptor, ResourceKind};
use std::collections::BTreeMap;

const DEFAULT_DATABASE_VERSION: &str = "POSTGRES_15";
const DEFAULT_DATABASE_TIER: &str = "db-f1-micro";
const DEFAULT_GENERATED_LENGTH: usize = 32;

/// Where a resource lives at the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub region: String,
}

impl Target {
    /// `name` and `region` settings override the descriptor id and the
    /// provider's default region
    pub fn of(desc: &ResourceDescriptor, default_region: &str) -> Self {
        Self {
            name: desc.get_str("name").unwrap_or(&desc.id).to_string(),
            region: desc.get_str("region").unwrap_or(default_region).to_string(),
        }
    }
}

fn required<'a>(desc: &'a ResourceDescriptor, key: &str) -> Result<&'a str> {
    desc.get_str(key).ok_or_else(|| GcloudError::MissingSetting {
        resource: desc.id.clone(),
        key: key.to_string(),
    })
}

fn flag_value(desc: &ResourceDescriptor, key: &str) -> Option<String> {
    desc.config.get(key).and_then(stackflow_core::value_to_string)
}

fn enabled(desc: &ResourceDescriptor, key: &str) -> bool {
    desc.get_config::<bool>(key).unwrap_or(false)
}

/// Render `KEY=VALUE` pairs for gcloud list flags, switching to gcloud's
/// alternate delimiter syntax when a value contains a comma
pub fn join_pairs(pairs: &BTreeMap<String, String>) -> String {
    let needs_escape = pairs.values().any(|v| v.contains(','));
    let joined: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    if needs_escape {
        format!("^|^{}", joined.join("|"))
    } else {
        joined.join(",")
    }
}

pub fn describe(kind: ResourceKind, target: &Target) -> Invocation {
    let name = target.name.as_str();
    let region = target.region.as_str();
    match kind {
        ResourceKind::Network => Invocation::new(["compute", "networks", "describe", name]),
        ResourceKind::Subnet => {
            Invocation::new(["compute", "networks", "subnets", "describe", name]).flag("region", region)
        }
        ResourceKind::DatabaseInstance => Invocation::new(["sql", "instances", "describe", name]),
        ResourceKind::CacheInstance => {
            Invocation::new(["redis", "instances", "describe", name]).flag("region", region)
        }
        ResourceKind::Secret => Invocation::new(["secrets", "describe", name]),
        ResourceKind::Service => {
            Invocation::new(["run", "services", "describe", name]).flag("region", region)
        }
        ResourceKind::SchedulerJob => {
            Invocation::new(["scheduler", "jobs", "describe", name]).flag("location", region)
        }
        ResourceKind::Function => Invocation::new(["functions", "describe", name])
            .flag("region", region)
            .arg("--gen2"),
    }
}

pub fn delete(kind: ResourceKind, target: &Target) -> Invocation {
    let name = target.name.as_str();
    let region = target.region.as_str();
    match kind {
        ResourceKind::Network => Invocation::new(["compute", "networks", "delete", name]),
        ResourceKind::Subnet => {
            Invocation::new(["compute", "networks", "subnets", "delete", name]).flag("region", region)
        }
        ResourceKind::DatabaseInstance => Invocation::new(["sql", "instances", "delete", name]),
        ResourceKind::CacheInstance => {
            Invocation::new(["redis", "instances", "delete", name]).flag("region", region)
        }
        ResourceKind::Secret => Invocation::new(["secrets", "delete", name]),
        ResourceKind::Service => {
            Invocation::new(["run", "services", "delete", name]).flag("region", region)
        }
        ResourceKind::SchedulerJob => {
            Invocation::new(["scheduler", "jobs", "delete", name]).flag("location", region)
        }
        ResourceKind::Function => Invocation::new(["functions", "delete", name])
            .flag("region", region)
            .arg("--gen2"),
    }
}

pub fn create_network(desc: &ResourceDescriptor, target: &Target) -> Result<Invocation> {
    let mode = desc.get_str("mode").unwrap_or("custom");
    Ok(Invocation::new(["compute", "networks", "create", target.name.as_str()])
        .flag("subnet-mode", mode)
        .flag_opt("description", desc.get_str("description")))
}

pub fn create_subnet(desc: &ResourceDescriptor, target: &Target) -> Result<Invocation> {
    Ok(
        Invocation::new(["compute", "networks", "subnets", "create", target.name.as_str()])
            .flag("network", required(desc, "network")?)
            .flag("range", required(desc, "range")?)
            .flag("region", &target.region)
            .switch(
                "enable-private-ip-google-access",
                enabled(desc, "private_google_access"),
            ),
    )
}

pub fn create_database(desc: &ResourceDescriptor, target: &Target) -> Result<Invocation> {
    Ok(Invocation::new(["sql", "instances", "create", target.name.as_str()])
        .flag(
            "database-version",
            desc.get_str("database_version").unwrap_or(DEFAULT_DATABASE_VERSION),
        )
        .flag("tier", desc.get_str("tier").unwrap_or(DEFAULT_DATABASE_TIER))
        .flag("region", &target.region)
        .flag_opt("storage-size", flag_value(desc, "storage_gb").map(|s| format!("{}GB", s)))
        .flag_opt("network", desc.get_str("network"))
        .switch("no-assign-ip", enabled(desc, "private")))
}

/// Databases to create inside an instance after it exists
pub fn database_names(desc: &ResourceDescriptor) -> Vec<String> {
    match desc.config.get("databases") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(stackflow_core::value_to_string)
            .collect(),
        Some(other) => stackflow_core::value_to_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}

pub fn create_sql_database(instance: &str, database: &str) -> Invocation {
    Invocation::new(["sql", "databases", "create", database]).flag("instance", instance)
}

pub fn create_cache(desc: &ResourceDescriptor, target: &Target) -> Result<Invocation> {
    Ok(Invocation::new(["redis", "instances", "create", target.name.as_str()])
        .flag("size", flag_value(desc, "size_gb").unwrap_or_else(|| "1".to_string()))
        .flag("region", &target.region)
        .flag("tier", desc.get_str("tier").unwrap_or("basic"))
        .flag_opt("redis-version", desc.get_str("redis_version"))
        .flag_opt("network", desc.get_str("network")))
}

/// Secret payload from `value`, `value_env` or `generate`
pub fn secret_payload(desc: &ResourceDescriptor) -> Result<String> {
    if let Some(value) = desc.get_str("value") {
        return Ok(value.to_string());
    }
    if let Some(var) = desc.get_str("value_env") {
        return std::env::var(var).map_err(|_| GcloudError::MissingEnv {
            resource: desc.id.clone(),
            var: var.to_string(),
        });
    }
    if desc.config.contains_key("generate") {
        let length = desc
            .get_config::<usize>("generate")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_GENERATED_LENGTH);
        return Ok(generate_secret(length));
    }
    Err(GcloudError::MissingSetting {
        resource: desc.id.clone(),
        key: "value_env".to_string(),
    })
}

pub fn generate_secret(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn create_secret(desc: &ResourceDescriptor, target: &Target) -> Result<Invocation> {
    let payload = secret_payload(desc)?;
    Ok(Invocation::new(["secrets", "create", target.name.as_str()])
        .flag(
            "replication-policy",
            desc.get_str("replication").unwrap_or("automatic"),
        )
        .arg("--data-file=-")
        .with_stdin(payload))
}

/// `ENV=secret:version` pairs for `--set-secrets`
fn secret_bindings(desc: &ResourceDescriptor) -> BTreeMap<String, String> {
    desc.get_map("secrets")
        .into_iter()
        .map(|(env, secret)| {
            let binding = if secret.contains(':') {
                secret
            } else {
                format!("{}:latest", secret)
            };
            (env, binding)
        })
        .collect()
}

pub fn create_service(desc: &ResourceDescriptor, target: &Target) -> Result<Invocation> {
    let env = desc.get_map("env");
    let secrets = secret_bindings(desc);

    Ok(Invocation::new(["run", "deploy", target.name.as_str()])
        .flag("image", required(desc, "image")?)
        .flag("region", &target.region)
        .flag("platform", "managed")
        .flag_opt("port", flag_value(desc, "port"))
        .flag_opt("memory", desc.get_str("memory"))
        .flag_opt("min-instances", flag_value(desc, "min_instances"))
        .flag_opt("max-instances", flag_value(desc, "max_instances"))
        .flag_opt("vpc-connector", desc.get_str("vpc_connector"))
        .flag_opt("add-cloudsql-instances", desc.get_str("cloudsql_instance"))
        .flag_opt("set-env-vars", (!env.is_empty()).then(|| join_pairs(&env)))
        .flag_opt("set-secrets", (!secrets.is_empty()).then(|| join_pairs(&secrets)))
        .switch("allow-unauthenticated", enabled(desc, "public")))
}

pub fn create_scheduler_job(desc: &ResourceDescriptor, target: &Target) -> Result<Invocation> {
    Ok(Invocation::new(["scheduler", "jobs", "create", "http", target.name.as_str()])
        .flag("location", &target.region)
        .flag("schedule", required(desc, "schedule")?)
        .flag("uri", required(desc, "uri")?)
        .flag("http-method", desc.get_str("http_method").unwrap_or("POST"))
        .flag("time-zone", desc.get_str("time_zone").unwrap_or("Etc/UTC"))
        .flag_opt("message-body", desc.get_str("body")))
}

pub fn create_function(desc: &ResourceDescriptor, target: &Target) -> Result<Invocation> {
    let env = desc.get_map("env");

    Ok(Invocation::new(["functions", "deploy", target.name.as_str()])
        .arg("--gen2")
        .flag("region", &target.region)
        .flag("runtime", required(desc, "runtime")?)
        .flag("entry-point", required(desc, "entry_point")?)
        .flag("source", required(desc, "source")?)
        .arg("--trigger-http")
        .flag_opt("memory", desc.get_str("memory"))
        .flag_opt("set-env-vars", (!env.is_empty()).then(|| join_pairs(&env)))
        .switch("allow-unauthenticated", enabled(desc, "public")))
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn default_port(database_version: &str) -> u16 {
    if database_version.starts_with("MYSQL") {
        3306
    } else if database_version.starts_with("SQLSERVER") {
        1433
    } else {
        5432
    }
}

/// Extract the provider handle from describe output
pub fn handle_from(kind: ResourceKind, target: &Target, described: &Value) -> ProviderHandle {
    let name = target.name.as_str();
    match kind {
        ResourceKind::Network | ResourceKind::Subnet => {
            ProviderHandle::new(str_at(described, &["selfLink"]).unwrap_or(name))
        }
        ResourceKind::DatabaseInstance => {
            let handle = ProviderHandle::new(str_at(described, &["connectionName"]).unwrap_or(name));
            let version = str_at(described, &["databaseVersion"]).unwrap_or(DEFAULT_DATABASE_VERSION);
            let ip = described
                .get("ipAddresses")
                .and_then(Value::as_array)
                .and_then(|ips| ips.first())
                .and_then(|ip| str_at(ip, &["ipAddress"]));
            match ip {
                Some(ip) => handle.with_endpoint(format!("{}:{}", ip, default_port(version))),
                None => handle,
            }
        }
        ResourceKind::CacheInstance => {
            let handle = ProviderHandle::new(str_at(described, &["name"]).unwrap_or(name));
            let host = str_at(described, &["host"]);
            let port = described.get("port").and_then(Value::as_u64).unwrap_or(6379);
            match host {
                Some(host) => handle.with_endpoint(format!("{}:{}", host, port)),
                None => handle,
            }
        }
        ResourceKind::Secret | ResourceKind::SchedulerJob => {
            ProviderHandle::new(str_at(described, &["name"]).unwrap_or(name))
        }
        ResourceKind::Service => {
            let handle = ProviderHandle::new(str_at(described, &["metadata", "name"]).unwrap_or(name));
            match str_at(described, &["status", "url"]) {
                Some(url) => handle.with_endpoint(url),
                None => handle,
            }
        }
        ResourceKind::Function => {
            let handle = ProviderHandle::new(str_at(described, &["name"]).unwrap_or(name));
            let url = str_at(described, &["url"])
                .or_else(|| str_at(described, &["serviceConfig", "uri"]))
                .or_else(|| str_at(described, &["httpsTrigger", "url"]));
            match url {
                Some(url) => handle.with_endpoint(url),
                None => handle,
            }
        }
    }
}

/// Reject an existing resource whose settings contradict the descriptor
pub fn check_compatible(desc: &ResourceDescriptor, described: &Value) -> Result<()> {
    let mismatch = |detail: String| GcloudError::Incompatible {
        resource: desc.id.clone(),
        detail,
    };

    match desc.kind {
        ResourceKind::DatabaseInstance => {
            let wanted = desc.get_str("database_version").unwrap_or(DEFAULT_DATABASE_VERSION);
            match str_at(described, &["databaseVersion"]) {
                Some(actual) if actual != wanted => Err(mismatch(format!(
                    "database version is {}, descriptor wants {}",
                    actual, wanted
                ))),
                _ => Ok(()),
            }
        }
        ResourceKind::Network => {
            let wants_auto = desc.get_str("mode") == Some("auto");
            match described.get("autoCreateSubnetworks").and_then(Value::as_bool) {
                Some(auto) if auto != wants_auto => Err(mismatch(format!(
                    "subnet mode is {}",
                    if auto { "auto" } else { "custom" }
                ))),
                _ => Ok(()),
            }
        }
        ResourceKind::Subnet => match (desc.get_str("range"), str_at(described, &["ipCidrRange"])) {
            (Some(wanted), Some(actual)) if wanted != actual => Err(mismatch(format!(
                "range is {}, descriptor wants {}",
                actual, wanted
            ))),
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}
