use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of infrastructure resource a descriptor creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    Subnet,
    DatabaseInstance,
    CacheInstance,
    Secret,
    Service,
    SchedulerJob,
    Function,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::DatabaseInstance,
        ResourceKind::CacheInstance,
        ResourceKind::Secret,
        ResourceKind::Service,
        ResourceKind::SchedulerJob,
        ResourceKind::Function,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::DatabaseInstance => "database-instance",
            ResourceKind::CacheInstance => "cache-instance",
            ResourceKind::Secret => "secret",
            ResourceKind::Service => "service",
            ResourceKind::SchedulerJob => "scheduler-job",
            ResourceKind::Function => "function",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // snake_case is accepted as well since KDL authors tend to mix both
        let normalized = s.trim().replace('_', "-");
        ResourceKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_names() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_accepts_snake_case() {
        assert_eq!(
            "database_instance".parse::<ResourceKind>().unwrap(),
            ResourceKind::DatabaseInstance
        );
        assert!("bucket".parse::<ResourceKind>().is_err());
    }
}
