//! Runtime settings
//!
//! Loaded from `<config_dir>/settings.yaml` when present, then overridden by
//! `STACK_*` environment variables.

use crate::error::{Result, SettingsError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Attempts per resource for transient failures, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_backoff_ms: u64,

    /// Upper bound for the retry delay
    pub max_backoff_ms: u64,

    /// Timeout of a single provider call
    pub call_timeout_secs: u64,

    /// Directory holding `.stackflow/<deployment>/state.json`;
    /// defaults to the directory of the descriptor file
    pub state_dir: Option<PathBuf>,

    pub gcp: GcpSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpSettings {
    pub project: Option<String>,
    pub region: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            call_timeout_secs: 120,
            state_dir: None,
            gcp: GcpSettings::default(),
        }
    }
}

impl Default for GcpSettings {
    fn default() -> Self {
        Self {
            project: None,
            region: "us-central1".to_string(),
        }
    }
}

impl Settings {
    /// Load user settings and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = match crate::get_config_dir() {
            Ok(dir) => Self::from_file(&dir.join(SETTINGS_FILE))?,
            Err(e) => {
                tracing::debug!(error = %e, "No config directory, using defaults");
                Self::default()
            }
        };
        settings.apply_env(std::env::vars())?;
        Ok(settings)
    }

    /// Read a settings file; a missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `STACK_*` overrides from the given variables
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "STACK_MAX_ATTEMPTS" => self.max_attempts = parse_number(&key, &value)?,
                "STACK_INITIAL_BACKOFF_MS" => {
                    self.initial_backoff_ms = parse_number(&key, &value)?
                }
                "STACK_MAX_BACKOFF_MS" => self.max_backoff_ms = parse_number(&key, &value)?,
                "STACK_CALL_TIMEOUT_SECS" => {
                    self.call_timeout_secs = parse_number(&key, &value)?
                }
                "STACK_STATE_DIR" => self.state_dir = Some(PathBuf::from(value)),
                "STACK_GCP_PROJECT" => self.gcp.project = Some(value),
                "STACK_GCP_REGION" => self.gcp.region = value,
                _ => {}
            }
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SettingsError::InvalidValue {
                key: "max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.call_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue {
                key: "call_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.call_timeout_secs, 120);
        assert_eq!(settings.gcp.region, "us-central1");
    }

    #[test]
    fn test_yaml_overrides_only_given_fields() {
        let settings = Settings::from_yaml_str(
            "max_attempts: 5\ngcp:\n  project: demo-project\n",
        )
        .unwrap();
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.call_timeout_secs, 120);
        assert_eq!(settings.gcp.project.as_deref(), Some("demo-project"));
        assert_eq!(settings.gcp.region, "us-central1");
    }

    #[test]
    fn test_env_overrides_yaml() {
        let mut settings = Settings::from_yaml_str("max_attempts: 5\n").unwrap();
        settings
            .apply_env(vars(&[
                ("STACK_MAX_ATTEMPTS", "2"),
                ("STACK_GCP_REGION", "asia-northeast1"),
                ("HOME", "/root"),
            ]))
            .unwrap();
        assert_eq!(settings.max_attempts, 2);
        assert_eq!(settings.gcp.region, "asia-northeast1");
    }

    #[test]
    fn test_invalid_env_value() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(vars(&[("STACK_CALL_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { ref key, .. } if key == "STACK_CALL_TIMEOUT_SECS"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(Settings::from_yaml_str("max_attempts: 0\n").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_file(&dir.path().join("settings.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
