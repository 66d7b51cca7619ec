//! warrant.toml の読み込み
//!
//! ```toml
//! log_filter = "info"
//! run_log_capacity = 100
//!
//! [[jobs]]
//! name = "SendReport"
//! roles = ["Admin"]
//! allow_concurrent_execution = false
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use warrant_core::impls::DEFAULT_RUN_LOG_CAPACITY;

use crate::jobs::KINDS;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown job `{0}` (known jobs: {known})", known = KINDS.join(", "))]
    UnknownJob(String),

    #[error("job `{0}` is configured more than once")]
    DuplicateJob(String),

    #[error("run_log_capacity must be at least 1")]
    ZeroCapacity,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarrantConfig {
    /// Used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub run_log_capacity: usize,
    pub jobs: Vec<JobConfig>,
}

/// Overrides the built-in definition of one job.
///
/// `roles` left out means nobody may run the job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub allow_concurrent_execution: bool,
}

impl Default for WarrantConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            run_log_capacity: DEFAULT_RUN_LOG_CAPACITY,
            jobs: Vec::new(),
        }
    }
}

impl WarrantConfig {
    /// Missing file means built-in defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.run_log_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        let mut seen = BTreeSet::new();
        for job in &self.jobs {
            if !KINDS.contains(&job.name.as_str()) {
                return Err(ConfigError::UnknownJob(job.name.clone()));
            }
            if !seen.insert(job.name.as_str()) {
                return Err(ConfigError::DuplicateJob(job.name.clone()));
            }
        }
        Ok(())
    }

    pub fn job(&self, name: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = WarrantConfig::load(&dir.path().join("warrant.toml")).unwrap();
        assert_eq!(config, WarrantConfig::default());
        assert_eq!(config.run_log_capacity, DEFAULT_RUN_LOG_CAPACITY);
    }

    #[test]
    fn load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warrant.toml");
        std::fs::write(
            &path,
            r#"
log_filter = "warrant=debug"
run_log_capacity = 5

[[jobs]]
name = "SendReport"
roles = ["Admin", "Ops"]

[[jobs]]
name = "Cleanup"
allow_concurrent_execution = true
"#,
        )
        .unwrap();

        let config = WarrantConfig::load(&path).unwrap();
        assert_eq!(config.log_filter, "warrant=debug");
        assert_eq!(config.run_log_capacity, 5);

        let send_report = config.job("SendReport").unwrap();
        assert_eq!(send_report.roles, vec!["Admin", "Ops"]);
        assert!(!send_report.allow_concurrent_execution);

        let cleanup = config.job("Cleanup").unwrap();
        assert!(cleanup.roles.is_empty());
        assert!(cleanup.allow_concurrent_execution);

        assert!(config.job("Flaky").is_none());
    }

    #[test]
    fn unknown_job_is_rejected() {
        let err = WarrantConfig::from_toml_str(
            r#"
[[jobs]]
name = "Backup"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownJob(name) if name == "Backup"));
    }

    #[test]
    fn duplicate_job_is_rejected() {
        let err = WarrantConfig::from_toml_str(
            r#"
[[jobs]]
name = "SendReport"

[[jobs]]
name = "SendReport"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateJob(_)));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = WarrantConfig::from_toml_str("run_log_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity));
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let err = WarrantConfig::from_toml_str("retries = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
