//! Registry configuration.
//!
//! # Responsibility
//! - Load provisioning/runtime settings from a JSON file.
//! - Apply `NOTARY_*` environment overrides on top of file values.
//!
//! # Invariants
//! - A loaded config always has a non-empty owner, a database path and a
//!   supported log level.
//! - Unknown keys are rejected so typos never silently fall back to defaults.

use crate::logging::{default_log_level, normalize_level};
use crate::model::directory::AdminPolicy;
use crate::model::identity::Identity;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`RegistryConfig::db_path`].
pub const ENV_DB_PATH: &str = "NOTARY_DB_PATH";
/// Environment variable overriding [`RegistryConfig::owner`].
pub const ENV_OWNER: &str = "NOTARY_OWNER";
/// Environment variable overriding [`RegistryConfig::log_level`].
pub const ENV_LOG_LEVEL: &str = "NOTARY_LOG_LEVEL";

/// Configuration load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings for one registry instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// SQLite database file backing the registry.
    pub db_path: PathBuf,
    /// Registry owner recorded at provisioning.
    pub owner: Identity,
    #[serde(default)]
    pub admin_policy: AdminPolicy,
    #[serde(default = "default_log_level_owned")]
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl RegistryConfig {
    pub fn new(db_path: impl Into<PathBuf>, owner: Identity) -> Self {
        Self {
            db_path: db_path.into(),
            owner,
            admin_policy: AdminPolicy::default(),
            log_level: default_log_level_owned(),
            log_dir: None,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file and applies process environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Reads a JSON config file and applies overrides resolved through `lookup`.
    pub fn load_with(
        path: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json_str(&raw)?;
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Applies `NOTARY_*` overrides resolved through `lookup`.
    ///
    /// Blank values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = read(ENV_DB_PATH) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(owner) = read(ENV_OWNER) {
            self.owner = Identity::parse(&owner)
                .map_err(|err| ConfigError::Invalid(format!("{ENV_OWNER}: {err}")))?;
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path must not be empty".to_string()));
        }
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

fn default_log_level_owned() -> String {
    default_log_level().to_string()
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RegistryConfig, ENV_DB_PATH, ENV_LOG_LEVEL, ENV_OWNER};
    use crate::model::directory::AdminPolicy;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config =
            RegistryConfig::from_json_str(r#"{"db_path": "notary.db", "owner": "root"}"#)
                .expect("config should parse");
        assert_eq!(config.db_path, PathBuf::from("notary.db"));
        assert_eq!(config.owner.as_str(), "root");
        assert_eq!(config.admin_policy, AdminPolicy::Exclusive);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn rejects_unknown_keys_and_empty_owner() {
        let err = RegistryConfig::from_json_str(
            r#"{"db_path": "a.db", "owner": "root", "admins": []}"#,
        )
        .expect_err("unknown key must fail");
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = RegistryConfig::from_json_str(r#"{"db_path": "a.db", "owner": "  "}"#)
            .expect_err("blank owner must fail");
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = RegistryConfig::from_json_str(r#"{"db_path": "a.db", "owner": " root "}"#)
            .expect_err("padded owner must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_unsupported_log_level_from_file_or_env() {
        let err = RegistryConfig::from_json_str(
            r#"{"db_path": "a.db", "owner": "root", "log_level": "verbose"}"#,
        )
        .expect_err("unsupported level must fail");
        assert!(matches!(err, ConfigError::Invalid(ref message) if message.contains("verbose")));

        let mut config = RegistryConfig::from_json_str(
            r#"{"db_path": "a.db", "owner": "root", "log_level": "WARN"}"#,
        )
        .expect("known level should parse");
        let err = config
            .apply_overrides(|key| (key == ENV_LOG_LEVEL).then(|| "loud".to_string()))
            .expect_err("unsupported env level must fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_relative_log_dir() {
        let err = RegistryConfig::from_json_str(
            r#"{"db_path": "a.db", "owner": "root", "log_dir": "logs"}"#,
        )
        .expect_err("relative log dir must fail");
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn env_overrides_replace_file_values_and_skip_blanks() {
        let mut config = RegistryConfig::from_json_str(
            r#"{"db_path": "a.db", "owner": "root", "admin_policy": "shared"}"#,
        )
        .expect("config should parse");
        let env = HashMap::from([
            (ENV_DB_PATH.to_string(), "/var/lib/notary.db".to_string()),
            (ENV_OWNER.to_string(), "   ".to_string()),
        ]);

        config
            .apply_overrides(|key| env.get(key).cloned())
            .expect("overrides should apply");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/notary.db"));
        assert_eq!(config.owner.as_str(), "root");
        assert_eq!(config.admin_policy, AdminPolicy::Shared);
    }

    #[test]
    fn load_with_reads_file_then_applies_lookup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notary.json");
        std::fs::write(&path, r#"{"db_path": "file.db", "owner": "root"}"#)
            .expect("write config");

        let config = RegistryConfig::load_with(&path, |key| {
            (key == ENV_OWNER).then(|| "operator".to_string())
        })
        .expect("config should load");
        assert_eq!(config.db_path, PathBuf::from("file.db"));
        assert_eq!(config.owner.as_str(), "operator");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = RegistryConfig::load(dir.path().join("missing.json"))
            .expect_err("missing file must fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
