//! Vault runtime configuration.
//!
//! # Responsibility
//! - Load a JSON configuration file with per-field defaults.
//! - Validate values before anything opens a database or a log file.
//!
//! # Invariants
//! - A validated config never lowers the KDF work factor below the seal floor.
//! - `log_dir`, when set, is absolute.

use crate::envelope::kdf::{DEFAULT_ITERATIONS, MIN_SEAL_ITERATIONS};
use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DATABASE_FILE: &str = "pen.sqlite3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime settings for one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    pub database_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    /// PBKDF2 work factor for newly sealed exports.
    pub kdf_iterations: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            log_level: default_log_level().to_string(),
            log_dir: None,
            kdf_iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl VaultConfig {
    /// Reads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a missing file yields validated defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database_path cannot be empty".into()));
        }
        normalize_level(&self.log_level).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(dir) = self.log_dir.as_ref() {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        if self.kdf_iterations < MIN_SEAL_ITERATIONS {
            return Err(ConfigError::Invalid(format!(
                "kdf_iterations {} below minimum {MIN_SEAL_ITERATIONS}",
                self.kdf_iterations
            )));
        }
        Ok(())
    }

    /// Seal options carrying this config's work factor.
    pub fn seal_options(&self, hint: Option<String>) -> crate::envelope::SealOptions {
        crate::envelope::SealOptions {
            iterations: self.kdf_iterations,
            hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pen.json");
        std::fs::write(&path, r#"{"database_path": "/tmp/vault.sqlite3"}"#).unwrap();

        let config = VaultConfig::load(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/vault.sqlite3"));
        assert_eq!(config.kdf_iterations, DEFAULT_ITERATIONS);
        assert_eq!(config.log_level, default_log_level());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::load_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, VaultConfig::default());
    }

    #[test]
    fn validate_rejects_weak_kdf_and_relative_log_dir() {
        let weak = VaultConfig {
            kdf_iterations: 1_000,
            ..VaultConfig::default()
        };
        assert!(matches!(weak.validate(), Err(ConfigError::Invalid(_))));

        let relative = VaultConfig {
            log_dir: Some(PathBuf::from("logs")),
            ..VaultConfig::default()
        };
        assert!(matches!(relative.validate(), Err(ConfigError::Invalid(_))));

        let bad_level = VaultConfig {
            log_level: "loud".to_string(),
            ..VaultConfig::default()
        };
        assert!(matches!(bad_level.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pen.json");
        std::fs::write(&path, r#"{"kdf_rounds": 5}"#).unwrap();
        assert!(matches!(
            VaultConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
