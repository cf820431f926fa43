//! Runtime configuration.
//!
//! Defaults, optionally overlaid by `~/.config/pipguard/config.toml` (or an
//! explicit `--config` file), then by command-line flags.

use crate::error::{GuardianError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// Directory holding snapshots, rollback scripts and session logs
    pub log_dir: PathBuf,
    /// Interpreter whose pip is driven
    pub python: String,
    /// Upper bound for every package-manager call
    pub command_timeout_secs: u64,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            python: "python3".to_string(),
            command_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Values supplied on the command line; `None` keeps the file/default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_dir: Option<PathBuf>,
    pub python: Option<String>,
    pub command_timeout_secs: Option<u64>,
}

impl GuardianConfig {
    /// Load configuration. An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GuardianError::Config(format!("Failed to read '{}': {e}", path.display()))
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(log_dir) = overrides.log_dir {
            self.log_dir = log_dir;
        }
        if let Some(python) = overrides.python {
            self.python = python;
        }
        if let Some(secs) = overrides.command_timeout_secs {
            self.command_timeout_secs = secs;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(GuardianError::Config(
                "command_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.python.trim().is_empty() {
            return Err(GuardianError::Config(
                "python interpreter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pip-upgrade-logs")
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pipguard").join("config.toml"))
}
