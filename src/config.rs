//! `perfsift.toml` config loading.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::{CallstackOptions, PerfsiftError, PerfsiftResult, Thresholds};

pub const DEFAULT_CONFIG_FILE: &str = "perfsift.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct Config {
    /// Metric bounds used by the classifier.
    pub thresholds: Thresholds,

    /// Thread/function limits used by the call-stack analyzer.
    pub callstack: CallstackOptions,
}

impl Config {
    /// Loads a config the user asked for by path; any failure is fatal.
    pub fn load(path: &Path) -> PerfsiftResult<Self> {
        let s = std::fs::read_to_string(path).map_err(|err| {
            PerfsiftError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        let cfg: Config = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads the implicit config file, falling back to defaults on any problem.
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<Config>(&s) {
                Ok(cfg) => match cfg.validate() {
                    Ok(()) => cfg,
                    Err(err) => {
                        tracing::warn!("ignoring config {}: {err}", path.display());
                        Self::default()
                    }
                },
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> PerfsiftResult<()> {
        self.thresholds.validate()?;
        if self.callstack.top_threads == 0 {
            return Err(PerfsiftError::Config(
                "callstack.top_threads must be at least 1".to_string(),
            ));
        }
        if self.callstack.top_functions == 0 {
            return Err(PerfsiftError::Config(
                "callstack.top_functions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
