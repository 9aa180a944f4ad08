use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "RENJU_CONFIG";

/// Server configuration, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// Directory holding one JSON file per game.
    pub data_dir: PathBuf,
    /// Directory served under `/static`.
    pub static_dir: String,
    /// Upper bound on a single store call.
    pub store_timeout_ms: u64,
    /// How often games whose final save failed are retried.
    pub flush_retry_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1:8080".to_string(),
            data_dir: PathBuf::from("./data"),
            static_dir: "./static".to_string(),
            store_timeout_ms: 5_000,
            flush_retry_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ServerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Path from `RENJU_CONFIG`, or `renju.toml` in the working directory.
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("renju.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation("bind_address must not be empty".into()));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Validation("store_timeout_ms must be > 0".into()));
        }
        if self.flush_retry_secs == 0 {
            return Err(ConfigError::Validation("flush_retry_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn flush_retry_interval(&self) -> Duration {
        Duration::from_secs(self.flush_retry_secs)
    }
}
