//! taskplan configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::SessionConfig;

/// Main taskplan configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Planning service connection
    pub service: ServiceConfig,

    /// Session behavior
    pub session: SessionSettings,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::default_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is initialized
    ///
    /// Errors are swallowed: a broken config file is reported later by [`Config::load`].
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::default_paths(),
        };

        candidates
            .iter()
            .find(|path| path.exists())
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|content| serde_yaml::from_str::<Config>(&content).ok())
            .and_then(|config| config.log_level)
    }

    /// Project-local config, then user config
    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".taskplan.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("taskplan").join("taskplan.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Planning service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Task server base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Session behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Quiet period before an edited answer is saved, in milliseconds
    #[serde(rename = "debounce-ms")]
    pub debounce_ms: u64,

    /// Buffer size of the session event channel
    #[serde(rename = "event-capacity")]
    pub event_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            debounce_ms: defaults.debounce.as_millis() as u64,
            event_capacity: defaults.event_capacity,
        }
    }
}

impl SessionSettings {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            event_capacity: self.event_capacity.max(1),
        }
    }
}
