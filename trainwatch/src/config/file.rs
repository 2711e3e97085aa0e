//! Configuration file handling for ~/.trainwatch/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::settings::{ConfigFile, PollSettings};
use crate::monitor::{MonitorConfig, PollConfig};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.trainwatch/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = self.to_ini_string();
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Commented INI text, as written by [`save_to`](Self::save_to).
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// HTTP client timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout)
    }

    /// Runtime settings for a monitoring session.
    pub fn monitor_config(&self) -> MonitorConfig {
        let poll = |settings: &PollSettings, base: PollConfig| {
            base.with_interval(Duration::from_secs(settings.interval))
                .with_timeout(Duration::from_secs(settings.timeout))
        };

        MonitorConfig {
            progress: poll(&self.progress, PollConfig::progress()),
            download: poll(&self.download, PollConfig::download()),
            stop_timeout: Duration::from_secs(self.monitor.stop_timeout),
        }
        .with_failure_threshold(self.monitor.failure_threshold)
        .with_decode_policy(self.monitor.decode_errors)
    }
}

/// Get the path to the config directory (~/.trainwatch).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".trainwatch")
}

/// Get the path to the config file (~/.trainwatch/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
