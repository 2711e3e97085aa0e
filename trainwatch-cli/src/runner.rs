//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and client creation
//! to reduce duplication across command handlers.

use crate::error::CliError;
use tracing::info;
use trainwatch::client::HttpTrainingClient;
use trainwatch::config::ConfigFile;
use trainwatch::logging::{init_logging, split_log_path, LoggingGuard};

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    _logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// Status lines own stdout, so log lines are only mirrored there in
    /// debug mode.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, enables debug-level logging unless RUST_LOG is set
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let level = if debug_mode { "debug" } else { "info" };

        let logging_guard = init_logging(&log_dir, &log_file, debug_mode, level)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("trainwatch v{}", trainwatch::VERSION);
        info!("trainwatch CLI: {} command", command);
    }

    /// Create the training-server client, preferring `server` over the config.
    pub fn create_client(&self, server: Option<&str>) -> Result<HttpTrainingClient, CliError> {
        let url = server.unwrap_or(&self.config.server.url);
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CliError::Config(format!(
                "Server URL '{}' must start with http:// or https://",
                url
            )));
        }

        let client = HttpTrainingClient::with_timeout(url, self.config.request_timeout())?;
        info!(server = %client.base_url(), "Training server client created");
        Ok(client)
    }
}
