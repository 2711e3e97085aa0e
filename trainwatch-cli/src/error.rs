//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use trainwatch::client::ClientError;
use trainwatch::config::ConfigFileError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to read or write the config file
    ConfigFile(ConfigFileError),
    /// Training server request failed
    Client(ClientError),
    /// The training job finished with an error
    JobFailed(String),
    /// Monitoring gave up after repeated failures
    ConnectivityLost,
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Client(ClientError::Transport(_)) | CliError::ConnectivityLost => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. Training server not running or unreachable");
                eprintln!("  2. Wrong server URL: check [server] url in config.ini or use --server");
                eprintln!("  3. The job may still be running; run 'trainwatch watch <JOB_ID>' again");
            }
            CliError::ConfigFile(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Run 'trainwatch config path' to locate the file.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Client(e) => write!(f, "Training server error: {}", e),
            CliError::JobFailed(msg) => write!(f, "Training failed: {}", msg),
            CliError::ConnectivityLost => write!(
                f,
                "{}",
                trainwatch::monitor::CONNECTIVITY_LOST_MESSAGE
            ),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Client(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ClientError> for CliError {
    fn from(e: ClientError) -> Self {
        CliError::Client(e)
    }
}
