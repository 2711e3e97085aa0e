//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::monitor::DecodePolicy;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// Training server connection
    pub server: ServerSettings,
    /// Training-progress stream
    pub progress: PollSettings,
    /// Model-download stream
    pub download: PollSettings,
    /// Failure handling shared by both streams
    pub monitor: MonitorSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Training server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Base URL of the training server API
    pub url: String,
    /// HTTP client timeout in seconds
    pub request_timeout: u64,
}

/// Pacing of one polling stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Seconds between attempts
    pub interval: u64,
    /// Seconds before a single attempt is abandoned
    pub timeout: u64,
}

/// Circuit breaker and teardown configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Consecutive transient failures before monitoring gives up
    pub failure_threshold: u32,
    /// Treatment of malformed server payloads
    pub decode_errors: DecodePolicy,
    /// Seconds allowed for the remote stop request
    pub stop_timeout: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
