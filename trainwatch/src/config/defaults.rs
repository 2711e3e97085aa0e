//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::settings::*;
use crate::monitor::DecodePolicy;

// =============================================================================
// Server
// =============================================================================

/// Default training server base URL.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// Default HTTP client timeout in seconds.
///
/// Polling attempts are bounded separately by the per-stream timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Polling
// =============================================================================

pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_PROGRESS_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_DOWNLOAD_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 3;

// =============================================================================
// Monitor
// =============================================================================

/// Consecutive transient failures before a stream gives up.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = crate::monitor::DEFAULT_FAILURE_THRESHOLD;

/// Seconds allowed for the best-effort remote stop.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 5;

/// Log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "trainwatch.log";

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            server: ServerSettings {
                url: DEFAULT_SERVER_URL.to_string(),
                request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            progress: PollSettings {
                interval: DEFAULT_PROGRESS_INTERVAL_SECS,
                timeout: DEFAULT_PROGRESS_TIMEOUT_SECS,
            },
            download: PollSettings {
                interval: DEFAULT_DOWNLOAD_INTERVAL_SECS,
                timeout: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            },
            monitor: MonitorSettings {
                failure_threshold: DEFAULT_FAILURE_THRESHOLD,
                decode_errors: DecodePolicy::default(),
                stop_timeout: DEFAULT_STOP_TIMEOUT_SECS,
            },
            logging: LoggingSettings {
                file: config_dir.join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{PollConfig, DEFAULT_STOP_TIMEOUT};

    #[test]
    fn test_defaults_match_runtime_defaults() {
        let config = ConfigFile::default();
        let progress = PollConfig::progress();
        let download = PollConfig::download();

        assert_eq!(config.progress.interval, progress.interval.as_secs());
        assert_eq!(config.progress.timeout, progress.timeout.as_secs());
        assert_eq!(config.download.interval, download.interval.as_secs());
        assert_eq!(config.download.timeout, download.timeout.as_secs());
        assert_eq!(config.monitor.stop_timeout, DEFAULT_STOP_TIMEOUT.as_secs());
    }

    #[test]
    fn test_log_file_in_config_directory() {
        let config = ConfigFile::default();
        assert!(config.logging.file.ends_with(".trainwatch/trainwatch.log"));
    }
}
