//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[server]
; Base URL of the training server API
url = {}
; HTTP client timeout in seconds (default: 30)
; Each poll is also bounded by the per-stream timeout below
request_timeout = {}

[progress]
; Training progress is authoritative: completed/failed ends monitoring
; Seconds between polls (default: 5)
interval = {}
; Seconds before a single poll is abandoned (default: 5)
timeout = {}

[download]
; Model download status is advisory and never ends monitoring
; Seconds between polls (default: 3)
interval = {}
; Seconds before a single poll is abandoned (default: 3)
timeout = {}

[monitor]
; Consecutive failed polls before giving up with "connection lost" (default: 10)
; A successful poll resets the count
failure_threshold = {}
; Malformed server responses:
;   transient - count against failure_threshold and keep polling (default)
;   fatal     - stop monitoring immediately
decode_errors = {}
; Seconds allowed for the remote stop request when monitoring is stopped (default: 5)
stop_timeout = {}

[logging]
; Log file path (default: ~/.trainwatch/trainwatch.log)
file = {}
"#,
        config.server.url,
        config.server.request_timeout,
        config.progress.interval,
        config.progress.timeout,
        config.download.interval,
        config.download.timeout,
        config.monitor.failure_threshold,
        config.monitor.decode_errors.as_str(),
        config.monitor.stop_timeout,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
