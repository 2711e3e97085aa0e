//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::{ConfigFile, PollSettings};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("url") {
            let v = v.trim();
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(invalid(
                    "server",
                    "url",
                    v,
                    "must start with http:// or https://",
                ));
            }
            config.server.url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = section.get("request_timeout") {
            config.server.request_timeout = parse_secs("server", "request_timeout", v)?;
        }
    }

    // [progress] and [download] sections
    if let Some(section) = ini.section(Some("progress")) {
        parse_poll_section("progress", section, &mut config.progress)?;
    }
    if let Some(section) = ini.section(Some("download")) {
        parse_poll_section("download", section, &mut config.download)?;
    }

    // [monitor] section
    if let Some(section) = ini.section(Some("monitor")) {
        if let Some(v) = section.get("failure_threshold") {
            config.monitor.failure_threshold = match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(invalid(
                        "monitor",
                        "failure_threshold",
                        v,
                        "must be a positive integer",
                    ))
                }
            };
        }
        if let Some(v) = section.get("decode_errors") {
            config.monitor.decode_errors = v
                .parse()
                .map_err(|_| invalid("monitor", "decode_errors", v, "must be 'transient' or 'fatal'"))?;
        }
        if let Some(v) = section.get("stop_timeout") {
            config.monitor.stop_timeout = parse_secs("monitor", "stop_timeout", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn parse_poll_section(
    name: &str,
    section: &Properties,
    settings: &mut PollSettings,
) -> Result<(), ConfigFileError> {
    if let Some(v) = section.get("interval") {
        settings.interval = parse_secs(name, "interval", v)?;
    }
    if let Some(v) = section.get("timeout") {
        settings.timeout = parse_secs(name, "timeout", v)?;
    }
    Ok(())
}

/// Parses a positive number of seconds.
fn parse_secs(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(invalid(
            section,
            key,
            value,
            "must be a positive integer (seconds)",
        )),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
