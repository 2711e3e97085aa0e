//! User configuration stored in `~/.trainwatch/config.ini`.
//!
//! ```ini
//! [server]
//! url = http://127.0.0.1:8080
//!
//! [progress]
//! interval = 5
//! timeout = 5
//!
//! [monitor]
//! failure_threshold = 10
//! decode_errors = transient
//! ```
//!
//! Missing keys and sections fall back to defaults. Use
//! [`ConfigFile::monitor_config`] to get the runtime settings for a session.
//!
//! # Example
//!
//! ```no_run
//! use trainwatch::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let monitor = config.monitor_config();
//! assert!(monitor.progress.failure_threshold > 0);
//! # Ok::<(), trainwatch::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, LoggingSettings, MonitorSettings, PollSettings, ServerSettings};
