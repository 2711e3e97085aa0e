//! trainwatch - client-side monitoring of remote training jobs
//!
//! Tracks a long-running model training run through two independently paced
//! status streams (training progress and model download), and turns raw,
//! unreliable polling into one coherent, cancellable status for display.
//!
//! # High-Level API
//!
//! The [`monitor::LifecycleController`] is the entry point:
//!
//! ```ignore
//! use trainwatch::client::HttpTrainingClient;
//! use trainwatch::config::ConfigFile;
//! use trainwatch::monitor::LifecycleController;
//!
//! let config = ConfigFile::load()?;
//! let client = HttpTrainingClient::with_timeout(&config.server.url, config.request_timeout())?;
//! let mut controller = LifecycleController::new(client, config.monitor_config());
//!
//! controller.start("job-42").await;
//! let report = controller.wait_for_terminal().await;
//! println!("{}", report.status);
//! ```

pub mod client;
pub mod config;
pub mod logging;
pub mod monitor;

/// Version of the trainwatch library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
