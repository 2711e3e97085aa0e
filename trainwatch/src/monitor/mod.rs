//! Training-job monitoring.
//!
//! Turns two unreliable, independently paced status streams from a remote
//! training server into one coherent, cancellable status for display.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                        LifecycleController                         │
//! │   start(job) / stop()            subscribe() → watch<StatusReport> │
//! └─────────────────────────────┬──────────────────────────────────────┘
//!                               │ owns at most one
//! ┌─────────────────────────────▼──────────────────────────────────────┐
//! │                     MonitorSession (JobMonitor)                    │
//! │                                                                    │
//! │  PollingLoop "progress" ─┐                                         │
//! │   race + CircuitBreaker  ├─► session owner ─► resolve() ─► publish │
//! │  PollingLoop "download" ─┘                                         │
//! │   race + CircuitBreaker                                            │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every attempt is bounded by [`race`]. Consecutive transient failures
//! trip a [`CircuitBreaker`]; on the progress stream that ends the session
//! with [`UnifiedStatus::ConnectivityLost`]. The download stream is advisory
//! and never ends a session.
//!
//! # Example
//!
//! ```ignore
//! use trainwatch::client::HttpTrainingClient;
//! use trainwatch::monitor::{LifecycleController, MonitorConfig};
//!
//! let client = HttpTrainingClient::new("http://127.0.0.1:8080")?;
//! let mut controller = LifecycleController::new(client, MonitorConfig::default());
//! let mut status = controller.subscribe();
//!
//! controller.start("job-42").await;
//! while status.changed().await.is_ok() {
//!     println!("{}", status.borrow().status);
//! }
//! ```

mod breaker;
mod controller;
mod poll;
mod race;
mod session;
mod snapshot;
mod status;

#[cfg(test)]
mod testing;

pub use breaker::{BreakerState, CircuitBreaker, DEFAULT_FAILURE_THRESHOLD};
pub use controller::LifecycleController;
pub use poll::{
    classify, DecodePolicy, LoopExit, PollConfig, PollError, PollOutcome, PollSnapshot,
    PollingLoop, DEFAULT_DOWNLOAD_INTERVAL, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_PROGRESS_INTERVAL,
    DEFAULT_PROGRESS_TIMEOUT,
};
pub use race::{race, RaceError};
pub use session::{JobMonitor, MonitorConfig, MonitorSession, DEFAULT_STOP_TIMEOUT};
pub use snapshot::{DownloadSnapshot, JobHandle, ProgressSnapshot, TrainingStatus};
pub use status::{
    resolve, StatusReport, UnifiedStatus, CONNECTIVITY_LOST_MESSAGE, UNKNOWN_FAILURE_MESSAGE,
};
