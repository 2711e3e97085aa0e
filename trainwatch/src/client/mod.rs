//! Client for the remote training server.
//!
//! The monitor never talks HTTP directly. It depends on the
//! [`TrainingClient`] trait, injected at construction, so tests can script
//! server behaviour and the transport can be swapped.
//!
//! # Architecture
//!
//! ```text
//! LifecycleController
//!     │
//!     └── Arc<C: TrainingClient>
//!             ├── fetch_progress()          ← primary loop
//!             ├── fetch_download_status()   ← secondary loop
//!             ├── refresh_checkpoints()     ← once, on Completed
//!             └── stop_job()                ← best effort, on stop()
//! ```

mod error;
mod http;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::monitor::{DownloadSnapshot, ProgressSnapshot};

pub use error::ClientError;
pub use http::{HttpTrainingClient, DEFAULT_HTTP_TIMEOUT};

/// A checkpoint or result artifact listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub step: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Request/response contract of the training server.
pub trait TrainingClient: Send + Sync {
    /// Fetch the training-progress snapshot for a job.
    fn fetch_progress(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<ProgressSnapshot, ClientError>> + Send;

    /// Fetch the model-download snapshot for a job.
    fn fetch_download_status(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<DownloadSnapshot, ClientError>> + Send;

    /// Ask the server to stop a job. The response carries no information.
    fn stop_job(&self, job_id: &str) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Re-read the list of checkpoints/results.
    fn refresh_checkpoints(
        &self,
    ) -> impl Future<Output = Result<Vec<CheckpointInfo>, ClientError>> + Send;
}
