//! Unified job status and the state machine that derives it.
//!
//! The two polling streams are reconciled by [`resolve`], a pure function of
//! the latest snapshot from each source. It is recomputed on every update and
//! never assumes the two sources changed together.
//!
//! # State Machine
//!
//! ```text
//! Idle --start--> Submitting --> DownloadingModel | LoadingModel --> Training
//! Training --> Completed | Failed
//! any non-terminal --stop--> Stopped
//! Submitting | DownloadingModel | LoadingModel | Training --breaker--> ConnectivityLost
//! ```
//!
//! `Completed`, `Failed`, `Stopped` and `ConnectivityLost` are terminal.

use super::snapshot::{DownloadSnapshot, ProgressSnapshot, TrainingStatus};
use crate::client::CheckpointInfo;

/// Message used when the server reports failure without a reason.
pub const UNKNOWN_FAILURE_MESSAGE: &str = "training failed without an error message";

/// Message surfaced when the circuit breaker trips on the progress stream.
pub const CONNECTIVITY_LOST_MESSAGE: &str =
    "lost connection to training server (the remote job may still be running)";

/// UI-facing status of the monitored job.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum UnifiedStatus {
    /// No job is being monitored.
    #[default]
    Idle,
    /// Monitoring started, no progress reported yet.
    Submitting,
    /// Model weights are still downloading.
    DownloadingModel,
    /// The server is loading the model.
    LoadingModel,
    /// Training is underway.
    Training(ProgressSnapshot),
    /// Training finished successfully.
    Completed,
    /// Training failed; carries the error to show.
    Failed(String),
    /// Monitoring was stopped by the user.
    Stopped,
    /// Monitoring gave up after repeated transient failures.
    ///
    /// Only client-side monitoring has stopped; the remote job may still be
    /// running unobserved.
    ConnectivityLost,
}

impl UnifiedStatus {
    /// Returns true if no further transition happens without a new `start`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed(_) | Self::Stopped | Self::ConnectivityLost
        )
    }

    /// Short user-facing label.
    pub fn display_status(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Submitting => "Submitting...",
            Self::DownloadingModel => "Downloading model",
            Self::LoadingModel => "Loading model",
            Self::Training(_) => "Training",
            Self::Completed => "Completed",
            Self::Failed(_) => "Failed",
            Self::Stopped => "Stopped",
            Self::ConnectivityLost => "Connection lost",
        }
    }

    /// Error text for failure states, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            Self::ConnectivityLost => Some(CONNECTIVITY_LOST_MESSAGE),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnifiedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Training(progress) => {
                write!(f, "Training {}%", progress.percent())?;
                if progress.steps_total > 0 {
                    write!(f, " (step {}/{})", progress.steps_done, progress.steps_total)?;
                }
                if let Some(loss) = progress.loss_value {
                    write!(f, " loss={:.4}", loss)?;
                }
                Ok(())
            }
            Self::Failed(message) => write!(f, "Failed: {}", message),
            Self::ConnectivityLost => write!(f, "Connection lost: {}", CONNECTIVITY_LOST_MESSAGE),
            other => f.write_str(other.display_status()),
        }
    }
}

/// Derives the unified status from the latest snapshot of each stream.
///
/// An active download overrides everything else: training cannot proceed
/// until the weights are on disk.
pub fn resolve(
    progress: Option<&ProgressSnapshot>,
    download: Option<&DownloadSnapshot>,
) -> UnifiedStatus {
    if download.is_some_and(|d| d.is_active) {
        return UnifiedStatus::DownloadingModel;
    }

    let Some(progress) = progress else {
        return UnifiedStatus::Submitting;
    };

    match progress.status {
        TrainingStatus::LoadingModel => UnifiedStatus::LoadingModel,
        TrainingStatus::Completed => UnifiedStatus::Completed,
        TrainingStatus::Failed => UnifiedStatus::Failed(
            progress
                .error_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_FAILURE_MESSAGE.to_string()),
        ),
        TrainingStatus::Pending | TrainingStatus::Running => {
            UnifiedStatus::Training(progress.clone())
        }
    }
}

/// Observable state published to the UI layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    /// Job being monitored, if any.
    pub job_id: Option<String>,
    /// Current unified status.
    pub status: UnifiedStatus,
    /// Latest download snapshot while the download stream reports activity.
    pub download: Option<DownloadSnapshot>,
    /// Most recent error worth showing to the user.
    pub last_error: Option<String>,
    /// Checkpoint list refreshed after a completed run.
    pub checkpoints: Option<Vec<CheckpointInfo>>,
}

impl StatusReport {
    /// Report for a freshly started job.
    pub fn submitting(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            status: UnifiedStatus::Submitting,
            download: None,
            last_error: None,
            checkpoints: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(status: TrainingStatus) -> ProgressSnapshot {
        ProgressSnapshot::with_status(status)
    }

    #[test]
    fn test_active_download_overrides_everything() {
        let download = DownloadSnapshot::active();
        for status in [
            TrainingStatus::Pending,
            TrainingStatus::LoadingModel,
            TrainingStatus::Running,
            TrainingStatus::Completed,
            TrainingStatus::Failed,
        ] {
            assert_eq!(
                resolve(Some(&progress(status)), Some(&download)),
                UnifiedStatus::DownloadingModel
            );
        }
        assert_eq!(resolve(None, Some(&download)), UnifiedStatus::DownloadingModel);
    }

    #[test]
    fn test_loading_model() {
        let idle = DownloadSnapshot::idle();
        assert_eq!(
            resolve(Some(&progress(TrainingStatus::LoadingModel)), Some(&idle)),
            UnifiedStatus::LoadingModel
        );
    }

    #[test]
    fn test_completed() {
        assert_eq!(
            resolve(Some(&progress(TrainingStatus::Completed)), None),
            UnifiedStatus::Completed
        );
    }

    #[test]
    fn test_failed_carries_server_message() {
        let snapshot = ProgressSnapshot::failed("CUDA out of memory");
        assert_eq!(
            resolve(Some(&snapshot), None),
            UnifiedStatus::Failed("CUDA out of memory".to_string())
        );
    }

    #[test]
    fn test_failed_without_message() {
        let snapshot = ProgressSnapshot::with_status(TrainingStatus::Failed);
        assert_eq!(
            resolve(Some(&snapshot), None),
            UnifiedStatus::Failed(UNKNOWN_FAILURE_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_running_and_pending_are_training() {
        let running = ProgressSnapshot::running(0.42);
        assert_eq!(
            resolve(Some(&running), None),
            UnifiedStatus::Training(running.clone())
        );
        let pending = progress(TrainingStatus::Pending);
        assert!(matches!(
            resolve(Some(&pending), None),
            UnifiedStatus::Training(_)
        ));
    }

    #[test]
    fn test_no_progress_yet_is_submitting() {
        assert_eq!(resolve(None, None), UnifiedStatus::Submitting);
        assert_eq!(
            resolve(None, Some(&DownloadSnapshot::idle())),
            UnifiedStatus::Submitting
        );
    }

    #[test]
    fn test_tolerates_progress_regression() {
        let later = ProgressSnapshot::running(0.30);
        let status = resolve(Some(&later), None);
        assert_eq!(status, UnifiedStatus::Training(later));
    }

    #[test]
    fn test_terminal_states() {
        assert!(UnifiedStatus::Completed.is_terminal());
        assert!(UnifiedStatus::Failed("x".into()).is_terminal());
        assert!(UnifiedStatus::Stopped.is_terminal());
        assert!(UnifiedStatus::ConnectivityLost.is_terminal());
        assert!(!UnifiedStatus::Idle.is_terminal());
        assert!(!UnifiedStatus::Submitting.is_terminal());
        assert!(!UnifiedStatus::Training(ProgressSnapshot::running(0.1)).is_terminal());
    }

    #[test]
    fn test_display() {
        let mut snapshot = ProgressSnapshot::running(0.42);
        snapshot.steps_done = 42;
        snapshot.steps_total = 100;
        snapshot.loss_value = Some(0.5);
        assert_eq!(
            UnifiedStatus::Training(snapshot).to_string(),
            "Training 42% (step 42/100) loss=0.5000"
        );
        assert_eq!(UnifiedStatus::Failed("boom".into()).to_string(), "Failed: boom");
        assert_eq!(UnifiedStatus::LoadingModel.to_string(), "Loading model");
    }

    #[test]
    fn test_connectivity_lost_message_mentions_remote_job() {
        let message = UnifiedStatus::ConnectivityLost.error_message().unwrap();
        assert!(message.contains("may still be running"));
    }
}
