//! Snapshot types produced by the two polling streams.
//!
//! [`ProgressSnapshot`] comes from the training-progress endpoint and is the
//! authoritative source for job termination. [`DownloadSnapshot`] comes from
//! the model-download endpoint and is informational only.
//!
//! Both are deserialized straight from the server's JSON payloads, so every
//! field the server may omit has a serde default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a submitted training job.
///
/// Created when monitoring starts and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    job_id: String,
    submitted_at: DateTime<Utc>,
}

impl JobHandle {
    /// Creates a handle stamped with the current time.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self::with_submitted_at(job_id, Utc::now())
    }

    /// Creates a handle with an explicit submission time.
    pub fn with_submitted_at(job_id: impl Into<String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            submitted_at,
        }
    }

    /// Returns the remote job identifier.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Returns when the job was handed to the monitor.
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.job_id)
    }
}

/// Remote training status as reported by the progress endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    /// Queued on the server, nothing running yet.
    #[default]
    Pending,
    /// Model weights are being loaded into memory.
    #[serde(alias = "loading")]
    LoadingModel,
    /// Training steps are executing.
    #[serde(alias = "training")]
    Running,
    /// Training finished successfully.
    Completed,
    /// Training stopped with an error.
    #[serde(alias = "error")]
    Failed,
}

impl TrainingStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One reading of the training-progress endpoint.
///
/// `fraction_complete` is not guaranteed to be monotonic across snapshots;
/// the server may report regressions (e.g. after a restarted epoch).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: TrainingStatus,
    #[serde(default)]
    pub stage_label: Option<String>,
    #[serde(default, deserialize_with = "de_fraction")]
    pub fraction_complete: f64,
    #[serde(default)]
    pub loss_value: Option<f64>,
    #[serde(default)]
    pub steps_done: u64,
    #[serde(default)]
    pub steps_total: u64,
    #[serde(default)]
    pub eta_seconds: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ProgressSnapshot {
    /// Creates a snapshot with the given status and everything else zeroed.
    pub fn with_status(status: TrainingStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Creates a `Running` snapshot at the given completion fraction.
    pub fn running(fraction_complete: f64) -> Self {
        Self {
            status: TrainingStatus::Running,
            fraction_complete: fraction_complete.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    /// Creates a `Failed` snapshot carrying the server's message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TrainingStatus::Failed,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Completion as a whole percentage (0-100).
    pub fn percent(&self) -> u8 {
        (self.fraction_complete * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// Clamps the wire value into [0, 1]; NaN becomes 0.
fn de_fraction<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_nan() {
        Ok(0.0)
    } else {
        Ok(raw.clamp(0.0, 1.0))
    }
}

/// One reading of the model-download endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadSnapshot {
    pub is_active: bool,
    #[serde(default)]
    pub bytes_done: Option<i64>,
    #[serde(default)]
    pub bytes_total: Option<i64>,
    #[serde(default)]
    pub files_done: Option<u32>,
    #[serde(default)]
    pub files_total: Option<u32>,
    #[serde(default)]
    pub speed_bytes_per_sec: Option<f64>,
    #[serde(default)]
    pub eta_seconds: Option<f64>,
}

impl DownloadSnapshot {
    /// An active download with no byte counts yet.
    pub fn active() -> Self {
        Self {
            is_active: true,
            ..Default::default()
        }
    }

    /// An idle download stream.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Downloaded fraction, when the server reports both byte counts.
    pub fn fraction(&self) -> Option<f64> {
        match (self.bytes_done, self.bytes_total) {
            (Some(done), Some(total)) if total > 0 => {
                Some((done as f64 / total as f64).clamp(0.0, 1.0))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_handle_keeps_id_and_time() {
        let at = Utc::now();
        let handle = JobHandle::with_submitted_at("job-7", at);
        assert_eq!(handle.job_id(), "job-7");
        assert_eq!(handle.submitted_at(), at);
        assert_eq!(handle.to_string(), "job-7");
    }

    #[test]
    fn test_training_status_terminal() {
        assert!(TrainingStatus::Completed.is_terminal());
        assert!(TrainingStatus::Failed.is_terminal());
        assert!(!TrainingStatus::Pending.is_terminal());
        assert!(!TrainingStatus::LoadingModel.is_terminal());
        assert!(!TrainingStatus::Running.is_terminal());
    }

    #[test]
    fn test_progress_deserialize_minimal() {
        let json = r#"{"status": "running", "fraction_complete": 0.42}"#;
        let snapshot: ProgressSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.status, TrainingStatus::Running);
        assert!((snapshot.fraction_complete - 0.42).abs() < f64::EPSILON);
        assert_eq!(snapshot.steps_total, 0);
        assert!(snapshot.loss_value.is_none());
    }

    #[test]
    fn test_progress_deserialize_full() {
        let json = r#"{
            "status": "loading_model",
            "stage_label": "Loading weights",
            "fraction_complete": 0.0,
            "loss_value": null,
            "steps_done": 0,
            "steps_total": 1200,
            "eta_seconds": 340.5,
            "error_message": null,
            "gpu": "ignored"
        }"#;
        let snapshot: ProgressSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.status, TrainingStatus::LoadingModel);
        assert_eq!(snapshot.stage_label.as_deref(), Some("Loading weights"));
        assert_eq!(snapshot.steps_total, 1200);
        assert_eq!(snapshot.eta_seconds, Some(340.5));
    }

    #[test]
    fn test_progress_status_aliases() {
        let snapshot: ProgressSnapshot = serde_json::from_str(r#"{"status": "error"}"#).unwrap();
        assert_eq!(snapshot.status, TrainingStatus::Failed);
        let snapshot: ProgressSnapshot =
            serde_json::from_str(r#"{"status": "training"}"#).unwrap();
        assert_eq!(snapshot.status, TrainingStatus::Running);
    }

    #[test]
    fn test_progress_fraction_is_clamped() {
        let snapshot: ProgressSnapshot =
            serde_json::from_str(r#"{"status": "running", "fraction_complete": 1.7}"#).unwrap();
        assert_eq!(snapshot.fraction_complete, 1.0);
        let snapshot: ProgressSnapshot =
            serde_json::from_str(r#"{"status": "running", "fraction_complete": -0.2}"#).unwrap();
        assert_eq!(snapshot.fraction_complete, 0.0);
    }

    #[test]
    fn test_progress_unknown_status_is_error() {
        let result: Result<ProgressSnapshot, _> = serde_json::from_str(r#"{"status": "exploded"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_percent() {
        assert_eq!(ProgressSnapshot::running(0.424).percent(), 42);
        assert_eq!(ProgressSnapshot::running(1.0).percent(), 100);
    }

    #[test]
    fn test_download_fraction() {
        let snapshot = DownloadSnapshot {
            is_active: true,
            bytes_done: Some(250),
            bytes_total: Some(1000),
            ..Default::default()
        };
        assert_eq!(snapshot.fraction(), Some(0.25));
        assert_eq!(DownloadSnapshot::active().fraction(), None);

        let zero_total = DownloadSnapshot {
            bytes_done: Some(5),
            bytes_total: Some(0),
            ..Default::default()
        };
        assert_eq!(zero_total.fraction(), None);
    }

    #[test]
    fn test_download_deserialize_sparse() {
        let snapshot: DownloadSnapshot =
            serde_json::from_str(r#"{"is_active": true, "files_done": 2, "files_total": 5}"#)
                .unwrap();
        assert!(snapshot.is_active);
        assert_eq!(snapshot.files_done, Some(2));
        assert!(snapshot.bytes_total.is_none());
    }
}
