//! Lifecycle controller - the public face of job monitoring.
//!
//! Owns at most one [`MonitorSession`] and the status channel the UI layer
//! subscribes to. Methods take `&mut self`, so `start` and `stop` never
//! interleave.
//!
//! # Lifecycle
//!
//! ```text
//! start(A) ──► Submitting ──► ... ──► Completed / Failed / ConnectivityLost
//!    │
//!    └─ start(B) while A is live:  stop(A) fully, then start B
//!
//! stop() ──► cancel loops ──► await tasks ──► publish Stopped ──► remote stop
//!                                                                 (bounded)
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::race::race;
use super::session::{JobMonitor, MonitorConfig, MonitorSession};
use super::snapshot::JobHandle;
use super::status::{StatusReport, UnifiedStatus};
use crate::client::TrainingClient;

/// Starts, stops and supersedes monitoring sessions.
pub struct LifecycleController<C: TrainingClient + 'static> {
    client: Arc<C>,
    config: MonitorConfig,
    status_tx: Arc<watch::Sender<StatusReport>>,
    session: Option<MonitorSession>,
}

impl<C: TrainingClient + 'static> LifecycleController<C> {
    /// Creates an idle controller.
    pub fn new(client: C, config: MonitorConfig) -> Self {
        Self::with_shared_client(Arc::new(client), config)
    }

    /// Creates an idle controller around an already shared client.
    pub fn with_shared_client(client: Arc<C>, config: MonitorConfig) -> Self {
        let (status_tx, _) = watch::channel(StatusReport::default());
        Self {
            client,
            config,
            status_tx: Arc::new(status_tx),
            session: None,
        }
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.status_tx.subscribe()
    }

    /// Current status report.
    pub fn report(&self) -> StatusReport {
        self.status_tx.borrow().clone()
    }

    /// Current unified status.
    pub fn status(&self) -> UnifiedStatus {
        self.status_tx.borrow().status.clone()
    }

    /// Job of the current session, if any.
    pub fn current_job(&self) -> Option<&JobHandle> {
        self.session.as_ref().map(MonitorSession::handle)
    }

    /// Consecutive transient failures on the primary loop of the current session.
    pub fn consecutive_failures(&self) -> u32 {
        self.session
            .as_ref()
            .map_or(0, MonitorSession::consecutive_failures)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Begins monitoring `job_id`.
    ///
    /// A live session for the same job is left alone. Any other session is
    /// stopped first; once this returns nothing from it is published.
    pub async fn start(&mut self, job_id: impl Into<String>) {
        let job_id = job_id.into();

        if let Some(session) = &self.session {
            if session.handle().job_id() == job_id && !self.status().is_terminal() {
                debug!(job_id = %job_id, "Job already monitored, start ignored");
                return;
            }
        }

        if self.session.is_some() {
            self.stop().await;
        }

        let handle = JobHandle::new(job_id);
        self.status_tx.send_replace(StatusReport::submitting(handle.job_id()));

        info!(job_id = %handle, "Starting job monitoring");
        self.session = Some(JobMonitor::spawn(
            handle,
            Arc::clone(&self.client),
            self.config.clone(),
            Arc::clone(&self.status_tx),
        ));
    }

    /// Stops monitoring the current job.
    ///
    /// Local teardown completes first. If the job was not already finished,
    /// `Stopped` is published and the server is asked to stop the job. The
    /// remote request is bounded by the stop timeout and its failure is only
    /// logged.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("No active session, stop ignored");
            return;
        };

        let handle = session.handle().clone();
        session.shutdown().await;

        if self.status().is_terminal() {
            debug!(job_id = %handle, status = %self.status(), "Session already finished");
            return;
        }

        self.status_tx.send_modify(|report| {
            report.status = UnifiedStatus::Stopped;
            report.download = None;
        });
        info!(job_id = %handle, "Job monitoring stopped");

        self.request_remote_stop(&handle).await;
    }

    /// Waits until the current session reaches a terminal state.
    ///
    /// Returns the final report, or the current one if nothing is monitored.
    pub async fn wait_for_terminal(&self) -> StatusReport {
        let mut rx = self.subscribe();
        let outcome = rx
            .wait_for(|report| report.status.is_terminal() || report.status == UnifiedStatus::Idle)
            .await
            .map(|report| report.clone());
        // The sender lives in self, so the channel cannot close here
        outcome.unwrap_or_else(|_| self.report())
    }

    async fn request_remote_stop(&self, handle: &JobHandle) {
        let client = Arc::clone(&self.client);
        let job_id = handle.job_id().to_string();
        let timeout = self.config.stop_timeout;

        let outcome = race(
            move |_token| async move { client.stop_job(&job_id).await },
            timeout,
            &CancellationToken::new(),
        )
        .await;

        match outcome {
            Ok(Ok(())) => debug!(job_id = %handle, "Remote stop acknowledged"),
            Ok(Err(error)) => warn!(
                job_id = %handle,
                error = %error,
                "Remote stop failed; the job may keep running on the server"
            ),
            Err(error) => warn!(
                job_id = %handle,
                error = %error,
                "Remote stop did not complete; the job may keep running on the server"
            ),
        }
    }
}
