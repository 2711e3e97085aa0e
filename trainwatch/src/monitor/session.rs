//! Job monitor - one monitoring session over two polling loops.
//!
//! A session runs three tasks:
//!
//! ```text
//! ┌──────────────────────┐   SessionEvent    ┌───────────────────────────┐
//! │ primary loop         │ ────────────────► │ session owner             │
//! │ (training progress)  │                   │                           │
//! └──────────────────────┘   (mpsc, per-loop │ • keeps latest snapshot   │
//! ┌──────────────────────┐    fetch order)   │   per source              │
//! │ secondary loop       │ ────────────────► │ • resolve() on each event │
//! │ (model download)     │                   │ • sole publisher of       │
//! └──────────────────────┘                   │   StatusReport (watch)    │
//!                                            └───────────────────────────┘
//! ```
//!
//! The owner is the only writer of session state, so no locking is needed.
//! It checks the session token before every publish: once a session is
//! cancelled nothing more reaches the UI.
//!
//! # Reconciliation
//!
//! - The primary loop is authoritative. A `completed`/`failed` snapshot
//!   cancels the secondary loop and finalizes the session.
//! - The secondary loop is advisory. An inactive download clears the
//!   displayed download snapshot; its failures never end the session.
//! - On `completed` the checkpoint list is refreshed once before the
//!   terminal status is published.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::poll::{DecodePolicy, LoopExit, PollConfig, PollSnapshot, PollingLoop};
use super::race::race;
use super::snapshot::{DownloadSnapshot, JobHandle, ProgressSnapshot, TrainingStatus};
use super::status::{resolve, StatusReport, UnifiedStatus};
use crate::client::{CheckpointInfo, ClientError, TrainingClient};

/// Default bound on the best-effort remote stop call.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a monitoring session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Primary (training progress) loop.
    pub progress: PollConfig,
    /// Secondary (model download) loop.
    pub download: PollConfig,
    /// Deadline for the remote stop request.
    pub stop_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            progress: PollConfig::progress(),
            download: PollConfig::download(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl MonitorConfig {
    /// Sets the breaker threshold on both loops.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.progress.failure_threshold = threshold;
        self.download.failure_threshold = threshold;
        self
    }

    /// Sets the decode-error policy on both loops.
    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.progress.decode_policy = policy;
        self.download.decode_policy = policy;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

/// Messages from the polling loops to the session owner.
#[derive(Debug)]
enum SessionEvent {
    Progress(ProgressSnapshot),
    Download(DownloadSnapshot),
    ProgressExit(LoopExit<ProgressSnapshot>),
    DownloadExit(LoopExit<DownloadSnapshot>),
}

/// A live monitoring session.
///
/// Dropping the session cancels it; call [`shutdown`](Self::shutdown) to
/// also wait for its tasks to exit.
pub struct MonitorSession {
    handle: JobHandle,
    cancel: CancellationToken,
    owner: Option<JoinHandle<()>>,
    primary_failures: Arc<AtomicU32>,
}

impl MonitorSession {
    /// The monitored job.
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Consecutive transient failures on the primary loop.
    pub fn consecutive_failures(&self) -> u32 {
        self.primary_failures.load(Ordering::Relaxed)
    }

    /// Returns true once the session has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns true once all session tasks have exited.
    pub fn is_finished(&self) -> bool {
        self.owner.as_ref().map_or(true, |owner| owner.is_finished())
    }

    /// Cancels both loops and waits for every session task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(owner) = self.owner.take() {
            if let Err(e) = owner.await {
                tracing::error!(job_id = %self.handle, error = %e, "Session owner task panicked");
            }
        }
        debug!(job_id = %self.handle, "Monitoring session shut down");
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for MonitorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSession")
            .field("job_id", &self.handle.job_id())
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

/// Starts monitoring sessions.
pub struct JobMonitor;

impl JobMonitor {
    /// Spawns the session tasks for `handle` and returns the session.
    ///
    /// Status changes are published to `status_tx` until the session reaches
    /// a terminal state or is cancelled.
    pub fn spawn<C>(
        handle: JobHandle,
        client: Arc<C>,
        config: MonitorConfig,
        status_tx: Arc<watch::Sender<StatusReport>>,
    ) -> MonitorSession
    where
        C: TrainingClient + 'static,
    {
        let cancel = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let primary = PollingLoop::new("progress", config.progress.clone());
        let primary_failures = primary.failure_counter();
        let primary_cancel = cancel.child_token();
        let primary_task = spawn_loop(
            primary,
            {
                let client = Arc::clone(&client);
                let job_id = handle.job_id().to_string();
                move |token: CancellationToken| {
                    let client = Arc::clone(&client);
                    let job_id = job_id.clone();
                    async move {
                        tokio::select! {
                            result = client.fetch_progress(&job_id) => result,
                            _ = token.cancelled() => Err(abandoned()),
                        }
                    }
                }
            },
            event_tx.clone(),
            SessionEvent::Progress,
            SessionEvent::ProgressExit,
            primary_cancel.clone(),
        );

        let secondary = PollingLoop::new("download", config.download.clone());
        let secondary_cancel = cancel.child_token();
        let secondary_task = spawn_loop(
            secondary,
            {
                let client = Arc::clone(&client);
                let job_id = handle.job_id().to_string();
                move |token: CancellationToken| {
                    let client = Arc::clone(&client);
                    let job_id = job_id.clone();
                    async move {
                        tokio::select! {
                            result = client.fetch_download_status(&job_id) => result,
                            _ = token.cancelled() => Err(abandoned()),
                        }
                    }
                }
            },
            event_tx,
            SessionEvent::Download,
            SessionEvent::DownloadExit,
            secondary_cancel.clone(),
        );

        info!(
            job_id = %handle,
            submitted_at = %handle.submitted_at(),
            progress_interval_ms = config.progress.interval.as_millis(),
            download_interval_ms = config.download.interval.as_millis(),
            "Monitoring session started"
        );

        let owner = SessionOwner {
            handle: handle.clone(),
            client,
            refresh_timeout: config.progress.timeout,
            status_tx,
            cancel: cancel.clone(),
            secondary_cancel,
            progress: None,
            download: None,
            checkpoints: None,
        };
        let owner_task = tokio::spawn(async move {
            owner.run(event_rx).await;
            primary_cancel.cancel();
            let _ = primary_task.await;
            let _ = secondary_task.await;
        });

        MonitorSession {
            handle,
            cancel,
            owner: Some(owner_task),
            primary_failures,
        }
    }
}

fn abandoned() -> ClientError {
    ClientError::Transport("request abandoned".to_string())
}

/// Spawns one polling loop that forwards snapshots and its exit reason.
fn spawn_loop<S, P, Fut>(
    polling: PollingLoop,
    poll_once: P,
    events: mpsc::UnboundedSender<SessionEvent>,
    on_snapshot: fn(S) -> SessionEvent,
    on_exit: fn(LoopExit<S>) -> SessionEvent,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    S: PollSnapshot + Clone + Send + 'static,
    P: FnMut(CancellationToken) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<S, ClientError>> + Send + 'static,
{
    tokio::spawn(async move {
        let snapshots = events.clone();
        let exit = polling
            .run(
                poll_once,
                move |snapshot: &S| {
                    let _ = snapshots.send(on_snapshot(snapshot.clone()));
                },
                cancel,
            )
            .await;
        let _ = events.send(on_exit(exit));
    })
}

/// Sole writer of one session's state.
struct SessionOwner<C> {
    handle: JobHandle,
    client: Arc<C>,
    refresh_timeout: Duration,
    status_tx: Arc<watch::Sender<StatusReport>>,
    cancel: CancellationToken,
    secondary_cancel: CancellationToken,
    progress: Option<ProgressSnapshot>,
    download: Option<DownloadSnapshot>,
    checkpoints: Option<Vec<CheckpointInfo>>,
}

impl<C: TrainingClient + 'static> SessionOwner<C> {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                event = events.recv() => event,
            };

            let Some(event) = event else {
                warn!(job_id = %self.handle, "Polling loops vanished without an exit event");
                break;
            };

            if self.handle_event(event).await.is_break() {
                break;
            }
        }

        self.secondary_cancel.cancel();
    }

    async fn handle_event(&mut self, event: SessionEvent) -> ControlFlow<()> {
        match event {
            SessionEvent::Progress(snapshot) => {
                debug!(
                    job_id = %self.handle,
                    status = ?snapshot.status,
                    fraction = snapshot.fraction_complete,
                    steps_done = snapshot.steps_done,
                    "Progress snapshot"
                );
                // Terminal snapshots are finalized by the exit event that follows
                if !snapshot.is_terminal() {
                    self.progress = Some(snapshot);
                    self.publish_resolved();
                }
                ControlFlow::Continue(())
            }
            SessionEvent::Download(snapshot) => {
                if snapshot.is_active {
                    self.download = Some(snapshot);
                } else if self.download.take().is_some() {
                    debug!(job_id = %self.handle, "Model download no longer active");
                }
                self.publish_resolved();
                ControlFlow::Continue(())
            }
            SessionEvent::DownloadExit(exit) => {
                match exit {
                    LoopExit::Cancelled => {}
                    LoopExit::ConnectivityLost { failures, last_error } => warn!(
                        job_id = %self.handle,
                        failures,
                        error = %last_error,
                        "Download status unavailable, continuing with training progress only"
                    ),
                    LoopExit::Fatal(error) => warn!(
                        job_id = %self.handle,
                        error = %error,
                        "Download status polling stopped, continuing with training progress only"
                    ),
                    LoopExit::Terminal(_) => {}
                }
                if self.download.take().is_some() {
                    self.publish_resolved();
                }
                ControlFlow::Continue(())
            }
            SessionEvent::ProgressExit(exit) => {
                self.finish(exit).await;
                ControlFlow::Break(())
            }
        }
    }

    /// Handles the end of the primary loop.
    async fn finish(&mut self, exit: LoopExit<ProgressSnapshot>) {
        // Primary is authoritative: the download stream goes with it
        self.secondary_cancel.cancel();
        self.download = None;

        match exit {
            LoopExit::Cancelled => {}
            LoopExit::Terminal(snapshot) => {
                if snapshot.status == TrainingStatus::Completed {
                    self.refresh_checkpoints().await;
                }
                let status = resolve(Some(&snapshot), None);
                match &status {
                    UnifiedStatus::Failed(message) => warn!(
                        job_id = %self.handle,
                        error = %message,
                        "Training failed on server"
                    ),
                    _ => info!(job_id = %self.handle, "Training completed"),
                }
                self.progress = Some(snapshot);
                self.publish(status);
            }
            LoopExit::ConnectivityLost { failures, last_error } => {
                warn!(
                    job_id = %self.handle,
                    failures,
                    error = %last_error,
                    "Lost connection to training server; remote job may still be running"
                );
                self.publish(UnifiedStatus::ConnectivityLost);
            }
            LoopExit::Fatal(error) => {
                self.publish(UnifiedStatus::Failed(error.to_string()));
            }
        }
    }

    /// One-shot refresh of the checkpoint list after completion.
    async fn refresh_checkpoints(&mut self) {
        let client = Arc::clone(&self.client);
        let attempt = race(
            move |_token| async move { client.refresh_checkpoints().await },
            self.refresh_timeout,
            &self.cancel,
        );

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            outcome = attempt => outcome,
        };

        match outcome {
            Ok(Ok(checkpoints)) => {
                info!(
                    job_id = %self.handle,
                    count = checkpoints.len(),
                    "Checkpoint list refreshed"
                );
                self.checkpoints = Some(checkpoints);
            }
            Ok(Err(error)) => {
                warn!(job_id = %self.handle, error = %error, "Checkpoint refresh failed")
            }
            Err(error) => {
                warn!(job_id = %self.handle, error = %error, "Checkpoint refresh failed")
            }
        }
    }

    fn publish_resolved(&self) {
        self.publish(resolve(self.progress.as_ref(), self.download.as_ref()));
    }

    fn publish(&self, status: UnifiedStatus) {
        if self.cancel.is_cancelled() {
            return;
        }

        let report = StatusReport {
            job_id: Some(self.handle.job_id().to_string()),
            last_error: status.error_message().map(str::to_string),
            download: self.download.clone(),
            checkpoints: self.checkpoints.clone(),
            status,
        };

        self.status_tx.send_if_modified(|current| {
            if *current == report {
                false
            } else {
                *current = report;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{Reply, ScriptedClient};

    fn publisher() -> (Arc<watch::Sender<StatusReport>>, watch::Receiver<StatusReport>) {
        let (tx, rx) = watch::channel(StatusReport::default());
        (Arc::new(tx), rx)
    }

    fn spawn(client: ScriptedClient) -> (MonitorSession, watch::Receiver<StatusReport>, Arc<ScriptedClient>) {
        let (session, rx, client, _tx) = spawn_with_sender(client);
        (session, rx, client)
    }

    /// Like `spawn`, also handing back the sender so the channel outlives the session.
    fn spawn_with_sender(
        client: ScriptedClient,
    ) -> (
        MonitorSession,
        watch::Receiver<StatusReport>,
        Arc<ScriptedClient>,
        Arc<watch::Sender<StatusReport>>,
    ) {
        let client = Arc::new(client);
        let (tx, rx) = publisher();
        let session = JobMonitor::spawn(
            JobHandle::new("job-1"),
            Arc::clone(&client),
            MonitorConfig::default(),
            Arc::clone(&tx),
        );
        (session, rx, client, tx)
    }

    fn owner(client: ScriptedClient) -> (SessionOwner<ScriptedClient>, watch::Receiver<StatusReport>, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let (tx, rx) = publisher();
        let cancel = CancellationToken::new();
        let owner = SessionOwner {
            handle: JobHandle::new("job-1"),
            client: Arc::clone(&client),
            refresh_timeout: Duration::from_secs(2),
            status_tx: tx,
            secondary_cancel: cancel.child_token(),
            cancel,
            progress: None,
            download: None,
            checkpoints: None,
        };
        (owner, rx, client)
    }

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.progress.interval, Duration::from_secs(5));
        assert_eq!(config.download.interval, Duration::from_secs(3));
        assert_eq!(config.stop_timeout, DEFAULT_STOP_TIMEOUT);
    }

    #[test]
    fn test_config_builders_apply_to_both_loops() {
        let config = MonitorConfig::default()
            .with_failure_threshold(3)
            .with_decode_policy(DecodePolicy::Fatal);
        assert_eq!(config.progress.failure_threshold, 3);
        assert_eq!(config.download.failure_threshold, 3);
        assert_eq!(config.download.decode_policy, DecodePolicy::Fatal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_training_progress_published() {
        let (session, mut rx, _client) = spawn(ScriptedClient::new(
            vec![Reply::Ok(ProgressSnapshot::running(0.42))],
            vec![Reply::Ok(DownloadSnapshot::idle())],
        ));

        let report = rx
            .wait_for(|r| matches!(r.status, UnifiedStatus::Training(_)))
            .await
            .unwrap()
            .clone();
        assert_eq!(report.job_id.as_deref(), Some("job-1"));
        assert_eq!(
            report.status,
            UnifiedStatus::Training(ProgressSnapshot::running(0.42))
        );
        assert!(report.download.is_none());

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_download_shown_then_cleared() {
        let (session, mut rx, _client) = spawn(ScriptedClient::new(
            vec![Reply::Ok(ProgressSnapshot::with_status(TrainingStatus::Pending))],
            vec![
                Reply::Ok(DownloadSnapshot::active()),
                Reply::Ok(DownloadSnapshot::idle()),
            ],
        ));

        rx.wait_for(|r| r.status == UnifiedStatus::DownloadingModel)
            .await
            .unwrap();
        assert!(rx.borrow().download.is_some());

        let report = rx
            .wait_for(|r| matches!(r.status, UnifiedStatus::Training(_)))
            .await
            .unwrap()
            .clone();
        assert!(report.download.is_none());

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_overrides_active_download_and_tears_down() {
        let (session, mut rx, client) = spawn(ScriptedClient::new(
            vec![
                Reply::Ok(ProgressSnapshot::running(0.9)),
                Reply::Ok(ProgressSnapshot::with_status(TrainingStatus::Completed)),
            ],
            vec![Reply::Ok(DownloadSnapshot::active())],
        ));

        let report = rx
            .wait_for(|r| r.status.is_terminal())
            .await
            .unwrap()
            .clone();
        assert_eq!(report.status, UnifiedStatus::Completed);
        assert!(report.download.is_none());
        assert_eq!(report.checkpoints.as_ref().map(Vec::len), Some(1));
        assert_eq!(client.calls("checkpoints", None), 1);

        // Session tasks exit on their own after a terminal state
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(session.is_finished());
        let downloads = client.calls("download", None);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(client.calls("download", None), downloads);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_failure_surfaces_message() {
        let (session, mut rx, client) = spawn(ScriptedClient::new(
            vec![Reply::Ok(ProgressSnapshot::failed("loss is NaN"))],
            vec![Reply::Ok(DownloadSnapshot::idle())],
        ));

        let report = rx
            .wait_for(|r| r.status.is_terminal())
            .await
            .unwrap()
            .clone();
        assert_eq!(report.status, UnifiedStatus::Failed("loss is NaN".into()));
        assert_eq!(report.last_error.as_deref(), Some("loss is NaN"));
        assert_eq!(client.calls("checkpoints", None), 0);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_failures_never_end_session() {
        let (session, mut rx, client) = spawn(ScriptedClient::new(
            vec![Reply::Ok(ProgressSnapshot::running(0.3))],
            vec![Reply::Err(ClientError::Transport("refused".into()))],
        ));

        // Download breaker trips after 10 attempts, 3s apart
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.calls("download", None), 10);
        assert!(matches!(rx.borrow_and_update().status, UnifiedStatus::Training(_)));
        assert!(!session.is_finished());
        assert!(client.calls("progress", None) >= 12);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_breaker_trip_is_connectivity_lost() {
        let (session, mut rx, client) = spawn(ScriptedClient::new(
            vec![Reply::Hang],
            vec![Reply::Ok(DownloadSnapshot::idle())],
        ));

        let report = rx
            .wait_for(|r| r.status.is_terminal())
            .await
            .unwrap()
            .clone();
        assert_eq!(report.status, UnifiedStatus::ConnectivityLost);
        assert!(report.last_error.unwrap().contains("may still be running"));
        assert_eq!(client.calls("progress", None), 10);
        assert_eq!(client.calls("stop", None), 0);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_failed() {
        let (session, mut rx, _client) = spawn(ScriptedClient::new(
            vec![Reply::Err(ClientError::Rejected("not found: job-1".into()))],
            vec![Reply::Ok(DownloadSnapshot::idle())],
        ));

        let report = rx
            .wait_for(|r| r.status.is_terminal())
            .await
            .unwrap()
            .clone();
        assert!(matches!(report.status, UnifiedStatus::Failed(ref m) if m.contains("not found")));

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_publishing() {
        let (session, mut rx, client, _tx) = spawn_with_sender(ScriptedClient::new(
            vec![Reply::Ok(ProgressSnapshot::running(0.1))],
            vec![Reply::Ok(DownloadSnapshot::idle())],
        ));

        rx.wait_for(|r| matches!(r.status, UnifiedStatus::Training(_)))
            .await
            .unwrap();
        session.shutdown().await;
        rx.mark_unchanged();

        let polls = client.calls("progress", None);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.calls("progress", None), polls);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_between_terminal_progress_and_exit_does_not_finalize() {
        let (mut owner, mut rx, client) = owner(ScriptedClient::new(
            vec![Reply::Ok(ProgressSnapshot::running(0.5))],
            vec![Reply::Ok(DownloadSnapshot::idle())],
        ));

        owner
            .handle_event(SessionEvent::Progress(ProgressSnapshot::running(0.9)))
            .await;
        let completed = ProgressSnapshot::with_status(TrainingStatus::Completed);
        owner
            .handle_event(SessionEvent::Progress(completed.clone()))
            .await;
        owner
            .handle_event(SessionEvent::Download(DownloadSnapshot::idle()))
            .await;

        // Terminal status waits for the exit event and its checkpoint refresh
        assert!(!rx.borrow_and_update().status.is_terminal());
        assert_eq!(client.calls("checkpoints", None), 0);

        let flow = owner
            .handle_event(SessionEvent::ProgressExit(LoopExit::Terminal(completed)))
            .await;
        assert!(flow.is_break());
        let report = rx.borrow_and_update().clone();
        assert_eq!(report.status, UnifiedStatus::Completed);
        assert_eq!(report.checkpoints.as_ref().map(Vec::len), Some(1));
        assert_eq!(client.calls("checkpoints", None), 1);
    }
}
