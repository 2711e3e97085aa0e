//! Interval-spaced polling loop with deadline racing and circuit breaking.
//!
//! A [`PollingLoop`] repeatedly runs one poll operation until the remote side
//! reports a terminal state, the breaker trips, a fatal error occurs, or the
//! loop is cancelled.
//!
//! # Algorithm
//!
//! ```text
//! loop while not cancelled:
//!     outcome = race(poll_once, timeout)
//!     Success   -> breaker.record_success(); on_snapshot(s); exit if s is terminal
//!     Transient -> exit with ConnectivityLost if breaker.record_failure() trips
//!     Fatal     -> exit immediately, breaker untouched
//!     sleep(interval)   (cancellable)
//! ```
//!
//! Cancellation is observed while the attempt is in flight and during the
//! sleep, so teardown never waits longer than one interval.

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::breaker::{CircuitBreaker, DEFAULT_FAILURE_THRESHOLD};
use super::race::{race, RaceError};
use super::snapshot::{DownloadSnapshot, ProgressSnapshot};
use crate::client::ClientError;

/// Default poll interval for the training-progress stream.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Default per-attempt deadline for the training-progress stream.
pub const DEFAULT_PROGRESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Default poll interval for the model-download stream.
pub const DEFAULT_DOWNLOAD_INTERVAL: Duration = Duration::from_secs(3);

/// Default per-attempt deadline for the model-download stream.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3);

/// How a malformed payload is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Count it against the circuit breaker and keep polling.
    #[default]
    Transient,
    /// Stop polling immediately.
    Fatal,
}

impl DecodePolicy {
    /// Config-file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }
}

impl FromStr for DecodePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transient" | "retry" => Ok(Self::Transient),
            "fatal" | "stop" => Ok(Self::Fatal),
            other => Err(format!("unknown decode policy '{}'", other)),
        }
    }
}

/// Settings for one polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between attempts.
    pub interval: Duration,
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Consecutive transient failures before giving up.
    pub failure_threshold: u32,
    /// Treatment of malformed payloads.
    pub decode_policy: DecodePolicy,
}

impl PollConfig {
    /// Defaults for the training-progress stream (5s / 5s).
    pub fn progress() -> Self {
        Self {
            interval: DEFAULT_PROGRESS_INTERVAL,
            timeout: DEFAULT_PROGRESS_TIMEOUT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            decode_policy: DecodePolicy::default(),
        }
    }

    /// Defaults for the model-download stream (3s / 3s).
    pub fn download() -> Self {
        Self {
            interval: DEFAULT_DOWNLOAD_INTERVAL,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            ..Self::progress()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }
}

/// Snapshots that can signal the end of a remote job.
pub trait PollSnapshot {
    /// Returns true if no further polling is useful.
    fn is_terminal(&self) -> bool;
}

impl PollSnapshot for ProgressSnapshot {
    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl PollSnapshot for DownloadSnapshot {
    fn is_terminal(&self) -> bool {
        false
    }
}

/// A failed poll attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Race(#[from] RaceError),
}

/// Classified result of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<S> {
    Success(S),
    Transient(PollError),
    Fatal(PollError),
}

/// Sorts one raced attempt into success, transient or fatal failure.
pub fn classify<S>(
    attempt: Result<Result<S, ClientError>, RaceError>,
    policy: DecodePolicy,
) -> PollOutcome<S> {
    match attempt {
        Ok(Ok(snapshot)) => PollOutcome::Success(snapshot),
        Ok(Err(error)) if error.is_retryable() => PollOutcome::Transient(error.into()),
        Ok(Err(error)) if error.is_decode() => match policy {
            DecodePolicy::Transient => PollOutcome::Transient(error.into()),
            DecodePolicy::Fatal => PollOutcome::Fatal(error.into()),
        },
        Ok(Err(error)) => PollOutcome::Fatal(error.into()),
        Err(race_error) => PollOutcome::Transient(race_error.into()),
    }
}

/// Why a polling loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit<S> {
    /// The cancellation token fired.
    Cancelled,
    /// The remote side reported a terminal snapshot.
    Terminal(S),
    /// The breaker tripped after consecutive transient failures.
    ConnectivityLost { failures: u32, last_error: PollError },
    /// A fatal error ended polling without touching the breaker.
    Fatal(PollError),
}

/// One polling loop.
pub struct PollingLoop {
    name: &'static str,
    config: PollConfig,
    breaker: CircuitBreaker,
    failures: Arc<AtomicU32>,
}

impl PollingLoop {
    /// Creates a loop; `name` is used only for logging.
    pub fn new(name: &'static str, config: PollConfig) -> Self {
        let breaker = CircuitBreaker::new(config.failure_threshold);
        Self {
            name,
            config,
            breaker,
            failures: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Shared view of the breaker's consecutive-failure count.
    ///
    /// Stays readable after the loop has been moved into a task.
    pub fn failure_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.failures)
    }

    /// Runs until a terminal snapshot, breaker trip, fatal error or cancellation.
    ///
    /// `poll_once` is called once per attempt with a token that is cancelled
    /// if the attempt loses its race. `on_snapshot` is never called once
    /// `cancel` has fired.
    pub async fn run<S, P, Fut, F>(
        mut self,
        mut poll_once: P,
        mut on_snapshot: F,
        cancel: CancellationToken,
    ) -> LoopExit<S>
    where
        S: PollSnapshot + Send + 'static,
        P: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<S, ClientError>> + Send + 'static,
        F: FnMut(&S),
    {
        tracing::debug!(
            loop_name = self.name,
            interval_ms = self.config.interval.as_millis(),
            timeout_ms = self.config.timeout.as_millis(),
            threshold = self.breaker.threshold(),
            "Polling loop started"
        );

        loop {
            if cancel.is_cancelled() {
                return self.exit_cancelled();
            }

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.exit_cancelled(),
                attempt = race(&mut poll_once, self.config.timeout, &cancel) => attempt,
            };

            match classify(attempt, self.config.decode_policy) {
                PollOutcome::Success(snapshot) => {
                    self.breaker.record_success();
                    self.sync_failures();

                    if cancel.is_cancelled() {
                        return self.exit_cancelled();
                    }
                    on_snapshot(&snapshot);

                    if snapshot.is_terminal() {
                        tracing::debug!(loop_name = self.name, "Terminal snapshot, loop done");
                        return LoopExit::Terminal(snapshot);
                    }
                }
                PollOutcome::Transient(error) => {
                    let tripped = self.breaker.record_failure();
                    self.sync_failures();
                    let failures = self.breaker.consecutive_failures();

                    if tripped {
                        tracing::error!(
                            loop_name = self.name,
                            failures,
                            error = %error,
                            "Circuit breaker tripped, polling stopped"
                        );
                        return LoopExit::ConnectivityLost {
                            failures,
                            last_error: error,
                        };
                    }

                    tracing::warn!(
                        loop_name = self.name,
                        consecutive_failures = failures,
                        threshold = self.breaker.threshold(),
                        error = %error,
                        "Poll attempt failed, will retry"
                    );
                }
                PollOutcome::Fatal(error) => {
                    tracing::error!(loop_name = self.name, error = %error, "Fatal poll error");
                    return LoopExit::Fatal(error);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.exit_cancelled(),
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    fn sync_failures(&self) {
        self.failures
            .store(self.breaker.consecutive_failures(), Ordering::Relaxed);
    }

    fn exit_cancelled<S>(&self) -> LoopExit<S> {
        tracing::debug!(loop_name = self.name, "Polling loop cancelled");
        LoopExit::Cancelled
    }
}
