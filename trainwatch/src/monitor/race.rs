//! Deadline race for a single asynchronous attempt.
//!
//! [`race`] runs an operation on its own task and races it against a timer.
//! Whichever settles first decides the result. When the timer wins the
//! operation's cancellation token is cancelled, but the task is not aborted:
//! it may run to completion in the background and its result is discarded.
//! Operations are expected to watch their token and bail out early.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Reasons a raced operation produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceError {
    /// The deadline elapsed before the operation settled.
    #[error("operation timed out after {}ms", .deadline.as_millis())]
    TimedOut { deadline: Duration },

    /// The operation's task panicked or was torn down by the runtime.
    #[error("operation aborted: {0}")]
    Aborted(String),
}

/// Races `operation` against `deadline`.
///
/// The operation receives a child of `parent`, cancelled when the deadline
/// wins, when `parent` is cancelled, or when this future is dropped.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use trainwatch::monitor::race;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let parent = CancellationToken::new();
/// let value = race(|_token| async { 42 }, Duration::from_secs(1), &parent).await;
/// assert_eq!(value, Ok(42));
/// # }
/// ```
pub async fn race<T, F, Fut>(
    operation: F,
    deadline: Duration,
    parent: &CancellationToken,
) -> Result<T, RaceError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let token = parent.child_token();
    let _guard = token.clone().drop_guard();
    let attempt = tokio::spawn(operation(token));

    tokio::select! {
        joined = attempt => joined.map_err(|e| RaceError::Aborted(e.to_string())),
        _ = tokio::time::sleep(deadline) => {
            tracing::trace!(deadline_ms = deadline.as_millis(), "Race deadline won");
            Err(RaceError::TimedOut { deadline })
        }
    }
}
