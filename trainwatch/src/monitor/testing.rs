//! Scripted [`TrainingClient`] for monitor unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::client::{CheckpointInfo, ClientError, TrainingClient};
use crate::monitor::{DownloadSnapshot, ProgressSnapshot};

/// One scripted server reply.
#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    Err(ClientError),
    /// Never answers (well, not for an hour).
    Hang,
}

/// Replies played back in order; the last one repeats forever.
#[derive(Debug)]
struct Script<T: Clone> {
    replies: VecDeque<Reply<T>>,
}

impl<T: Clone> Script<T> {
    fn new(replies: Vec<Reply<T>>) -> Self {
        Self {
            replies: replies.into(),
        }
    }

    fn next(&mut self) -> Reply<T> {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or(Reply::Hang)
        } else {
            self.replies.front().cloned().unwrap_or(Reply::Hang)
        }
    }
}

async fn play<T>(reply: Reply<T>) -> Result<T, ClientError> {
    match reply {
        Reply::Ok(value) => Ok(value),
        Reply::Err(error) => Err(error),
        Reply::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ClientError::Transport("hung request".into()))
        }
    }
}

/// Fake training server driven by per-endpoint scripts.
#[derive(Debug)]
pub(crate) struct ScriptedClient {
    progress: Mutex<Script<ProgressSnapshot>>,
    download: Mutex<Script<DownloadSnapshot>>,
    stop: Mutex<Script<()>>,
    checkpoints: Mutex<Script<Vec<CheckpointInfo>>>,
    calls: Mutex<Vec<(&'static str, String)>>,
}

impl ScriptedClient {
    pub(crate) fn new(
        progress: Vec<Reply<ProgressSnapshot>>,
        download: Vec<Reply<DownloadSnapshot>>,
    ) -> Self {
        Self {
            progress: Mutex::new(Script::new(progress)),
            download: Mutex::new(Script::new(download)),
            stop: Mutex::new(Script::new(vec![Reply::Ok(())])),
            checkpoints: Mutex::new(Script::new(vec![Reply::Ok(vec![CheckpointInfo {
                name: "final".into(),
                path: None,
                step: None,
                created_at: None,
            }])])),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_stop_reply(self, reply: Reply<()>) -> Self {
        *self.stop.lock().unwrap() = Script::new(vec![reply]);
        self
    }

    /// Number of calls to `endpoint`, optionally for one job only.
    pub(crate) fn calls(&self, endpoint: &str, job_id: Option<&str>) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, j)| *e == endpoint && job_id.map_or(true, |id| id == j))
            .count()
    }

    fn record(&self, endpoint: &'static str, job_id: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint, job_id.to_string()));
    }
}

impl TrainingClient for ScriptedClient {
    async fn fetch_progress(&self, job_id: &str) -> Result<ProgressSnapshot, ClientError> {
        self.record("progress", job_id);
        let reply = self.progress.lock().unwrap().next();
        play(reply).await
    }

    async fn fetch_download_status(&self, job_id: &str) -> Result<DownloadSnapshot, ClientError> {
        self.record("download", job_id);
        let reply = self.download.lock().unwrap().next();
        play(reply).await
    }

    async fn stop_job(&self, job_id: &str) -> Result<(), ClientError> {
        self.record("stop", job_id);
        let reply = self.stop.lock().unwrap().next();
        play(reply).await
    }

    async fn refresh_checkpoints(&self) -> Result<Vec<CheckpointInfo>, ClientError> {
        self.record("checkpoints", "");
        let reply = self.checkpoints.lock().unwrap().next();
        play(reply).await
    }
}
