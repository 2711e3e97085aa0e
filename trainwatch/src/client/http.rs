//! HTTP implementation of [`TrainingClient`] using `reqwest`.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Call | Request |
//! |------|---------|
//! | progress | `GET  /jobs/{id}/progress` |
//! | download status | `GET  /jobs/{id}/download` |
//! | stop | `POST /jobs/{id}/stop` |
//! | checkpoints | `GET  /checkpoints` |

use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::error::{is_retryable_status, ClientError};
use super::{CheckpointInfo, TrainingClient};
use crate::monitor::{DownloadSnapshot, ProgressSnapshot};

/// Default HTTP timeout; the polling loops apply their own, shorter deadline.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY: usize = 256;

#[derive(Deserialize)]
struct CheckpointList {
    #[serde(default)]
    checkpoints: Vec<CheckpointInfo>,
}

/// Training-server client over HTTP/JSON.
///
/// Holds one `reqwest::Client` so connections are pooled across polls.
#[derive(Debug, Clone)]
pub struct HttpTrainingClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTrainingClient {
    /// Creates a client for `base_url` with the default HTTP timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Creates a client with a custom HTTP timeout.
    ///
    /// Fails if `base_url` is not an absolute http(s) URL.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.into();
        let parsed = Url::parse(&base_url)
            .map_err(|e| ClientError::Transport(format!("invalid server URL {}: {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::Transport(format!(
                "invalid server URL {}: cannot hold a path",
                base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Appends `segments` to the base path, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Transport(format!("invalid server URL {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn job_url(&self, job_id: &str, leaf: &str) -> Result<Url, ClientError> {
        self.endpoint(&["jobs", job_id, leaf])
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self.http.get(url).send().await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Turns non-success responses into errors.
///
/// 404 means the job is unknown to the server, which no retry will fix.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    if code == 404 {
        return Err(ClientError::Rejected(format!("not found: {}", body.trim())));
    }
    if !is_retryable_status(code) {
        tracing::debug!(code, body = %body, "Training server rejected request");
    }
    Err(ClientError::HttpStatus {
        code,
        message: body.trim().to_string(),
    })
}

impl TrainingClient for HttpTrainingClient {
    async fn fetch_progress(&self, job_id: &str) -> Result<ProgressSnapshot, ClientError> {
        self.get_json(self.job_url(job_id, "progress")?).await
    }

    async fn fetch_download_status(&self, job_id: &str) -> Result<DownloadSnapshot, ClientError> {
        self.get_json(self.job_url(job_id, "download")?).await
    }

    async fn stop_job(&self, job_id: &str) -> Result<(), ClientError> {
        let response = self.http.post(self.job_url(job_id, "stop")?).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn refresh_checkpoints(&self) -> Result<Vec<CheckpointInfo>, ClientError> {
        let list: CheckpointList = self.get_json(self.endpoint(&["checkpoints"])?).await?;
        tracing::debug!(count = list.checkpoints.len(), "Checkpoint list fetched");
        Ok(list.checkpoints)
    }
}
