//! Error types for the training-server client.

use thiserror::Error;

/// Errors returned by a [`TrainingClient`](super::TrainingClient) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request never produced a response (connect, reset, DNS, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status code.
    #[error("server returned HTTP {code}: {message}")]
    HttpStatus { code: u16, message: String },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The server refused the request outright (unknown job, bad request).
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ClientError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Decode errors are neither; the polling loop classifies them through
    /// its configured [`DecodePolicy`](crate::monitor::DecodePolicy).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::HttpStatus { code, .. } => is_retryable_status(*code),
            Self::Decode(_) | Self::Rejected(_) => false,
        }
    }

    /// Returns true for payload decode failures.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// 408, 429 and all 5xx are worth another attempt.
pub(crate) fn is_retryable_status(code: u16) -> bool {
    code == 408 || code == 429 || (500..600).contains(&code)
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ClientError::HttpStatus {
                code: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}
