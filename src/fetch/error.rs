//! Error types for remote calls and orchestrated fetches

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The call did not finish within its time budget
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (DNS, connect, reset)
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The body could not be decoded into the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Malformed(err.to_string())
    }
}

/// Error surfaced by the orchestrator when no data, fresh or stale, is available
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The rate limiter denied the call and no stale fallback existed
    #[error("{resource}: request quota exceeded, try again later")]
    QuotaExceeded { resource: String },

    /// The remote call failed transiently and no stale fallback existed
    #[error("{resource}: service unavailable ({reason})")]
    RemoteUnavailable { resource: String, reason: String },

    /// The remote rejected the request; retrying will not help without intervention
    #[error("{resource}: request rejected with HTTP {status} ({message})")]
    RemoteRejected {
        resource: String,
        status: u16,
        message: String,
    },

    /// The remote answered but the payload had an unexpected shape
    #[error("{resource}: malformed response ({reason})")]
    MalformedResponse { resource: String, reason: String },
}

impl FetchError {
    /// Classifies a remote failure for `resource`
    ///
    /// 4xx statuses (401, 403, 429 and friends) are rejections. 408 Request
    /// Timeout is a timeout like any other: it joins 5xx and transport errors
    /// as unavailable.
    pub fn from_remote(resource: &str, err: RemoteError) -> Self {
        let resource = resource.to_string();
        match err {
            RemoteError::Status { status, message }
                if (400..500).contains(&status) && status != 408 =>
            {
                FetchError::RemoteRejected {
                    resource,
                    status,
                    message,
                }
            }
            RemoteError::Malformed(reason) => FetchError::MalformedResponse { resource, reason },
            other => FetchError::RemoteUnavailable {
                resource,
                reason: other.to_string(),
            },
        }
    }

    /// Name of the resource the error belongs to
    pub fn resource(&self) -> &str {
        match self {
            FetchError::QuotaExceeded { resource }
            | FetchError::RemoteUnavailable { resource, .. }
            | FetchError::RemoteRejected { resource, .. }
            | FetchError::MalformedResponse { resource, .. } => resource,
        }
    }

    /// Whether retrying later may succeed without user intervention
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::QuotaExceeded { .. } | FetchError::RemoteUnavailable { .. } => true,
            FetchError::RemoteRejected { status, .. } => *status == 429,
            FetchError::MalformedResponse { .. } => false,
        }
    }
}
