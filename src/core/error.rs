use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Every way a usage fetch can fail before it becomes a snapshot.
///
/// The fetcher collapses these into [`FetchFailure`](crate::core::models::FetchFailure)
/// so nothing above the fetch boundary has to handle a `Result`.
#[derive(Debug, Error)]
pub enum UsageError {
    /// No credential file on disk.
    #[error("No credentials found. Log in to Claude Code first.")]
    NotFound { path: PathBuf },

    /// Stored credentials or a remote body could not be decoded.
    #[error("Malformed data: {0}")]
    Parse(String),

    /// The token endpoint rejected the refresh or could not be reached.
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// The usage endpoint still returned 401 after one refresh.
    #[error("Unauthorized: usage endpoint rejected the refreshed token (HTTP 401)")]
    Unauthorized,

    /// Transport failure, timeout, or a non-success status.
    #[error("API error: {0}")]
    Network(String),

    #[error("Failed to write credentials to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageErrorKind {
    NotFound,
    Parse,
    Refresh,
    Unauthorized,
    Network,
}

impl UsageErrorKind {
    /// Short next-step shown beneath the error in the tray menu.
    pub fn hint(&self) -> &'static str {
        match self {
            UsageErrorKind::NotFound | UsageErrorKind::Refresh | UsageErrorKind::Unauthorized => {
                "Run `claude` to authenticate"
            }
            UsageErrorKind::Parse => "Check the credentials file and API settings",
            UsageErrorKind::Network => "Check your network connection",
        }
    }
}

impl UsageError {
    pub fn kind(&self) -> UsageErrorKind {
        match self {
            UsageError::NotFound { .. } => UsageErrorKind::NotFound,
            UsageError::Parse(_) => UsageErrorKind::Parse,
            UsageError::Refresh(_) | UsageError::Io { .. } => UsageErrorKind::Refresh,
            UsageError::Unauthorized => UsageErrorKind::Unauthorized,
            UsageError::Network(_) => UsageErrorKind::Network,
        }
    }
}

/// Renders a reqwest error for display. The URL is dropped so that endpoint
/// overrides with embedded query strings never reach logs.
pub fn describe_reqwest(err: reqwest::Error) -> String {
    let timeout = err.is_timeout();
    let message = err.without_url().to_string();
    if timeout {
        format!("request timed out ({message})")
    } else {
        message
    }
}
