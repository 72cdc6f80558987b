//! Error types of the fetch layer and the extraction pipelines.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// A failed HTTP fetch, split by whether trying again can help.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    #[error("permanent failure fetching {url}: {reason}")]
    Permanent { url: String, reason: String },
}

impl FetchError {
    pub fn transient(url: &str, reason: impl ToString) -> Self {
        FetchError::Transient {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn permanent(url: &str, reason: impl ToString) -> Self {
        FetchError::Permanent {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    /// 5xx, 429 and 408 are worth retrying; any other error status is not.
    pub fn from_status(url: &str, status: StatusCode) -> Self {
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            Self::transient(url, format!("HTTP {}", status))
        } else {
            Self::permanent(url, format!("HTTP {}", status))
        }
    }

    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(url, status);
        }
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            Self::transient(url, err)
        } else {
            Self::permanent(url, err)
        }
    }
}

/// A stage of a collector run that could not produce its output.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("no local workbook and downloads are disabled")]
    DownloadDisabled,

    #[error("no destination-and-origin download link found from {0}")]
    NoLinkFound(String),

    #[error("download of {url} failed")]
    DownloadFailed {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("unreadable container: {0}")]
    UnreadableContainer(String),

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("extraction produced no rows")]
    EmptyExtraction,

    #[error("country seed missing: {0}")]
    MissingSeed(PathBuf),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] store::Error),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
