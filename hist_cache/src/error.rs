//! Error types for the cache service and its stores.

use bar_feed::{HistDataReq, ProviderError, RequestError, TimeRange};
use thiserror::Error;

/// Failure of a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening or migrating the database failed.
    #[error("failed to open {url}: {message}")]
    Open {
        /// Database URL or path.
        url: String,
        /// Error chain, rendered.
        message: String,
    },

    /// A query failed.
    #[error("database error: {0}")]
    Query(#[from] diesel::result::Error),

    /// A stored value no longer parses (hand-edited row, foreign writer).
    #[error("corrupt {column} value {value:?} in storage")]
    Corrupt {
        /// Column holding the bad value.
        column: &'static str,
        /// Raw stored text.
        value: String,
    },

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("in-memory store lock poisoned")]
    Poisoned,
}

/// Failure of a [`HistDataService`](crate::orchestrator::HistDataService) call.
#[derive(Debug, Error)]
pub enum HistDataError {
    /// Bad bar size, duration, security type, symbol or time zone.
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] RequestError),

    /// A planned sub-request failed at the broker. Earlier sub-requests that
    /// succeeded stay stored.
    #[error("download of {request} covering {range} failed: {source}")]
    DownloadFailed {
        /// The sub-request that failed.
        request: Box<HistDataReq>,
        /// Range the sub-request was planned to cover.
        range: TimeRange,
        /// Broker error.
        #[source]
        source: ProviderError,
    },

    /// The store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A spawned download job panicked.
    #[error("download job aborted: {0}")]
    JobAborted(String),
}

impl HistDataError {
    /// True when retrying the same call may succeed (broker connection trouble,
    /// throttling).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DownloadFailed { source, .. } => source.is_retryable(),
            Self::MalformedRequest(_) | Self::Storage(_) | Self::JobAborted(_) => false,
        }
    }
}
