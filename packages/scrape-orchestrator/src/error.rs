//! Typed errors for the orchestration core.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match
//! on the failure kind and decide whether to retry.

use std::time::Duration;

use thiserror::Error;

use crate::types::job::JobId;
use crate::types::kind::TargetKind;

/// Errors surfaced by a single logical fetch or a reporting query.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Target URL is not a well-formed absolute URL. Not retriable.
    #[error("invalid URL {url}: {reason}")]
    Validation { url: String, reason: String },

    /// The domain's window is exhausted. Retriable after the window resets.
    #[error("rate limit exceeded for {domain}: max {max_requests} requests per {window:?}")]
    RateLimitExceeded {
        domain: String,
        max_requests: u32,
        window: Duration,
    },

    /// The page extractor failed or timed out.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    /// Job id unknown to the job store
    #[error("job not found: {id}")]
    JobNotFound { id: JobId },

    /// Job store operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Cancelled before any job was opened
    #[error("operation cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether a caller-side retry can reasonably succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimitExceeded { .. } | FetchError::Extraction(_)
        )
    }

    #[cfg(feature = "postgres")]
    pub(crate) fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        FetchError::Storage(err.into())
    }
}

/// Errors reported by a [`PageExtractor`](crate::traits::extractor::PageExtractor).
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Extraction exceeded its time budget
    #[error("timeout extracting {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Remote answered with a non-success status
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// Extractor returned a record that does not fit the requested kind
    #[error("extractor returned {found} for a {kind} fetch")]
    ShapeMismatch { kind: TargetKind, found: &'static str },

    /// Extractor-reported failure
    #[error("extraction of {url} failed: {reason}")]
    Failed { url: String, reason: String },

    /// Caller cancelled the in-flight extraction
    #[error("extraction cancelled")]
    Cancelled,
}

/// Result type alias for orchestration operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for extractor operations.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;
