//! Page extractor boundary.
//!
//! How a page is rendered and parsed is not the orchestrator's concern. It
//! only needs one bounded operation: given a URL and a target kind, produce
//! a record or fail.
//!
//! # Usage
//!
//! ```rust,ignore
//! use scrape_orchestrator::{ExtractRequest, HtmlExtractor, PageExtractor, TargetKind};
//!
//! let extractor = HtmlExtractor::new()?;
//! let request = ExtractRequest::new(url, TargetKind::Category, Duration::from_secs(30));
//! let record = extractor.extract(&request).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::ExtractResult;
use crate::types::kind::TargetKind;
use crate::types::record::ExtractedRecord;

/// One extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub url: Url,
    pub kind: TargetKind,
    /// Time budget. The coordinator enforces it as well; extractors should
    /// pass it down to their transport.
    pub timeout: Duration,
}

impl ExtractRequest {
    pub fn new(url: Url, kind: TargetKind, timeout: Duration) -> Self {
        Self { url, kind, timeout }
    }
}

/// Turns a page into a structured record.
///
/// Implementations:
/// - `HtmlExtractor` - HTTP fetch + CSS selector extraction
/// - `testing::MockExtractor` - canned records for tests
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Extract the record for `request.kind` from `request.url`.
    ///
    /// The returned shape must match the kind; the coordinator rejects
    /// anything else as a failed extraction.
    async fn extract(&self, request: &ExtractRequest) -> ExtractResult<ExtractedRecord>;

    /// Extractor name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<E: PageExtractor + ?Sized> PageExtractor for Arc<E> {
    async fn extract(&self, request: &ExtractRequest) -> ExtractResult<ExtractedRecord> {
        (**self).extract(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
