//! Testing utilities including a mock page extractor.
//!
//! Useful for exercising the coordinator and scheduler without network
//! access. All state is shared behind `Arc`s, so a clone handed to the
//! coordinator still reports calls to the copy kept by the test.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ExtractError, ExtractResult};
use crate::traits::extractor::{ExtractRequest, PageExtractor};
use crate::types::kind::TargetKind;
use crate::types::record::{ExtractedRecord, ProductDetail};

/// Record of a call made to the mock extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockExtractCall {
    pub url: String,
    pub kind: TargetKind,
}

/// A mock extractor returning canned records.
///
/// Unknown URLs get an empty record of the requested shape (a detail page
/// titled after its URL).
#[derive(Clone, Default)]
pub struct MockExtractor {
    /// Predefined records by URL
    records: Arc<RwLock<HashMap<String, ExtractedRecord>>>,

    /// URLs that fail, with the reason reported
    failures: Arc<RwLock<HashMap<String, String>>>,

    /// Artificial latency applied to every call
    delay: Option<Duration>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockExtractCall>>>,

    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `record` for `url`.
    pub fn with_record(self, url: impl Into<String>, record: ExtractedRecord) -> Self {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), record);
        self
    }

    /// Fail every extraction of `url` with `reason`.
    pub fn with_failure(self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), reason.into());
        self
    }

    /// Sleep for `delay` inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockExtractCall> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Calls made for one URL.
    pub fn calls_for(&self, url: &str) -> usize {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| call.url == url)
            .count()
    }

    /// Highest number of extractions that overlapped in time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn default_record(kind: TargetKind, url: &str) -> ExtractedRecord {
        match kind {
            TargetKind::Navigation => ExtractedRecord::Navigation(vec![]),
            TargetKind::Category => ExtractedRecord::Listing(vec![]),
            TargetKind::Product | TargetKind::ProductDetail => {
                ExtractedRecord::Detail(Box::new(ProductDetail::titled(url)))
            }
            TargetKind::Reviews => ExtractedRecord::Reviews(vec![]),
        }
    }
}

/// Decrements the in-flight counter even if the call is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageExtractor for MockExtractor {
    async fn extract(&self, request: &ExtractRequest) -> ExtractResult<ExtractedRecord> {
        let url = request.url.as_str().to_string();
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockExtractCall {
                url: url.clone(),
                kind: request.kind,
            });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&url)
            .cloned();
        if let Some(reason) = failure {
            return Err(ExtractError::Failed { url, reason });
        }

        let record = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&url)
            .cloned();
        Ok(record.unwrap_or_else(|| Self::default_record(request.kind, &url)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
