//! The fetch coordinator.
//!
//! One logical fetch runs these steps in order, each a possible early exit:
//!
//! 1. validate the URL (`Validation`, nothing else touched)
//! 2. cache lookup (a hit returns without rate accounting or a job)
//! 3. rate-limit admission for the URL's domain (`RateLimitExceeded`)
//! 4. open a job and run the extractor under the extraction timeout
//! 5. finalize the job, then write the cache and return
//!
//! The job is always finalized before the cache write, so a health query
//! never sees an open job whose result is already cached. The coordinator
//! never retries; see [`crate::retry`] for the caller-side wrapper.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheKey, TtlCache};
use crate::dedupe::dedupe;
use crate::error::{ExtractError, ExtractResult, FetchError, FetchResult};
use crate::rate_limit::RateLimiter;
use crate::tracker::JobTracker;
use crate::traits::extractor::{ExtractRequest, PageExtractor};
use crate::traits::job_store::JobStore;
use crate::types::batch::FetchRequest;
use crate::types::config::OrchestratorConfig;
use crate::types::job::{Job, JobId, JobStatus};
use crate::types::kind::TargetKind;
use crate::types::record::{CategoryPage, ExtractedRecord, NavigationItem, ProductDetail};
use crate::types::report::{CacheStatus, HealthSnapshot, HealthStatus};

/// Trailing window of the health snapshot.
const HEALTH_WINDOW_HOURS: i64 = 24;

/// Runs single fetches against shared cache, rate-limiter and job state.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = FetchCoordinator::new(
///     OrchestratorConfig::default(),
///     Arc::new(HtmlExtractor::new()?),
///     Arc::new(MemoryJobStore::new()),
/// );
///
/// let page = coordinator
///     .fetch_category("https://www.example.com/en-gb/category/fiction", "Fiction")
///     .await?;
/// ```
pub struct FetchCoordinator {
    cache: Arc<TtlCache<ExtractedRecord>>,
    limiter: Arc<RateLimiter>,
    tracker: JobTracker,
    extractor: Arc<dyn PageExtractor>,
    config: OrchestratorConfig,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl FetchCoordinator {
    /// Create a coordinator with its own cache and rate limiter.
    pub fn new(
        config: OrchestratorConfig,
        extractor: Arc<dyn PageExtractor>,
        job_store: Arc<dyn JobStore>,
    ) -> Self {
        let cache = Arc::new(TtlCache::new(config.cache_ttl()));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max_requests,
            config.rate_limit_window(),
        ));
        Self::with_parts(config, extractor, job_store, cache, limiter)
    }

    /// Create a coordinator over an existing cache and rate limiter, so
    /// several coordinators can share admission and cached results.
    pub fn with_parts(
        config: OrchestratorConfig,
        extractor: Arc<dyn PageExtractor>,
        job_store: Arc<dyn JobStore>,
        cache: Arc<TtlCache<ExtractedRecord>>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let tracker = JobTracker::new(job_store).with_max_retries(config.max_retries);
        Self {
            cache,
            limiter,
            tracker,
            extractor,
            config,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TtlCache<ExtractedRecord>> {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Fetch `url` as `kind`, serving a fresh cached result when present.
    pub async fn fetch(&self, url: &str, kind: TargetKind) -> FetchResult<ExtractedRecord> {
        self.fetch_attempt(url, kind, 0, None).await
    }

    /// [`FetchCoordinator::fetch`] that aborts the extraction when `cancel`
    /// fires. The job of an aborted extraction is finalized `failed`.
    pub async fn fetch_with_cancel(
        &self,
        url: &str,
        kind: TargetKind,
        cancel: &CancellationToken,
    ) -> FetchResult<ExtractedRecord> {
        self.fetch_attempt(url, kind, 0, Some(cancel)).await
    }

    /// One pass through the fetch state machine. `attempt` is recorded on
    /// the job as its retry count.
    pub async fn fetch_attempt(
        &self,
        url: &str,
        kind: TargetKind,
        attempt: u32,
        cancel: Option<&CancellationToken>,
    ) -> FetchResult<ExtractedRecord> {
        let target = validate_url(url)?;
        let key = CacheKey::new(kind, target.as_str());

        if let Some(record) = self.cache.get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache hit");
            return Ok(record);
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(FetchError::Cancelled);
        }

        self.limiter.admit_url(&target)?;

        let guard = self
            .tracker
            .open_attempt(target.as_str(), kind, attempt)
            .await?;

        let request = ExtractRequest::new(target, kind, self.config.extraction_timeout());
        match self.extract(&request, cancel).await {
            Ok(record) => {
                let result_count = record.result_count();
                guard.complete(result_count as u64).await?;
                self.cache.insert(key, record.clone());

                info!(
                    url = %request.url,
                    kind = %kind,
                    result_count,
                    "Fetch completed"
                );
                Ok(record)
            }
            Err(e) => {
                warn!(url = %request.url, kind = %kind, error = %e, "Fetch failed");
                if let Err(store_err) = guard.fail(e.to_string()).await {
                    warn!(url = %request.url, error = %store_err, "Failed to record job failure");
                }
                Err(FetchError::Extraction(e))
            }
        }
    }

    /// Run the extractor under the timeout and optional cancellation, then
    /// check and normalize its output.
    async fn extract(
        &self,
        request: &ExtractRequest,
        cancel: Option<&CancellationToken>,
    ) -> ExtractResult<ExtractedRecord> {
        debug!(url = %request.url, kind = %request.kind, extractor = self.extractor.name(), "Extracting");

        let extraction = tokio::time::timeout(request.timeout, self.extractor.extract(request));
        let outcome = match cancel {
            Some(token) => tokio::select! {
                outcome = extraction => outcome,
                _ = token.cancelled() => return Err(ExtractError::Cancelled),
            },
            None => extraction.await,
        };

        let record = outcome.map_err(|_| ExtractError::Timeout {
            url: request.url.to_string(),
            timeout: request.timeout,
        })??;

        if !record.matches_kind(request.kind) {
            return Err(ExtractError::ShapeMismatch {
                kind: request.kind,
                found: record.shape_name(),
            });
        }

        Ok(match record {
            ExtractedRecord::Listing(products) => ExtractedRecord::Listing(dedupe(products)),
            ExtractedRecord::Detail(mut detail) => {
                detail.source_url.get_or_insert_with(|| request.url.to_string());
                detail.last_scraped_at = Some(Utc::now());
                ExtractedRecord::Detail(detail)
            }
            other => other,
        })
    }

    /// Fetch a batch item, attaching its `source_id` to detail records.
    pub async fn fetch_request(
        &self,
        request: &FetchRequest,
        cancel: Option<&CancellationToken>,
    ) -> FetchResult<ExtractedRecord> {
        let record = self.fetch_attempt(&request.url, request.kind, 0, cancel).await?;

        Ok(match (record, &request.source_id) {
            (ExtractedRecord::Detail(mut detail), Some(source_id)) => {
                detail.source_id = Some(source_id.clone());
                ExtractedRecord::Detail(detail)
            }
            (record, _) => record,
        })
    }

    /// Site navigation menu.
    pub async fn fetch_navigation(&self, site_url: &str) -> FetchResult<Vec<NavigationItem>> {
        let record = self.fetch(site_url, TargetKind::Navigation).await?;
        record.into_navigation().ok_or_else(|| shape_error(TargetKind::Navigation))
    }

    /// Category page with its deduplicated product listing.
    pub async fn fetch_category(&self, category_url: &str, category_title: &str) -> FetchResult<CategoryPage> {
        let record = self.fetch(category_url, TargetKind::Category).await?;
        let products = record
            .into_listing()
            .ok_or_else(|| shape_error(TargetKind::Category))?;

        Ok(CategoryPage {
            title: category_title.to_string(),
            url: category_url.to_string(),
            count: products.len(),
            products,
        })
    }

    /// Product detail page tagged with the caller's `source_id`.
    pub async fn fetch_product_detail(&self, product_url: &str, source_id: &str) -> FetchResult<ProductDetail> {
        let request = FetchRequest::product(product_url, source_id);
        let record = self.fetch_request(&request, None).await?;
        record
            .into_detail()
            .ok_or_else(|| shape_error(TargetKind::ProductDetail))
    }

    /// Drop any cached result for the request's key, then fetch live.
    pub async fn refetch(
        &self,
        request: &FetchRequest,
        cancel: Option<&CancellationToken>,
    ) -> FetchResult<ExtractedRecord> {
        let target = validate_url(&request.url)?;
        if self.cache.invalidate(&CacheKey::new(request.kind, target.as_str())) {
            debug!(url = %target, kind = %request.kind, "Cache entry dropped for refetch");
        }
        self.fetch_request(request, cancel).await
    }

    /// Live product detail page, bypassing any cached copy.
    pub async fn refetch_product_detail(&self, product_url: &str, source_id: &str) -> FetchResult<ProductDetail> {
        let request = FetchRequest::product(product_url, source_id);
        self.refetch(&request, None)
            .await?
            .into_detail()
            .ok_or_else(|| shape_error(TargetKind::ProductDetail))
    }

    // Reporting

    /// Freshness of the cache entry for `(kind, url)`. Never evicts.
    pub fn cache_status(&self, kind: TargetKind, url: &str) -> CacheStatus {
        self.cache.status(&cache_key(kind, url))
    }

    /// Drop the entry for `(kind, url)`. Returns whether one existed.
    pub fn invalidate(&self, kind: TargetKind, url: &str) -> bool {
        self.cache.invalidate(&cache_key(kind, url))
    }

    /// Drop the entries for `url` under every kind. Returns how many existed.
    pub fn invalidate_url(&self, url: &str) -> usize {
        TargetKind::ALL
            .iter()
            .filter(|kind| self.invalidate(**kind, url))
            .count()
    }

    /// Drop every cached result. Returns how many entries were removed.
    pub fn clear_cache(&self) -> usize {
        let removed = self.cache.clear_all();
        info!(removed, "Cache cleared");
        removed
    }

    /// Percentage of cache lookups that hit since this coordinator started.
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        if lookups == 0 {
            return 0.0;
        }
        hits as f64 / lookups as f64 * 100.0
    }

    /// Job counts and timings over the trailing 24 hours.
    pub async fn health(&self) -> FetchResult<HealthSnapshot> {
        let now = Utc::now();
        let since = now - chrono::Duration::hours(HEALTH_WINDOW_HOURS);
        let store = self.tracker.store();

        let pending_jobs = store.count_open().await?;
        let completed_jobs_last_24h = store.count_finished_since(JobStatus::Completed, since).await?;
        let failed_jobs_last_24h = store.count_finished_since(JobStatus::Failed, since).await?;
        let avg_duration_ms = store
            .average_duration_ms_since(since)
            .await?
            .map(f64::round)
            .unwrap_or(0.0);

        Ok(HealthSnapshot {
            status: HealthStatus::from_pending(pending_jobs),
            pending_jobs,
            completed_jobs_last_24h,
            failed_jobs_last_24h,
            cache_hit_rate: self.cache_hit_rate(),
            avg_duration_ms,
            cache_size: self.cache.len(),
            last_check: now,
        })
    }

    /// Stored job by id.
    pub async fn job(&self, id: JobId) -> FetchResult<Job> {
        self.tracker.get(id).await
    }
}

/// Parse `url` as an absolute URL with a host.
pub fn validate_url(url: &str) -> FetchResult<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| FetchError::Validation {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::Validation {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
        });
    }

    Ok(parsed)
}

/// Cache key in the normalized form used by fetches. Unparseable URLs map
/// to a raw key that can never have been written.
fn cache_key(kind: TargetKind, url: &str) -> CacheKey {
    match validate_url(url) {
        Ok(parsed) => CacheKey::new(kind, parsed.as_str()),
        Err(_) => CacheKey::new(kind, url),
    }
}

fn shape_error(kind: TargetKind) -> FetchError {
    FetchError::Extraction(ExtractError::ShapeMismatch {
        kind,
        found: "unexpected record",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryJobStore;
    use crate::testing::MockExtractor;
    use crate::types::record::ProductListing;
    use std::time::Duration;

    fn coordinator(extractor: MockExtractor, config: OrchestratorConfig) -> (FetchCoordinator, Arc<MemoryJobStore>) {
        let store = Arc::new(MemoryJobStore::new());
        let coordinator = FetchCoordinator::new(config, Arc::new(extractor), store.clone());
        (coordinator, store)
    }

    #[tokio::test]
    async fn test_invalid_url_touches_nothing() {
        let mock = MockExtractor::new();
        let (coordinator, store) = coordinator(mock.clone(), OrchestratorConfig::default());

        for bad in ["not a url", "/relative/path", "mailto:someone@example.com"] {
            let err = coordinator.fetch(bad, TargetKind::Product).await.unwrap_err();
            assert!(matches!(err, FetchError::Validation { .. }), "{bad}: {err}");
        }

        assert_eq!(store.job_count(), 0);
        assert_eq!(mock.call_count(), 0);
        assert_eq!(coordinator.cache_hit_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_rate_limit_and_job() {
        let mock = MockExtractor::new();
        let config = OrchestratorConfig::default().with_rate_limit(1, Duration::from_secs(60));
        let (coordinator, store) = coordinator(mock.clone(), config);

        coordinator.fetch("https://x.com/a", TargetKind::Product).await.unwrap();
        // Budget of one is spent, yet cached reads keep succeeding
        for _ in 0..3 {
            coordinator.fetch("https://x.com/a", TargetKind::Product).await.unwrap();
        }

        assert_eq!(mock.call_count(), 1);
        assert_eq!(store.job_count(), 1);
        assert_eq!(coordinator.cache_hit_rate(), 75.0);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_before_job() {
        let mock = MockExtractor::new();
        let config = OrchestratorConfig::default().with_rate_limit(1, Duration::from_secs(60));
        let (coordinator, store) = coordinator(mock.clone(), config);

        coordinator.fetch("https://x.com/a", TargetKind::Product).await.unwrap();
        let err = coordinator.fetch("https://x.com/b", TargetKind::Product).await.unwrap_err();

        assert!(matches!(err, FetchError::RateLimitExceeded { ref domain, .. } if domain == "x.com"));
        assert_eq!(store.job_count(), 1);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_extractor_failure_finalizes_failed_and_skips_cache() {
        let mock = MockExtractor::new().with_failure("https://x.com/broken", "no product container");
        let (coordinator, store) = coordinator(mock, OrchestratorConfig::default());

        let err = coordinator
            .fetch("https://x.com/broken", TargetKind::ProductDetail)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Extraction(ExtractError::Failed { .. })));

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert!(jobs[0]
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("no product container")));
        assert!(coordinator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_extraction_failure() {
        let mock = MockExtractor::new().with_record("https://x.com/", ExtractedRecord::Listing(vec![]));
        let (coordinator, store) = coordinator(mock, OrchestratorConfig::default());

        let err = coordinator.fetch("https://x.com/", TargetKind::Navigation).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Extraction(ExtractError::ShapeMismatch { kind: TargetKind::Navigation, found: "listing" })
        ));
        assert_eq!(store.jobs()[0].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_category_listing_is_deduplicated() {
        let listing = vec![
            ProductListing::new("Dune", "https://x.com/p/dune"),
            ProductListing::new("Emma", "https://x.com/p/emma"),
            ProductListing::new("Dune", "https://x.com/p/dune"),
        ];
        let mock = MockExtractor::new().with_record("https://x.com/c/fiction", ExtractedRecord::Listing(listing));
        let (coordinator, store) = coordinator(mock, OrchestratorConfig::default());

        let page = coordinator
            .fetch_category("https://x.com/c/fiction", "Fiction")
            .await
            .unwrap();

        assert_eq!(page.title, "Fiction");
        assert_eq!(page.count, 2);
        assert_eq!(page.products[1].title, "Emma");
        assert_eq!(store.jobs()[0].result_count, 2);
    }

    #[tokio::test]
    async fn test_product_detail_is_enriched() {
        let mock = MockExtractor::new().with_record(
            "https://x.com/p/dune",
            ExtractedRecord::Detail(Box::new(ProductDetail::titled("Dune"))),
        );
        let (coordinator, store) = coordinator(mock, OrchestratorConfig::default());

        let detail = coordinator
            .fetch_product_detail("https://x.com/p/dune", "sku-42")
            .await
            .unwrap();

        assert_eq!(detail.title.as_deref(), Some("Dune"));
        assert_eq!(detail.source_id.as_deref(), Some("sku-42"));
        assert_eq!(detail.source_url.as_deref(), Some("https://x.com/p/dune"));
        assert!(detail.last_scraped_at.is_some());

        let job = &store.jobs()[0];
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_finalizes_failed() {
        let mock = MockExtractor::new().with_delay(Duration::from_secs(10));
        let config = OrchestratorConfig::default().with_extraction_timeout(Duration::from_secs(1));
        let (coordinator, store) = coordinator(mock, config);

        let err = coordinator.fetch("https://x.com/slow", TargetKind::Product).await.unwrap_err();
        assert!(matches!(err, FetchError::Extraction(ExtractError::Timeout { .. })));

        let job = &store.jobs()[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.as_deref().is_some_and(|m| m.contains("timeout")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_extraction() {
        let mock = MockExtractor::new().with_delay(Duration::from_secs(10));
        let (coordinator, store) = coordinator(mock, OrchestratorConfig::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = coordinator
            .fetch_with_cancel("https://x.com/slow", TargetKind::Product, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Extraction(ExtractError::Cancelled)));
        assert_eq!(store.jobs()[0].status, JobStatus::Failed);

        // Already cancelled: nothing is opened
        let err = coordinator
            .fetch_with_cancel("https://x.com/other", TargetKind::Product, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
        assert_eq!(store.job_count(), 1);
    }

    #[tokio::test]
    async fn test_refetch_bypasses_fresh_entry() {
        let mock = MockExtractor::new();
        let (coordinator, _store) = coordinator(mock.clone(), OrchestratorConfig::default());

        coordinator.fetch("https://x.com/a", TargetKind::Product).await.unwrap();
        coordinator
            .refetch(&FetchRequest::new("https://x.com/a", TargetKind::Product), None)
            .await
            .unwrap();
        coordinator.fetch("https://x.com/a", TargetKind::Product).await.unwrap();

        assert_eq!(mock.calls_for("https://x.com/a"), 2);
    }

    #[tokio::test]
    async fn test_refetch_product_detail_tags_source_id() {
        let mock = MockExtractor::new();
        let (coordinator, store) = coordinator(mock.clone(), OrchestratorConfig::default());

        coordinator.fetch_product_detail("https://x.com/p/1", "sku-1").await.unwrap();
        let detail = coordinator
            .refetch_product_detail("https://x.com/p/1", "sku-9")
            .await
            .unwrap();

        assert_eq!(detail.source_id.as_deref(), Some("sku-9"));
        assert_eq!(mock.calls_for("https://x.com/p/1"), 2);
        assert_eq!(store.job_count(), 2);
    }

    #[tokio::test]
    async fn test_cache_status_and_invalidation() {
        let (coordinator, _store) = coordinator(MockExtractor::new(), OrchestratorConfig::default());

        assert!(!coordinator.cache_status(TargetKind::Category, "https://x.com/c").is_cached);
        coordinator.fetch("https://x.com/c", TargetKind::Category).await.unwrap();
        coordinator.fetch("https://x.com/c", TargetKind::Navigation).await.unwrap();

        let status = coordinator.cache_status(TargetKind::Category, "https://x.com/c");
        assert!(status.is_cached);
        assert_eq!(status.expired, Some(false));

        assert!(coordinator.invalidate(TargetKind::Category, "https://x.com/c"));
        assert!(!coordinator.invalidate(TargetKind::Category, "https://x.com/c"));
        assert_eq!(coordinator.invalidate_url("https://x.com/c"), 1);
        assert_eq!(coordinator.invalidate_url("not a url"), 0);
    }

    #[tokio::test]
    async fn test_health_snapshot() {
        let mock = MockExtractor::new().with_failure("https://x.com/bad", "boom");
        let (coordinator, _store) = coordinator(mock, OrchestratorConfig::default());

        coordinator.fetch("https://x.com/a", TargetKind::Product).await.unwrap();
        coordinator.fetch("https://x.com/a", TargetKind::Product).await.unwrap();
        let _ = coordinator.fetch("https://x.com/bad", TargetKind::Product).await;

        let health = coordinator.health().await.unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.pending_jobs, 0);
        assert_eq!(health.completed_jobs_last_24h, 1);
        assert_eq!(health.failed_jobs_last_24h, 1);
        assert_eq!(health.cache_size, 1);
        assert!((health.cache_hit_rate - 100.0 / 3.0).abs() < 1e-9);

        assert_eq!(coordinator.clear_cache(), 1);
    }

    #[tokio::test]
    async fn test_job_lookup() {
        let (coordinator, store) = coordinator(MockExtractor::new(), OrchestratorConfig::default());
        coordinator.fetch("https://x.com/a", TargetKind::Product).await.unwrap();

        let id = store.jobs()[0].id;
        assert_eq!(coordinator.job(id).await.unwrap().target_url, "https://x.com/a");
        assert!(matches!(
            coordinator.job(JobId::new()).await.unwrap_err(),
            FetchError::JobNotFound { .. }
        ));
    }
}
