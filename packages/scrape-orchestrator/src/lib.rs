//! Fetch Orchestration Core
//!
//! Sits between callers that want structured catalog data (navigation menus,
//! category listings, product detail pages) and a slow, failure-prone page
//! extractor. Every fetch goes through the same pipeline: validate, serve
//! from a TTL cache, admit through a per-domain rate limiter, track the
//! attempt as a job, extract under a timeout.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scrape_orchestrator::{
//!     BatchScheduler, FetchCoordinator, FetchRequest, HtmlExtractor, MemoryJobStore,
//!     OrchestratorConfig, TargetKind,
//! };
//!
//! let coordinator = Arc::new(FetchCoordinator::new(
//!     OrchestratorConfig::default(),
//!     Arc::new(HtmlExtractor::new()?),
//!     Arc::new(MemoryJobStore::new()),
//! ));
//!
//! // Single fetch
//! let nav = coordinator.fetch_navigation("https://www.example.com").await?;
//!
//! // Paced batch
//! let scheduler = BatchScheduler::new(coordinator.clone());
//! let result = scheduler
//!     .run(vec![FetchRequest::product("https://www.example.com/p/1", "sku-1")])
//!     .await;
//! ```
//!
//! # Modules
//!
//! - [`coordinator`] - Per-fetch state machine and reporting
//! - [`scheduler`] - Wave-based batch execution
//! - [`cache`] / [`rate_limit`] - Shared in-memory state
//! - [`tracker`] - Job open/finalize with a scoped guard
//! - [`traits`] - Extractor and job store boundaries
//! - [`stores`] - Job store implementations
//! - [`extractors`] - HTML page extractor
//! - [`retry`] - Caller-side retry wrapper
//! - [`testing`] - Mock extractor for tests

pub mod cache;
pub mod coordinator;
pub mod dedupe;
pub mod error;
pub mod extractors;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;
pub mod stores;
pub mod testing;
pub mod tracker;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use cache::{CacheKey, TtlCache};
pub use coordinator::{validate_url, FetchCoordinator};
pub use dedupe::{dedupe, DedupeKey};
pub use error::{ExtractError, ExtractResult, FetchError, FetchResult};
pub use extractors::HtmlExtractor;
pub use rate_limit::{domain_of, RateLimiter, RateWindow};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use scheduler::BatchScheduler;
pub use stores::MemoryJobStore;
pub use tracker::{JobGuard, JobTracker};
pub use traits::{
    extractor::{ExtractRequest, PageExtractor},
    job_store::JobStore,
};
pub use types::{
    batch::{BatchFailure, BatchResult, FetchRequest},
    config::{BatchConfig, OrchestratorConfig},
    job::{Job, JobId, JobOutcome, JobStatus},
    kind::TargetKind,
    record::{
        CategoryPage, ExtractedRecord, NavigationItem, ProductDetail, ProductListing,
        ProductMetadata, Review,
    },
    report::{CacheStatus, HealthSnapshot, HealthStatus},
};

#[cfg(feature = "postgres")]
pub use stores::PostgresJobStore;
