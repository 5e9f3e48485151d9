//! Configuration for the orchestration core.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options recognized by the coordinator, scheduler and retry wrapper.
///
/// Durations are stored as integer milliseconds so the config stays plain
/// JSON/env friendly; accessors hand out [`Duration`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// How long a fetched result stays fresh. Default: 1 hour.
    pub cache_ttl_ms: u64,

    /// Length of a per-domain rate window. Default: 60s.
    pub rate_limit_window_ms: u64,

    /// Admissions allowed per domain per window. Default: 30.
    pub rate_limit_max_requests: u32,

    /// Time budget of a single extraction. Default: 30s.
    pub extraction_timeout_ms: u64,

    /// Wave sizing and pacing for batches.
    pub batch: BatchConfig,

    /// Attempts the caller-side retry wrapper may add. Default: 3.
    pub max_retries: u32,

    /// Base delay between retry attempts. Default: 2s.
    pub retry_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 3_600_000,
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 30,
            extraction_timeout_ms: 30_000,
            batch: BatchConfig::default(),
            max_retries: 3,
            retry_backoff_ms: 2_000,
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn with_rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.rate_limit_max_requests = max_requests;
        self.rate_limit_window_ms = window.as_millis() as u64;
        self
    }

    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self
    }
}

/// Wave sizing for the batch scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items dispatched together per wave. Default: 3.
    pub concurrency: usize,

    /// Pause between waves (not after the last). Default: 1000ms.
    pub inter_batch_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            inter_batch_delay_ms: 1_000,
        }
    }
}

impl BatchConfig {
    pub fn new(concurrency: usize, inter_batch_delay: Duration) -> Self {
        Self {
            concurrency,
            inter_batch_delay_ms: inter_batch_delay.as_millis() as u64,
        }
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}
