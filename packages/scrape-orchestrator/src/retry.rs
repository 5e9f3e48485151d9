//! Caller-side retry wrapper.
//!
//! The coordinator fails fast; callers that want retries wrap it here.
//! Only retriable errors (rate limiting, extraction failures) are retried,
//! with a linear backoff of `backoff * attempt`. Every attempt opens its own
//! job, tagged with the attempt index as its retry count.

use std::time::Duration;

use tracing::warn;

use crate::coordinator::FetchCoordinator;
use crate::error::FetchResult;
use crate::types::config::OrchestratorConfig;
use crate::types::kind::TargetKind;
use crate::types::record::ExtractedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self { max_retries, backoff }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Fetch with retries according to `policy`.
pub async fn fetch_with_retry(
    coordinator: &FetchCoordinator,
    url: &str,
    kind: TargetKind,
    policy: RetryPolicy,
) -> FetchResult<ExtractedRecord> {
    let mut attempt = 0;
    loop {
        match coordinator.fetch_attempt(url, kind, attempt, None).await {
            Err(e) if e.is_retriable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_before(attempt);
                warn!(
                    url = %url,
                    kind = %kind,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            outcome => return outcome,
        }
    }
}
