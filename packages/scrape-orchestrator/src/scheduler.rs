//! Wave-based batch scheduler.
//!
//! Items are split into consecutive waves of `concurrency`. A wave is
//! dispatched to the coordinator all at once and fully awaited before the
//! pacing delay and the next wave, so waves never overlap. One item's
//! failure is recorded and never cancels its siblings.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::FetchCoordinator;
use crate::types::batch::{BatchResult, FetchRequest};
use crate::types::config::BatchConfig;

/// Failure message for items a cancelled batch never dispatched.
pub const NOT_DISPATCHED_MESSAGE: &str = "batch cancelled before dispatch";

pub struct BatchScheduler {
    coordinator: Arc<FetchCoordinator>,
    config: BatchConfig,
}

impl BatchScheduler {
    /// Scheduler using the coordinator's batch settings.
    pub fn new(coordinator: Arc<FetchCoordinator>) -> Self {
        let config = coordinator.config().batch.clone();
        Self { coordinator, config }
    }

    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run `items` with the configured concurrency and delay.
    pub async fn run(&self, items: Vec<FetchRequest>) -> BatchResult {
        self.run_batch(items, self.config.concurrency, self.config.inter_batch_delay())
            .await
    }

    pub async fn run_batch(
        &self,
        items: Vec<FetchRequest>,
        concurrency: usize,
        inter_batch_delay: Duration,
    ) -> BatchResult {
        let never = CancellationToken::new();
        self.run_batch_with_cancel(items, concurrency, inter_batch_delay, &never)
            .await
    }

    /// Run a batch that stops dispatching new waves once `cancel` fires.
    ///
    /// The wave in flight when cancellation arrives drains normally, and a
    /// pending inter-batch delay is cut short. Items never dispatched are
    /// recorded as failures with [`NOT_DISPATCHED_MESSAGE`].
    pub async fn run_batch_with_cancel(
        &self,
        items: Vec<FetchRequest>,
        concurrency: usize,
        inter_batch_delay: Duration,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let wave_size = concurrency.max(1);
        let mut result = BatchResult::new(items.len());
        let mut dispatched = 0;

        info!(
            total = items.len(),
            concurrency = wave_size,
            delay_ms = inter_batch_delay.as_millis() as u64,
            "Batch starting"
        );

        for (index, wave) in items.chunks(wave_size).enumerate() {
            if index > 0 && !inter_batch_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(inter_batch_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }

            if cancel.is_cancelled() {
                warn!(wave = index, remaining = items.len() - dispatched, "Batch cancelled");
                break;
            }

            debug!(wave = index, size = wave.len(), "Dispatching wave");
            self.run_wave(wave, &mut result).await;
            dispatched += wave.len();
        }

        for item in &items[dispatched..] {
            result.record_failure(&item.url, NOT_DISPATCHED_MESSAGE);
        }

        info!(
            total = result.total,
            success_count = result.success_count,
            failure_count = result.failure_count,
            "Batch finished"
        );
        result
    }

    /// Dispatch every item of the wave and record outcomes as they settle.
    async fn run_wave(&self, wave: &[FetchRequest], result: &mut BatchResult) {
        let mut in_flight: FuturesUnordered<_> = wave
            .iter()
            .map(|item| async move { (item, self.coordinator.fetch_request(item, None).await) })
            .collect();

        while let Some((item, outcome)) = in_flight.next().await {
            match outcome {
                Ok(record) => result.record_success(record),
                Err(e) => {
                    warn!(url = %item.url, kind = %item.kind, error = %e, "Batch item failed");
                    result.record_failure(&item.url, e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryJobStore;
    use crate::testing::MockExtractor;
    use crate::types::config::OrchestratorConfig;
    use crate::types::kind::TargetKind;
    use proptest::prelude::*;
    use tokio::time::Instant;

    fn item_url(i: usize) -> String {
        format!("https://x.com/item/{}", i)
    }

    fn items(n: usize) -> Vec<FetchRequest> {
        (1..=n)
            .map(|i| FetchRequest::new(item_url(i), TargetKind::Product))
            .collect()
    }

    fn scheduler(mock: MockExtractor) -> (BatchScheduler, Arc<MemoryJobStore>) {
        let store = Arc::new(MemoryJobStore::new());
        let config = OrchestratorConfig::default().with_rate_limit(1_000, Duration::from_secs(60));
        let coordinator = FetchCoordinator::new(config, Arc::new(mock), store.clone());
        (BatchScheduler::new(Arc::new(coordinator)), store)
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mock = MockExtractor::new()
            .with_failure(item_url(2), "boom")
            .with_failure(item_url(4), "boom");
        let (scheduler, store) = scheduler(mock);

        let result = scheduler.run_batch(items(5), 2, Duration::ZERO).await;

        assert_eq!(result.total, 5);
        assert_eq!(result.success_count, 3);
        assert_eq!(result.failure_count, 2);

        let mut failed: Vec<_> = result.failures.iter().map(|f| f.url.clone()).collect();
        failed.sort();
        assert_eq!(failed, vec![item_url(2), item_url(4)]);

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 5);
        assert!(jobs.iter().all(|job| job.status.is_terminal()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waves_bound_concurrency() {
        let mock = MockExtractor::new().with_delay(Duration::from_millis(100));
        let (scheduler, _store) = scheduler(mock.clone());

        let result = scheduler.run_batch(items(7), 3, Duration::ZERO).await;

        assert_eq!(result.success_count, 7);
        assert_eq!(mock.max_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_waves() {
        let (scheduler, _store) = scheduler(MockExtractor::new());
        let started = Instant::now();

        scheduler.run_batch(items(3), 1, Duration::from_millis(1000)).await;

        assert_eq!(started.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_zero_concurrency_runs_one_at_a_time() {
        let mock = MockExtractor::new();
        let (scheduler, _store) = scheduler(mock.clone());

        let result = scheduler.run_batch(items(3), 0, Duration::ZERO).await;

        assert_eq!(result.success_count, 3);
        assert_eq!(mock.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_new_waves() {
        let (scheduler, store) = scheduler(MockExtractor::new());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = scheduler
            .run_batch_with_cancel(items(5), 2, Duration::from_secs(10), &cancel)
            .await;

        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 3);
        assert!(result
            .failures
            .iter()
            .all(|f| f.error_message == NOT_DISPATCHED_MESSAGE));
        assert_eq!(store.job_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (scheduler, _store) = scheduler(MockExtractor::new());
        let result = scheduler.run(vec![]).await;
        assert_eq!(result.total, 0);
        assert!(result.is_success());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_every_item_accounted_once(
            failing in prop::collection::vec(any::<bool>(), 0..20),
            concurrency in 0usize..6,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();

            let mock = failing
                .iter()
                .enumerate()
                .filter(|(_, fails)| **fails)
                .fold(MockExtractor::new(), |mock, (i, _)| mock.with_failure(item_url(i + 1), "boom"));
            let (scheduler, _store) = scheduler(mock);

            let result = runtime.block_on(scheduler.run_batch(items(failing.len()), concurrency, Duration::ZERO));

            let expected_failures = failing.iter().filter(|f| **f).count();
            prop_assert_eq!(result.total, failing.len());
            prop_assert_eq!(result.success_count + result.failure_count, failing.len());
            prop_assert_eq!(result.failure_count, expected_failures);
            prop_assert_eq!(result.successes.len() + result.failures.len(), failing.len());
        }
    }
}
