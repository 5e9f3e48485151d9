//! Job lifecycle tracking.
//!
//! Every live fetch attempt opens exactly one job and finalizes it exactly
//! once. [`JobTracker::open`] hands out a [`JobGuard`]; consuming it with
//! [`JobGuard::complete`] or [`JobGuard::fail`] writes the terminal status.
//! A guard dropped without either (the fetch future was cancelled, or a
//! panic unwound through it) finalizes the job as `failed` from a spawned
//! task, so no job is left `in_progress`.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{FetchError, FetchResult};
use crate::traits::job_store::JobStore;
use crate::types::job::{Job, JobId, JobOutcome};
use crate::types::kind::TargetKind;

/// Error message recorded when a guard is dropped unfinalized.
pub const ABORTED_MESSAGE: &str = "fetch aborted before completion";

pub struct JobTracker {
    store: Arc<dyn JobStore>,
    max_retries: u32,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            max_retries: 3,
        }
    }

    /// `max_retries` recorded on every job this tracker opens.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Open a first-attempt job in `in_progress`.
    pub async fn open(&self, target_url: &str, target_kind: TargetKind) -> FetchResult<JobGuard> {
        self.open_attempt(target_url, target_kind, 0).await
    }

    /// Open a job for attempt number `retry_count` (0 = first try).
    pub async fn open_attempt(
        &self,
        target_url: &str,
        target_kind: TargetKind,
        retry_count: u32,
    ) -> FetchResult<JobGuard> {
        let job = Job::builder()
            .target_url(target_url)
            .target_kind(target_kind)
            .retry_count(retry_count)
            .max_retries(self.max_retries)
            .build();

        self.store.insert(&job).await?;
        info!(job_id = %job.id, url = %target_url, kind = %target_kind, retry_count, "Job opened");

        Ok(JobGuard {
            id: job.id,
            store: Arc::clone(&self.store),
            started: Instant::now(),
            finalized: false,
        })
    }

    /// Finalize a job by id. Prefer the guard; this exists for callers that
    /// track ids themselves.
    pub async fn finalize(&self, id: JobId, outcome: JobOutcome) -> FetchResult<()> {
        if !self.store.finalize(id, &outcome).await? {
            warn!(job_id = %id, "Job already finalized, update ignored");
        }
        Ok(())
    }

    /// Stored job, or `JobNotFound`.
    pub async fn get(&self, id: JobId) -> FetchResult<Job> {
        self.store
            .get(id)
            .await?
            .ok_or(FetchError::JobNotFound { id })
    }
}

/// Scoped handle on an open job.
#[must_use = "a job guard must be completed or failed"]
pub struct JobGuard {
    id: JobId,
    store: Arc<dyn JobStore>,
    started: Instant,
    finalized: bool,
}

impl JobGuard {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Finalize as `completed`.
    pub async fn complete(mut self, result_count: u64) -> FetchResult<()> {
        let outcome = JobOutcome::completed(result_count, self.elapsed_ms());
        self.finish(outcome).await
    }

    /// Finalize as `failed` with the stringified cause.
    pub async fn fail(mut self, error_message: impl Into<String>) -> FetchResult<()> {
        let outcome = JobOutcome::failed(error_message, self.elapsed_ms());
        self.finish(outcome).await
    }

    async fn finish(&mut self, outcome: JobOutcome) -> FetchResult<()> {
        let written = self.store.finalize(self.id, &outcome).await?;
        self.finalized = true;

        match written {
            true => info!(
                job_id = %self.id,
                status = %outcome.status,
                result_count = outcome.result_count,
                duration_ms = outcome.duration_ms,
                "Job finalized"
            ),
            false => warn!(job_id = %self.id, "Job already finalized, update ignored"),
        }
        Ok(())
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }

        let id = self.id;
        let outcome = JobOutcome::failed(ABORTED_MESSAGE, self.elapsed_ms());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = Arc::clone(&self.store);
                handle.spawn(async move {
                    match store.finalize(id, &outcome).await {
                        Ok(_) => debug!(job_id = %id, "Aborted job finalized as failed"),
                        Err(e) => warn!(job_id = %id, error = %e, "Failed to finalize aborted job"),
                    }
                });
            }
            Err(_) => warn!(job_id = %id, "Job guard dropped outside a runtime; job left open"),
        }
    }
}
