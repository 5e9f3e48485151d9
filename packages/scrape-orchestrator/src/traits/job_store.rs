//! Persistence boundary for job records.
//!
//! The orchestrator treats a stored job as write-once-then-finalize: one
//! insert when the attempt starts, one terminal update when it ends. Jobs
//! are independent, so stores need no cross-job coordination.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FetchResult;
use crate::types::job::{Job, JobId, JobOutcome, JobStatus};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Append a newly opened job.
    async fn insert(&self, job: &Job) -> FetchResult<()>;

    /// Apply the terminal outcome.
    ///
    /// Returns `Ok(false)` if the job was already finalized (the stored
    /// record is left untouched) and `JobNotFound` if the id is unknown.
    async fn finalize(&self, id: JobId, outcome: &JobOutcome) -> FetchResult<bool>;

    /// Look up a job by id.
    async fn get(&self, id: JobId) -> FetchResult<Option<Job>>;

    /// Jobs not yet finalized (pending or in progress).
    async fn count_open(&self) -> FetchResult<u64>;

    /// Jobs with `status` that finished at or after `since`.
    async fn count_finished_since(&self, status: JobStatus, since: DateTime<Utc>) -> FetchResult<u64>;

    /// Mean duration of jobs that finished at or after `since` with a
    /// non-zero duration. `None` when there are none.
    async fn average_duration_ms_since(&self, since: DateTime<Utc>) -> FetchResult<Option<f64>>;
}
