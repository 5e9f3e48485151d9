//! In-memory job store for tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{FetchError, FetchResult};
use crate::traits::job_store::JobStore;
use crate::types::job::{Job, JobId, JobOutcome, JobStatus};

/// In-memory job store.
///
/// Jobs are lost on restart.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// All stored jobs, oldest first.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().values().cloned().collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    pub fn job_count(&self) -> usize {
        self.read().len()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) -> FetchResult<()> {
        self.write().insert(job.id, job.clone());
        Ok(())
    }

    async fn finalize(&self, id: JobId, outcome: &JobOutcome) -> FetchResult<bool> {
        let mut jobs = self.write();
        let job = jobs.get_mut(&id).ok_or(FetchError::JobNotFound { id })?;
        Ok(job.finalize(outcome, Utc::now()))
    }

    async fn get(&self, id: JobId) -> FetchResult<Option<Job>> {
        Ok(self.read().get(&id).cloned())
    }

    async fn count_open(&self) -> FetchResult<u64> {
        Ok(self.read().values().filter(|job| job.is_open()).count() as u64)
    }

    async fn count_finished_since(&self, status: JobStatus, since: DateTime<Utc>) -> FetchResult<u64> {
        Ok(self
            .read()
            .values()
            .filter(|job| job.status == status)
            .filter(|job| job.finished_at.is_some_and(|at| at >= since))
            .count() as u64)
    }

    async fn average_duration_ms_since(&self, since: DateTime<Utc>) -> FetchResult<Option<f64>> {
        let jobs = self.read();
        let durations: Vec<u64> = jobs
            .values()
            .filter(|job| job.finished_at.is_some_and(|at| at >= since))
            .map(|job| job.duration_ms)
            .filter(|duration| *duration > 0)
            .collect();

        if durations.is_empty() {
            return Ok(None);
        }
        Ok(Some(durations.iter().sum::<u64>() as f64 / durations.len() as f64))
    }
}
