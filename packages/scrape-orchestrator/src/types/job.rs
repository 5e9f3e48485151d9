//! Job model: one record per live fetch attempt.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::kind::TargetKind;

/// Typed job identity, returned by `open` and required by `finalize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// New time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    /// Reserved for callers that report cache hits in bulk summaries. The
    /// coordinator never writes it: a cache hit opens no job.
    Cached,
}

impl JobStatus {
    /// `completed` and `failed` are the only statuses a finalized job holds.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cached => "cached",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cached" => Ok(JobStatus::Cached),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default)]
    pub id: JobId,

    pub target_url: String,
    pub target_kind: TargetKind,

    #[builder(default = JobStatus::InProgress)]
    pub status: JobStatus,
    #[builder(default = Utc::now())]
    pub started_at: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub finished_at: Option<DateTime<Utc>>,

    #[builder(default = 0)]
    pub duration_ms: u64,
    #[builder(default = 0)]
    pub result_count: u64,
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,

    #[builder(default = 0)]
    pub retry_count: u32,
    #[builder(default = 3)]
    pub max_retries: u32,
}

impl Job {
    /// Apply a terminal outcome. Returns false, leaving the job untouched,
    /// when the job is already finalized or the outcome is not terminal.
    pub fn finalize(&mut self, outcome: &JobOutcome, finished_at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() || !outcome.status.is_terminal() {
            return false;
        }
        self.status = outcome.status;
        self.result_count = outcome.result_count;
        self.duration_ms = outcome.duration_ms;
        self.error_message = outcome.error_message.clone();
        self.finished_at = Some(finished_at);
        true
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::InProgress)
    }
}

/// Terminal update written once per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub result_count: u64,
    pub duration_ms: u64,
    pub error_message: Option<String>,
}

impl JobOutcome {
    pub fn completed(result_count: u64, duration_ms: u64) -> Self {
        Self {
            status: JobStatus::Completed,
            result_count,
            duration_ms,
            error_message: None,
        }
    }

    /// `error_message` is the stringified cause only.
    pub fn failed(error_message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: JobStatus::Failed,
            result_count: 0,
            duration_ms,
            error_message: Some(error_message.into()),
        }
    }
}
