//! Reporting surface types: cache status and health snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Freshness of one cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub is_cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
}

impl CacheStatus {
    pub fn not_cached() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Open jobs above this count mark the orchestrator degraded.
pub const DEGRADED_PENDING_THRESHOLD: u64 = 5;

/// Point-in-time health of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    /// Jobs still pending or in progress
    pub pending_jobs: u64,
    pub completed_jobs_last_24h: u64,
    pub failed_jobs_last_24h: u64,
    /// Percentage of cache lookups that hit since start
    pub cache_hit_rate: f64,
    pub avg_duration_ms: f64,
    pub cache_size: usize,
    pub last_check: DateTime<Utc>,
}

impl HealthStatus {
    pub fn from_pending(pending_jobs: u64) -> Self {
        if pending_jobs > DEGRADED_PENDING_THRESHOLD {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
