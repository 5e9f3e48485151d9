//! Batch request and result types.

use serde::{Deserialize, Serialize};

use super::kind::TargetKind;
use super::record::ExtractedRecord;

/// One item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub url: String,
    pub kind: TargetKind,
    /// Caller's product identifier, copied onto detail records
    #[serde(default)]
    pub source_id: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            url: url.into(),
            kind,
            source_id: None,
        }
    }

    /// Product detail request carrying the caller's id.
    pub fn product(url: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: TargetKind::ProductDetail,
            source_id: Some(source_id.into()),
        }
    }
}

/// A batch item that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub url: String,
    pub error_message: String,
}

/// Outcome of a batch, partitioned into successes and failures.
///
/// Entries follow completion order inside a wave; waves keep their order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub successes: Vec<ExtractedRecord>,
    pub failures: Vec<BatchFailure>,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchResult {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub(crate) fn record_success(&mut self, record: ExtractedRecord) {
        self.successes.push(record);
        self.success_count += 1;
    }

    pub(crate) fn record_failure(&mut self, url: impl Into<String>, error_message: impl Into<String>) {
        self.failures.push(BatchFailure {
            url: url.into(),
            error_message: error_message.into(),
        });
        self.failure_count += 1;
    }

    /// Percentage of items that succeeded (0 for an empty batch).
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total as f64 * 100.0
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
