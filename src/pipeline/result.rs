//! Response payloads

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IngestError;
use crate::inference::NormalizationReport;
use crate::partition::InvalidPartitionRow;
use crate::storage::WriteResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionStatus {
    Success,
    Failed,
}

/// Result of ingesting one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResult {
    pub status: IngestionStatus,
    pub invocation_id: Uuid,
    pub namespace: String,
    pub table: String,
    /// Every loaded row, including rows with invalid partition coordinates
    pub rows_processed: usize,
    pub output_path: String,
    /// Date column used for partitioning; absent for un-partitioned runs
    pub date_column_used: Option<String>,
    /// Detected candidates in rank order, the used one first
    pub date_candidates_considered: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<NormalizationReport>,
    pub invalid_partition_rows: Vec<InvalidPartitionRow>,
    /// Rows left out of the write by the invalid row policy
    pub rows_dropped: usize,
    /// Whether this run created the catalog namespace
    pub namespace_created: bool,
    /// Whether this run registered the table in the catalog
    pub table_registered: bool,
    pub write: WriteResult,
}

/// Results of every record of one event, in record order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResult {
    pub results: Vec<IngestionResult>,
}

impl EventResult {
    /// Rows processed across all records
    pub fn rows_processed(&self) -> usize {
        self.results.iter().map(|r| r.rows_processed).sum()
    }
}

/// Failure payload for callers that report instead of propagating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub status: IngestionStatus,
    pub error_kind: String,
    pub message: String,
}

impl From<&IngestError> for FailureReport {
    fn from(err: &IngestError) -> Self {
        Self {
            status: IngestionStatus::Failed,
            error_kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_report_from_error() {
        let report = FailureReport::from(&IngestError::NoDateColumn);
        assert_eq!(report.status, IngestionStatus::Failed);
        assert_eq!(report.error_kind, "NoDateColumnError");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errorKind"], "NoDateColumnError");
        assert_eq!(json["status"], "Failed");
    }

    #[test]
    fn test_event_rows_processed() {
        assert_eq!(EventResult::default().rows_processed(), 0);
    }
}
