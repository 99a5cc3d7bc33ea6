//! Pipeline error taxonomy
//!
//! Every variant is fatal to the invocation that raised it and is returned to
//! the caller unmodified. Catalog namespace creation failures and per-value
//! date parse failures never show up here.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::models::DatasetError;
use crate::storage::StorageError;

/// Errors that fail an ingestion invocation
#[derive(Error, Debug)]
pub enum IngestError {
    /// Object key has too few segments to name a namespace and table
    #[error(
        "Path structure invalid for '{path}'. Expected at least 3 segments after prefix, got: {segments:?}"
    )]
    MalformedPath {
        /// Decoded object key
        path: String,
        /// Segments left after prefix stripping
        segments: Vec<String>,
    },

    /// Detection found no temporal column and none was configured
    #[error("No date column detected. Please specify an explicit date column (DATE_COLUMN_NAME).")]
    NoDateColumn,

    /// Configured or selected date column is absent from the loaded data
    #[error("Date column '{column}' not found in the input file. Available columns: {available:?}")]
    DateColumnNotFound {
        /// Requested column
        column: String,
        /// Columns actually present
        available: Vec<String>,
    },

    /// Date column shares its name with a derived partition column
    #[error("Date column '{column}' collides with a derived partition column; rename it or disable partitioning")]
    PartitionColumnConflict { column: String },

    /// Catalog cannot be reached at all (distinct from a missing namespace)
    #[error("Catalog unreachable: {0}")]
    CatalogUnreachable(#[source] CatalogError),

    /// Source object could not be read
    #[error("Failed to load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: StorageError,
    },

    /// Columnar write collaborator failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: StorageError,
    },

    /// Trigger event payload could not be interpreted
    #[error("Invalid trigger event: {0}")]
    InvalidEvent(String),

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset shape violated while deriving columns
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

impl IngestError {
    /// Short machine-readable name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::MalformedPath { .. } => "MalformedPathError",
            IngestError::NoDateColumn => "NoDateColumnError",
            IngestError::DateColumnNotFound { .. } => "DateColumnNotFoundError",
            IngestError::PartitionColumnConflict { .. } => "PartitionColumnConflictError",
            IngestError::CatalogUnreachable(_) => "CatalogUnreachableError",
            IngestError::Load { .. } => "LoadError",
            IngestError::Write { .. } => "WriteError",
            IngestError::InvalidEvent(_) => "InvalidEventError",
            IngestError::Config(_) => "ConfigError",
            IngestError::Dataset(_) => "DatasetError",
        }
    }
}

/// Result type for pipeline operations
pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::MalformedPath {
            path: "a/b.csv".to_string(),
            segments: vec!["a".to_string(), "b.csv".to_string()],
        };
        assert!(err.to_string().contains("at least 3 segments"));
        assert_eq!(err.kind(), "MalformedPathError");

        let err = IngestError::DateColumnNotFound {
            column: "order_date".to_string(),
            available: vec!["id".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Date column 'order_date' not found in the input file. Available columns: [\"id\"]"
        );
    }

    #[test]
    fn test_catalog_unreachable_keeps_source() {
        use std::error::Error as _;

        let err = IngestError::CatalogUnreachable(CatalogError::Unreachable(
            "connection refused".to_string(),
        ));
        assert!(err.source().is_some());
        assert_eq!(err.kind(), "CatalogUnreachableError");
    }
}
