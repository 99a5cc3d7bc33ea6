//! Object storage abstraction
//!
//! The pipeline reads one tabular object per record and writes a columnar
//! dataset under an output directory. Adapters:
//! - [`filesystem::FileSystemObjectStore`] (feature `native-fs`, default)
//! - `s3::S3ObjectStore` (feature `s3`)
//!
//! Both share the format handling in [`codec`], so the physical layout of the
//! written dataset does not depend on the backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::StorageLocator;
use crate::models::{CompressionCodec, Dataset, PartitionSpec};

pub mod codec;
#[cfg(feature = "native-fs")]
pub mod filesystem;
#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "native-fs")]
pub use filesystem::FileSystemObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

/// Errors raised by storage adapters
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Failed to encode columnar output: {0}")]
    Encode(String),

    #[error("Partition column '{0}' missing from dataset")]
    MissingPartitionColumn(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error reported by a remote object store service
    #[error("Object store error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object metadata returned by a head request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub size_bytes: u64,
}

/// Outcome of a columnar write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    /// Rows written across all files
    pub rows_written: usize,
    /// Number of data files created
    pub files_written: usize,
    /// Partition directories written, relative to the table root
    pub partitions_written: Vec<String>,
}

/// Storage operations consumed by the pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size of the source object named by the locator
    async fn head_metadata(&self, locator: &StorageLocator) -> StorageResult<ObjectMetadata>;

    /// Load a tabular object (CSV or Parquet) into memory
    async fn read_tabular(&self, path: &str) -> StorageResult<Dataset>;

    /// Write `dataset` as Parquet under the directory `path`.
    ///
    /// Partition columns named by `spec` become Hive-style directories and are
    /// not stored in the files. Under [`WriteMode::Overwrite`] the data already
    /// present in every written partition (or in the whole directory when
    /// un-partitioned) is replaced.
    ///
    /// [`WriteMode::Overwrite`]: crate::models::WriteMode::Overwrite
    async fn write_columnar(
        &self,
        dataset: &Dataset,
        path: &str,
        spec: &PartitionSpec,
        compression: CompressionCodec,
    ) -> StorageResult<WriteResult>;
}
