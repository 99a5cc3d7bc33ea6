//! Lakehouse ingestion - event-driven landing of raw tabular files
//!
//! A trigger event names an object in a landing bucket. The pipeline:
//! - resolves namespace and table from the object key
//! - loads the CSV or Parquet object
//! - finds and normalizes the date column
//! - derives `year`/`month`/`day` partition columns
//! - makes sure the catalog namespace exists
//! - writes a Hive-partitioned Parquet dataset under `{root}/{namespace}/{table}/`
//!
//! Storage and catalog are traits so the same pipeline runs against S3 and
//! Iceberg in production and against a local directory and an in-memory
//! catalog in tests.

pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod ingest;
#[cfg(feature = "tracing-subscriber")]
pub mod logging;
pub mod models;
pub mod partition;
pub mod pipeline;
pub mod storage;

// Re-export commonly used types
pub use catalog::{
    Catalog, CatalogEntry, CatalogError, CatalogReconciler, MemoryCatalog, TableRegistration,
};
#[cfg(feature = "iceberg")]
pub use catalog::{CatalogConfig, IcebergCatalog};
pub use config::IngestConfig;
pub use error::{IngestError, IngestResult};
pub use inference::{DateCandidate, DateColumnDetector, DateNormalizer, NormalizationReport};
pub use ingest::{PathMetadataExtractor, StorageLocator};
pub use models::enums::*;
pub use models::{Column, ColumnType, Dataset, PartitionSpec, Value};
pub use partition::{PartitionKeyDeriver, PartitionReport};
pub use pipeline::{EventResult, IngestionPipeline, IngestionResult, TriggerEvent, TriggerRecord};
#[cfg(feature = "native-fs")]
pub use storage::FileSystemObjectStore;
#[cfg(feature = "s3")]
pub use storage::S3ObjectStore;
pub use storage::{ObjectStore, StorageError, WriteResult};
