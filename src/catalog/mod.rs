//! Catalog abstraction
//!
//! The pipeline needs three catalog operations: listing the tables of a
//! namespace, creating a namespace and registering a freshly written table.
//! This module defines the contract for them plus the adapters shipped with
//! the crate:
//! - [`memory::MemoryCatalog`] for local runs and tests
//! - `iceberg_catalog::IcebergCatalog` (feature `iceberg`) for REST, S3 Tables, Unity
//!   and Glue catalogs
//!
//! # Example
//!
//! ```ignore
//! use lakehouse_ingest::catalog::{Catalog, CatalogReconciler, MemoryCatalog};
//!
//! let catalog = MemoryCatalog::new();
//! let entry = CatalogReconciler::new(&catalog).ensure_namespace("sales").await?;
//! assert!(entry.created);
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ColumnType, Dataset, PartitionSpec};

#[cfg(feature = "iceberg")]
pub mod iceberg_catalog;
pub mod memory;
pub mod reconciler;

#[cfg(feature = "iceberg")]
pub use iceberg_catalog::{CatalogConfig, IcebergCatalog};
pub use memory::MemoryCatalog;
pub use reconciler::CatalogReconciler;

/// Errors that can occur during catalog operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Connectivity-level failure: the catalog could not be reached at all
    #[error("Failed to connect to catalog: {0}")]
    Unreachable(String),

    /// Namespace not found
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Namespace already exists
    #[error("Namespace already exists: {0}")]
    NamespaceAlreadyExists(String),

    /// Table already registered
    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Any other error reported by the catalog service
    #[error("Catalog error: {0}")]
    Other(String),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog state of one namespace as observed by this invocation
///
/// Always read fresh; never reused across invocations or retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Namespace name
    pub namespace: String,
    /// Tables listed in the namespace at check time
    pub existing_table_names: BTreeSet<String>,
    /// Whether this invocation created the namespace
    pub created: bool,
}

impl CatalogEntry {
    /// Whether the table was already registered when checked
    pub fn has_table(&self, table: &str) -> bool {
        self.existing_table_names.contains(table)
    }
}

/// Table definition handed to the catalog after a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRegistration {
    pub namespace: String,
    pub table: String,
    /// Root URI the data files were written under
    pub location: String,
    /// Written columns in dataset order, partition columns included
    pub columns: Vec<(String, ColumnType)>,
    /// Identity partition columns, coarsest first
    pub partition_columns: Vec<String>,
}

impl TableRegistration {
    /// Describe the table a dataset was written to
    pub fn new(
        namespace: impl Into<String>,
        table: impl Into<String>,
        location: impl Into<String>,
        dataset: &Dataset,
        spec: &PartitionSpec,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            table: table.into(),
            location: location.into(),
            columns: dataset
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.column_type))
                .collect(),
            partition_columns: spec.partition_columns.clone(),
        }
    }
}

/// Catalog operations consumed by the pipeline
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List the tables of a namespace.
    ///
    /// Must fail with [`CatalogError::NamespaceNotFound`] when the namespace is
    /// absent and with [`CatalogError::Unreachable`] when the catalog cannot be
    /// contacted, so callers can tell the two apart.
    async fn list_tables(&self, namespace: &str) -> CatalogResult<BTreeSet<String>>;

    /// Create a namespace. May fail with
    /// [`CatalogError::NamespaceAlreadyExists`] under concurrent creation.
    async fn create_namespace(&self, namespace: &str) -> CatalogResult<()>;

    /// Register a table in an existing namespace. May fail with
    /// [`CatalogError::TableAlreadyExists`] under concurrent registration.
    async fn register_table(&self, registration: &TableRegistration) -> CatalogResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::NamespaceNotFound("sales".to_string());
        assert_eq!(err.to_string(), "Namespace not found: sales");

        let err = CatalogError::Unreachable("Connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to connect to catalog: Connection refused"
        );
    }

    #[test]
    fn test_catalog_entry_serialization() {
        let entry = CatalogEntry {
            namespace: "sales".to_string(),
            existing_table_names: BTreeSet::from(["orders".to_string()]),
            created: false,
        };
        assert!(entry.has_table("orders"));

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("existingTableNames"));
        assert!(json.contains("orders"));
    }

    #[test]
    fn test_registration_from_dataset() {
        use crate::models::{Column, PartitionGranularity, Value, WriteMode};

        let ds = Dataset::new(vec![
            Column::text("id", &["1"]),
            Column::new("year", ColumnType::Integer, vec![Value::Integer(2024)]),
        ])
        .unwrap();
        let spec = PartitionSpec::by_date(PartitionGranularity::Year, WriteMode::Append);
        let registration =
            TableRegistration::new("sales", "orders", "s3://clean-zone/sales/orders/", &ds, &spec);

        assert_eq!(
            registration.columns,
            vec![
                ("id".to_string(), ColumnType::Text),
                ("year".to_string(), ColumnType::Integer)
            ]
        );
        assert_eq!(registration.partition_columns, vec!["year"]);
    }
}
