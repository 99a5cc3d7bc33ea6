//! Apache Iceberg catalog adapter
//!
//! Supports the catalog flavours a lakehouse landing zone is typically
//! registered in:
//! - REST catalog (Lakekeeper, Nessie, Polaris)
//! - AWS S3 Tables
//! - Databricks Unity Catalog
//! - AWS Glue (feature `iceberg-glue`)
//!
//! Namespace absence is detected with an explicit existence check before
//! listing, so a missing namespace and an unreachable service never look alike.
//!
//! # Example
//!
//! ```ignore
//! use lakehouse_ingest::catalog::{CatalogConfig, IcebergCatalog};
//!
//! let config = CatalogConfig::Rest {
//!     endpoint: "http://localhost:8181".to_string(),
//!     warehouse: "s3://clean-zone".to_string(),
//!     token: None,
//!     properties: Default::default(),
//! };
//!
//! let catalog = IcebergCatalog::new(config).await?;
//! let tables = catalog.list_tables("sales").await?;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use ::iceberg::spec::{NestedField, PrimitiveType, Schema, Transform, Type, UnboundPartitionSpec};
use ::iceberg::{CatalogBuilder, NamespaceIdent, TableCreation, TableIdent};
use async_trait::async_trait;
use iceberg_catalog_rest::{REST_CATALOG_PROP_URI, REST_CATALOG_PROP_WAREHOUSE, RestCatalogBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Catalog, CatalogError, CatalogResult, TableRegistration};
use crate::models::ColumnType;

/// Catalog configuration for the supported Iceberg catalog types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogConfig {
    /// REST catalog (Lakekeeper, Nessie, Polaris, etc.)
    Rest {
        /// Catalog endpoint URL
        endpoint: String,
        /// Warehouse location (S3, local path, etc.)
        warehouse: String,
        /// Optional bearer token for authentication
        token: Option<String>,
        /// Additional properties
        #[serde(default)]
        properties: HashMap<String, String>,
    },

    /// AWS S3 Tables catalog
    S3Tables {
        /// S3 Tables ARN
        arn: String,
        /// AWS region
        region: String,
        /// Optional AWS credentials profile
        profile: Option<String>,
    },

    /// Databricks Unity Catalog
    Unity {
        /// Unity Catalog endpoint
        endpoint: String,
        /// Catalog name
        catalog: String,
        /// OAuth token
        token: String,
    },

    /// AWS Glue catalog
    Glue {
        /// AWS region
        region: String,
        /// Warehouse location
        warehouse: String,
        /// Optional AWS credentials profile
        profile: Option<String>,
    },
}

/// Iceberg catalog wrapper
pub struct IcebergCatalog {
    config: CatalogConfig,
    inner: Arc<dyn ::iceberg::Catalog>,
}

impl IcebergCatalog {
    /// Connect to the catalog described by `config`
    pub async fn new(config: CatalogConfig) -> CatalogResult<Self> {
        let inner: Arc<dyn ::iceberg::Catalog> = match &config {
            CatalogConfig::Rest {
                endpoint,
                warehouse,
                token,
                properties,
            } => {
                let mut props = HashMap::new();
                props.insert(REST_CATALOG_PROP_URI.to_string(), endpoint.clone());
                props.insert(REST_CATALOG_PROP_WAREHOUSE.to_string(), warehouse.clone());
                if let Some(t) = token {
                    props.insert("token".to_string(), t.clone());
                }
                props.extend(properties.clone());

                Arc::new(load_rest("rest", props).await?)
            }
            CatalogConfig::S3Tables { arn, region, .. } => {
                // S3 Tables exposes an Iceberg REST endpoint per region
                let mut props = HashMap::new();
                props.insert(
                    REST_CATALOG_PROP_URI.to_string(),
                    format!("https://s3tables.{}.amazonaws.com/iceberg", region),
                );
                props.insert(REST_CATALOG_PROP_WAREHOUSE.to_string(), arn.clone());

                Arc::new(load_rest("s3tables", props).await?)
            }
            CatalogConfig::Unity {
                endpoint,
                catalog,
                token,
            } => {
                let mut props = HashMap::new();
                props.insert(
                    REST_CATALOG_PROP_URI.to_string(),
                    format!("{}/api/2.1/unity-catalog/iceberg", endpoint),
                );
                props.insert(REST_CATALOG_PROP_WAREHOUSE.to_string(), catalog.clone());
                props.insert("token".to_string(), token.clone());

                Arc::new(load_rest("unity", props).await?)
            }
            #[cfg(feature = "iceberg-glue")]
            CatalogConfig::Glue {
                region,
                warehouse,
                profile,
            } => {
                use iceberg_catalog_glue::{GLUE_CATALOG_PROP_WAREHOUSE, GlueCatalogBuilder};

                let mut props = HashMap::new();
                props.insert(GLUE_CATALOG_PROP_WAREHOUSE.to_string(), warehouse.clone());
                props.insert("aws.region".to_string(), region.clone());
                if let Some(p) = profile {
                    props.insert("aws.profile".to_string(), p.clone());
                }

                let catalog = GlueCatalogBuilder::default()
                    .load("glue", props)
                    .await
                    .map_err(|e| CatalogError::Unreachable(e.to_string()))?;
                Arc::new(catalog)
            }
            #[cfg(not(feature = "iceberg-glue"))]
            CatalogConfig::Glue { .. } => {
                return Err(CatalogError::ConfigError(
                    "Glue catalog requires the 'iceberg-glue' feature. \
                     Enable it with: --features iceberg-glue"
                        .to_string(),
                ));
            }
        };

        Ok(Self { config, inner })
    }

    /// Get the catalog configuration
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }
}

fn primitive_type(column_type: ColumnType) -> PrimitiveType {
    match column_type {
        ColumnType::Boolean => PrimitiveType::Boolean,
        ColumnType::Integer => PrimitiveType::Long,
        ColumnType::Float => PrimitiveType::Double,
        ColumnType::Text => PrimitiveType::String,
        ColumnType::Date => PrimitiveType::Date,
        ColumnType::Timestamp => PrimitiveType::Timestamp,
    }
}

/// Iceberg schema and identity partition spec of a registration.
///
/// Field ids follow column order starting at 1.
fn table_creation(registration: &TableRegistration) -> CatalogResult<TableCreation> {
    let fields = registration
        .columns
        .iter()
        .zip(1..)
        .map(|((name, column_type), id)| {
            Arc::new(NestedField::optional(
                id,
                name,
                Type::Primitive(primitive_type(*column_type)),
            ))
        })
        .collect::<Vec<_>>();
    let schema = Schema::builder()
        .with_schema_id(0)
        .with_fields(fields)
        .build()
        .map_err(|e| CatalogError::Other(e.to_string()))?;

    let mut partition_spec = UnboundPartitionSpec::builder().with_spec_id(0);
    for name in &registration.partition_columns {
        let source_id = registration
            .columns
            .iter()
            .zip(1..)
            .find_map(|((column, _), id)| (column == name).then_some(id))
            .ok_or_else(|| {
                CatalogError::Other(format!("Partition column {} is not in the schema", name))
            })?;
        partition_spec = partition_spec
            .add_partition_field(source_id, name, Transform::Identity)
            .map_err(|e| CatalogError::Other(e.to_string()))?;
    }

    Ok(TableCreation::builder()
        .name(registration.table.clone())
        .schema(schema)
        .partition_spec(partition_spec.build())
        .location(registration.location.trim_end_matches('/').to_string())
        .build())
}

async fn load_rest(
    name: &str,
    props: HashMap<String, String>,
) -> CatalogResult<iceberg_catalog_rest::RestCatalog> {
    RestCatalogBuilder::default()
        .load(name, props)
        .await
        .map_err(|e| CatalogError::Unreachable(e.to_string()))
}

#[async_trait]
impl Catalog for IcebergCatalog {
    async fn list_tables(&self, namespace: &str) -> CatalogResult<BTreeSet<String>> {
        let ns_ident = NamespaceIdent::new(namespace.to_string());

        // A failed existence check means we never got an answer from the service
        let exists = self
            .inner
            .namespace_exists(&ns_ident)
            .await
            .map_err(|e| CatalogError::Unreachable(e.to_string()))?;
        if !exists {
            return Err(CatalogError::NamespaceNotFound(namespace.to_string()));
        }

        let tables = self
            .inner
            .list_tables(&ns_ident)
            .await
            .map_err(|e| CatalogError::Other(e.to_string()))?;
        debug!(namespace, count = tables.len(), "Listed Iceberg tables");

        Ok(tables.into_iter().map(|t| t.name().to_string()).collect())
    }

    async fn create_namespace(&self, namespace: &str) -> CatalogResult<()> {
        let ns_ident = NamespaceIdent::new(namespace.to_string());

        if let Err(e) = self
            .inner
            .create_namespace(&ns_ident, HashMap::new())
            .await
        {
            // Distinguish a lost race from a real failure
            return match self.inner.namespace_exists(&ns_ident).await {
                Ok(true) => Err(CatalogError::NamespaceAlreadyExists(namespace.to_string())),
                _ => Err(CatalogError::Other(e.to_string())),
            };
        }

        Ok(())
    }

    async fn register_table(&self, registration: &TableRegistration) -> CatalogResult<()> {
        let ns_ident = NamespaceIdent::new(registration.namespace.clone());
        let table_ident = TableIdent::new(ns_ident.clone(), registration.table.clone());
        let creation = table_creation(registration)?;

        if let Err(e) = self.inner.create_table(&ns_ident, creation).await {
            return match self.inner.table_exists(&table_ident).await {
                Ok(true) => Err(CatalogError::TableAlreadyExists(format!(
                    "{}.{}",
                    registration.namespace, registration.table
                ))),
                _ => Err(CatalogError::Other(e.to_string())),
            };
        }

        debug!(
            namespace = %registration.namespace,
            table = %registration.table,
            "Created Iceberg table"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_config_serialize_rest() {
        let config = CatalogConfig::Rest {
            endpoint: "http://localhost:8181".to_string(),
            warehouse: "s3://clean-zone".to_string(),
            token: None,
            properties: HashMap::new(),
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"rest\""));
        assert!(json.contains("localhost:8181"));
    }

    #[test]
    fn test_catalog_config_deserialize_glue() {
        let json = r#"{
            "type": "glue",
            "region": "eu-west-1",
            "warehouse": "s3://clean-zone",
            "profile": null
        }"#;

        let config: CatalogConfig = serde_json::from_str(json).unwrap();
        match config {
            CatalogConfig::Glue {
                region, warehouse, ..
            } => {
                assert_eq!(region, "eu-west-1");
                assert_eq!(warehouse, "s3://clean-zone");
            }
            _ => panic!("Expected Glue config"),
        }
    }

    #[test]
    fn test_table_creation_partitions_by_identity() {
        let registration = TableRegistration {
            namespace: "sales".to_string(),
            table: "orders".to_string(),
            location: "s3://clean-zone/sales/orders/".to_string(),
            columns: vec![
                ("id".to_string(), ColumnType::Integer),
                ("order_date".to_string(), ColumnType::Timestamp),
                ("year".to_string(), ColumnType::Integer),
            ],
            partition_columns: vec!["year".to_string()],
        };

        let creation = table_creation(&registration).unwrap();
        assert_eq!(creation.name, "orders");
        assert_eq!(creation.location.as_deref(), Some("s3://clean-zone/sales/orders"));
        assert_eq!(creation.schema.as_struct().fields().len(), 3);
        let spec = creation.partition_spec.unwrap();
        assert_eq!(spec.fields()[0].source_id, 3);

        let mut missing = registration.clone();
        missing.partition_columns = vec!["day".to_string()];
        assert!(table_creation(&missing).is_err());
    }

    #[test]
    fn test_catalog_config_serialize_s3_tables() {
        let config = CatalogConfig::S3Tables {
            arn: "arn:aws:s3tables:us-east-1:123456789:bucket/clean-zone".to_string(),
            region: "us-east-1".to_string(),
            profile: Some("default".to_string()),
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("s3_tables"));
        assert!(json.contains("arn:aws:s3tables"));
    }
}
