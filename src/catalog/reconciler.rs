//! Ensure a target namespace exists before writing, and register the table
//! after it
//!
//! The check is best effort and idempotent. Listing tells the reconciler
//! whether the namespace is present; any answer other than a connectivity
//! failure leads to a single creation attempt. Creation failures, including conflicts with a
//! concurrent creator, are logged and swallowed because the subsequent write
//! re-verifies existence implicitly. Only a connectivity failure aborts.
//!
//! Table registration runs after the data is written, so none of its failures
//! abort the invocation.

use std::collections::BTreeSet;

use tracing::{error, info, warn};

use super::{Catalog, CatalogEntry, CatalogError, TableRegistration};
use crate::error::{IngestError, IngestResult};

/// Idempotent create-if-absent for catalog namespaces
pub struct CatalogReconciler<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
}

impl<'a, C: Catalog + ?Sized> CatalogReconciler<'a, C> {
    /// Wrap a catalog
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Make sure `namespace` exists, creating it at most once per call.
    ///
    /// Returns the freshly observed entry. Fails only with
    /// [`IngestError::CatalogUnreachable`].
    pub async fn ensure_namespace(&self, namespace: &str) -> IngestResult<CatalogEntry> {
        info!(namespace, "Checking if namespace exists");

        match self.catalog.list_tables(namespace).await {
            Ok(tables) => {
                info!(
                    namespace,
                    table_count = tables.len(),
                    "Namespace exists"
                );
                Ok(CatalogEntry {
                    namespace: namespace.to_string(),
                    existing_table_names: tables,
                    created: false,
                })
            }
            Err(e @ (CatalogError::Unreachable(_) | CatalogError::ConfigError(_))) => {
                error!(namespace, error = %e, "Catalog unreachable");
                Err(IngestError::CatalogUnreachable(e))
            }
            Err(e) => {
                // Any non-connectivity failure is read as "namespace absent"
                info!(namespace, reason = %e, "Namespace does not exist, creating");
                let created = self.try_create(namespace).await;
                Ok(CatalogEntry {
                    namespace: namespace.to_string(),
                    existing_table_names: BTreeSet::new(),
                    created,
                })
            }
        }
    }

    /// Register the table unless `entry` already lists it.
    ///
    /// Returns whether this call registered it.
    pub async fn ensure_table(
        &self,
        entry: &CatalogEntry,
        registration: &TableRegistration,
    ) -> bool {
        if entry.has_table(&registration.table) {
            info!(table = %registration.table, "Table already registered");
            return false;
        }

        match self.catalog.register_table(registration).await {
            Ok(()) => {
                info!(
                    table = %registration.table,
                    location = %registration.location,
                    partitions = ?registration.partition_columns,
                    "Table registered"
                );
                true
            }
            Err(CatalogError::TableAlreadyExists(_)) => {
                info!(
                    table = %registration.table,
                    "Table registered concurrently by another writer"
                );
                false
            }
            Err(e) => {
                warn!(table = %registration.table, error = %e, "Could not register table");
                false
            }
        }
    }

    async fn try_create(&self, namespace: &str) -> bool {
        match self.catalog.create_namespace(namespace).await {
            Ok(()) => {
                info!(namespace, "Namespace created successfully");
                true
            }
            Err(CatalogError::NamespaceAlreadyExists(_)) => {
                info!(namespace, "Namespace created concurrently by another writer");
                false
            }
            Err(e) => {
                // Continue even if creation fails; the write re-verifies existence
                error!(namespace, error = %e, "Error creating namespace");
                false
            }
        }
    }
}
