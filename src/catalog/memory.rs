//! In-process catalog
//!
//! Backs local runs of the CLI and the test suite. Namespace creation is
//! create-if-absent at the storage level but still reports
//! [`CatalogError::NamespaceAlreadyExists`], like real catalogs do, so callers
//! exercise their conflict handling. Table registration behaves the same way
//! with [`CatalogError::TableAlreadyExists`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Catalog, CatalogError, CatalogResult, TableRegistration};

/// Catalog held in memory
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    namespaces: Mutex<BTreeMap<String, BTreeSet<String>>>,
    registrations: Mutex<Vec<TableRegistration>>,
    unreachable: AtomicBool,
    reject_creates: AtomicBool,
    create_attempts: AtomicUsize,
}

impl MemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog pre-populated with a namespace and its tables
    pub fn with_namespace<I, S>(namespace: &str, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let catalog = Self::new();
        catalog.insert_namespace(namespace, tables);
        catalog
    }

    /// Insert a namespace directly, bypassing the trait
    pub fn insert_namespace<I, S>(&self, namespace: &str, tables: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut namespaces = self.lock();
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .extend(tables.into_iter().map(Into::into));
    }

    /// Simulate a connectivity outage for every subsequent call
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make every subsequent namespace creation fail with a generic error
    pub fn set_reject_creates(&self, reject: bool) {
        self.reject_creates.store(reject, Ordering::SeqCst);
    }

    /// Whether the namespace exists
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.lock().contains_key(namespace)
    }

    /// Tables registered through the trait, in call order
    pub fn registrations(&self) -> Vec<TableRegistration> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of `create_namespace` calls received so far
    pub fn create_attempts(&self) -> usize {
        self.create_attempts.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, BTreeSet<String>>> {
        // A poisoned map is still structurally valid
        self.namespaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_reachable(&self) -> CatalogResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unreachable(
                "memory catalog marked unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_tables(&self, namespace: &str) -> CatalogResult<BTreeSet<String>> {
        self.check_reachable()?;
        self.lock()
            .get(namespace)
            .cloned()
            .ok_or_else(|| CatalogError::NamespaceNotFound(namespace.to_string()))
    }

    async fn create_namespace(&self, namespace: &str) -> CatalogResult<()> {
        self.create_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if self.reject_creates.load(Ordering::SeqCst) {
            return Err(CatalogError::Other(format!(
                "creation of namespace {} rejected",
                namespace
            )));
        }

        let mut namespaces = self.lock();
        if namespaces.contains_key(namespace) {
            return Err(CatalogError::NamespaceAlreadyExists(namespace.to_string()));
        }
        namespaces.insert(namespace.to_string(), BTreeSet::new());
        Ok(())
    }

    async fn register_table(&self, registration: &TableRegistration) -> CatalogResult<()> {
        self.check_reachable()?;

        let mut namespaces = self.lock();
        let tables = namespaces
            .get_mut(&registration.namespace)
            .ok_or_else(|| CatalogError::NamespaceNotFound(registration.namespace.clone()))?;
        if !tables.insert(registration.table.clone()) {
            return Err(CatalogError::TableAlreadyExists(format!(
                "{}.{}",
                registration.namespace, registration.table
            )));
        }
        drop(namespaces);

        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(registration.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_missing_namespace() {
        let catalog = MemoryCatalog::new();
        let err = catalog.list_tables("sales").await.unwrap_err();
        assert_eq!(err, CatalogError::NamespaceNotFound("sales".to_string()));
    }

    fn orders_table() -> TableRegistration {
        TableRegistration {
            namespace: "sales".to_string(),
            table: "orders".to_string(),
            location: "s3://clean-zone/sales/orders/".to_string(),
            columns: Vec::new(),
            partition_columns: vec!["year".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let catalog = MemoryCatalog::new();
        catalog.create_namespace("sales").await.unwrap();
        catalog.register_table(&orders_table()).await.unwrap();

        let tables = catalog.list_tables("sales").await.unwrap();
        assert_eq!(tables, BTreeSet::from(["orders".to_string()]));
        assert_eq!(catalog.registrations(), vec![orders_table()]);
    }

    #[tokio::test]
    async fn test_register_table_conflicts() {
        let catalog = MemoryCatalog::with_namespace("sales", ["orders"]);
        assert_eq!(
            catalog.register_table(&orders_table()).await.unwrap_err(),
            CatalogError::TableAlreadyExists("sales.orders".to_string())
        );
        assert!(catalog.registrations().is_empty());

        let empty = MemoryCatalog::new();
        assert_eq!(
            empty.register_table(&orders_table()).await.unwrap_err(),
            CatalogError::NamespaceNotFound("sales".to_string())
        );
    }

    #[tokio::test]
    async fn test_duplicate_create_reports_conflict() {
        let catalog = MemoryCatalog::with_namespace("sales", ["orders"]);
        let err = catalog.create_namespace("sales").await.unwrap_err();
        assert_eq!(
            err,
            CatalogError::NamespaceAlreadyExists("sales".to_string())
        );
        // Existing tables untouched
        assert_eq!(catalog.list_tables("sales").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let catalog = MemoryCatalog::with_namespace("sales", Vec::<String>::new());
        catalog.set_unreachable(true);
        assert!(matches!(
            catalog.list_tables("sales").await,
            Err(CatalogError::Unreachable(_))
        ));
    }
}
