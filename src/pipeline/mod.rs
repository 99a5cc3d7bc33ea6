//! Ingestion orchestration
//!
//! One record runs through resolve path → load → pick date column → normalize
//! → derive partitions → reconcile catalog → write → register table. Every
//! step is sequential and any error fails the record unmodified; there are no
//! retries here. Table registration comes after the write and never fails the
//! record.
//!
//! # Example
//!
//! ```ignore
//! use lakehouse_ingest::catalog::MemoryCatalog;
//! use lakehouse_ingest::config::IngestConfig;
//! use lakehouse_ingest::pipeline::{IngestionPipeline, TriggerEvent};
//! use lakehouse_ingest::storage::FileSystemObjectStore;
//!
//! let pipeline = IngestionPipeline::new(
//!     FileSystemObjectStore::new("/data"),
//!     MemoryCatalog::new(),
//!     IngestConfig::default(),
//! );
//! let result = pipeline
//!     .handle_event(&TriggerEvent::single("landing", "raw/sales/orders/2024-03-07.csv"))
//!     .await?;
//! ```

use tracing::{Instrument, debug, error, info, warn};

use crate::catalog::{Catalog, CatalogReconciler, TableRegistration};
use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::inference::{DateColumnDetector, DateNormalizer, NormalizationReport};
use crate::ingest::{PathMetadataExtractor, StorageLocator};
use crate::models::{Dataset, InvalidRowPolicy, PartitionSpec};
use crate::partition::{InvalidPartitionRow, PartitionKeyDeriver};
use crate::storage::ObjectStore;

pub mod event;
pub mod result;
pub mod state;

pub use event::{TriggerEvent, TriggerRecord, decode_object_key};
pub use result::{EventResult, FailureReport, IngestionResult, IngestionStatus};
pub use state::{InvocationContext, PipelineState};

/// Date-related outcome of the partitioning steps
#[derive(Debug, Default)]
struct DatePartitioning {
    column: Option<String>,
    candidates: Vec<String>,
    normalization: Option<NormalizationReport>,
    invalid_rows: Vec<InvalidPartitionRow>,
    rows_dropped: usize,
}

/// Processes trigger events against injected storage and catalog
pub struct IngestionPipeline<S, C> {
    store: S,
    catalog: C,
    config: IngestConfig,
    extractor: PathMetadataExtractor,
    detector: DateColumnDetector,
    normalizer: DateNormalizer,
    deriver: PartitionKeyDeriver,
}

impl<S: ObjectStore, C: Catalog> IngestionPipeline<S, C> {
    pub fn new(store: S, catalog: C, config: IngestConfig) -> Self {
        Self {
            extractor: PathMetadataExtractor::new(config.source.prefix_to_strip.clone()),
            detector: DateColumnDetector::new(config.partitioning.min_sample_parse_ratio),
            normalizer: DateNormalizer::new(),
            deriver: PartitionKeyDeriver::new(config.partitioning.granularity),
            store,
            catalog,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Process every record of the event in order.
    ///
    /// The first failing record fails the whole event; no partial result is
    /// returned.
    pub async fn handle_event(&self, event: &TriggerEvent) -> IngestResult<EventResult> {
        if event.records.is_empty() {
            return Err(IngestError::InvalidEvent(
                "Event contains no records".to_string(),
            ));
        }

        let mut results = Vec::with_capacity(event.records.len());
        for record in &event.records {
            results.push(self.process_record(record).await?);
        }
        Ok(EventResult { results })
    }

    /// Process a single record inside its own invocation span
    pub async fn process_record(&self, record: &TriggerRecord) -> IngestResult<IngestionResult> {
        let key = record.decoded_key()?;
        let mut context = InvocationContext::new(key.clone());
        let span = context.span().clone();

        let outcome = self
            .run(&mut context, &record.bucket, &key)
            .instrument(span.clone())
            .await;

        if let Err(e) = &outcome {
            span.in_scope(|| {
                error!(
                    kind = e.kind(),
                    error = %e,
                    state = %context.state(),
                    "Ingestion failed"
                )
            });
            context.transition(PipelineState::Failed);
        }
        outcome
    }

    async fn run(
        &self,
        context: &mut InvocationContext,
        bucket: &str,
        key: &str,
    ) -> IngestResult<IngestionResult> {
        info!(bucket, key, "Processing object");

        let mut locator = self.extractor.extract(key)?;
        if !bucket.is_empty() {
            locator = locator.with_bucket(bucket);
        }
        context.transition(PipelineState::PathResolved);

        self.check_size(&locator).await;

        let source = locator.source_uri();
        let mut dataset = self
            .store
            .read_tabular(&source)
            .await
            .map_err(|e| IngestError::Load {
                path: source.clone(),
                source: e,
            })?;
        let rows_processed = dataset.row_count();
        info!(
            rows = rows_processed,
            columns = ?dataset.column_names(),
            "Data loaded"
        );
        context.transition(PipelineState::DataLoaded);

        let mode = self.config.output.write_mode;
        let (spec, dates) = if self.config.partitioning.enabled {
            let dates = self.partition_by_date(context, &mut dataset)?;
            (self.deriver.spec(mode), dates)
        } else {
            debug!("Partitioning disabled, writing un-partitioned");
            (PartitionSpec::unpartitioned(mode), DatePartitioning::default())
        };

        let reconciler = CatalogReconciler::new(&self.catalog);
        let entry = reconciler.ensure_namespace(locator.namespace()).await?;
        context.transition(PipelineState::CatalogReady);

        let output_path = self
            .config
            .output_path(locator.namespace(), locator.table());
        info!(
            output_path = %output_path,
            mode = %mode,
            compression = %self.config.output.compression,
            partitions = ?spec.partition_columns,
            "Writing dataset"
        );
        let write = self
            .store
            .write_columnar(&dataset, &output_path, &spec, self.config.output.compression)
            .await
            .map_err(|e| IngestError::Write {
                path: output_path.clone(),
                source: e,
            })?;
        context.transition(PipelineState::Written);

        let registration = TableRegistration::new(
            locator.namespace(),
            locator.table(),
            output_path.as_str(),
            &dataset,
            &spec,
        );
        let table_registered = reconciler.ensure_table(&entry, &registration).await;

        let result = IngestionResult {
            status: IngestionStatus::Success,
            invocation_id: context.invocation_id(),
            namespace: locator.namespace().to_string(),
            table: locator.table().to_string(),
            rows_processed,
            output_path,
            date_column_used: dates.column,
            date_candidates_considered: dates.candidates,
            normalization: dates.normalization,
            invalid_partition_rows: dates.invalid_rows,
            rows_dropped: dates.rows_dropped,
            namespace_created: entry.created,
            table_registered,
            write,
        };
        context.transition(PipelineState::Done);

        info!(
            rows = result.rows_processed,
            files = result.write.files_written,
            invalid_rows = result.invalid_partition_rows.len(),
            "Data successfully processed"
        );
        Ok(result)
    }

    /// Size check before loading; a failed head request is only logged
    async fn check_size(&self, locator: &StorageLocator) {
        let threshold = self.config.source.large_file_warn_bytes;
        match self.store.head_metadata(locator).await {
            Ok(meta) if meta.size_bytes > threshold => warn!(
                size_bytes = meta.size_bytes,
                threshold,
                "Large source object, processing may be slow"
            ),
            Ok(meta) => debug!(size_bytes = meta.size_bytes, "Source object size"),
            Err(e) => warn!(error = %e, "Could not read source object metadata"),
        }
    }

    fn partition_by_date(
        &self,
        context: &mut InvocationContext,
        dataset: &mut Dataset,
    ) -> IngestResult<DatePartitioning> {
        let (column, candidates) = match &self.config.source.date_column {
            Some(column) => {
                info!(column = %column, "Using configured date column");
                (column.clone(), Vec::new())
            }
            None => {
                let candidates = self.detector.detect(dataset);
                let Some(chosen) = candidates.first() else {
                    return Err(IngestError::NoDateColumn);
                };
                if candidates.len() > 1 {
                    warn!(
                        chosen = %chosen.column_name,
                        candidates = ?candidates.iter().map(|c| &c.column_name).collect::<Vec<_>>(),
                        "Multiple date columns detected, using the first"
                    );
                } else {
                    info!(column = %chosen.column_name, method = ?chosen.method, "Date column detected");
                }
                (
                    chosen.column_name.clone(),
                    candidates.into_iter().map(|c| c.column_name).collect(),
                )
            }
        };
        context.transition(PipelineState::DateResolved);

        let normalization = self.normalizer.normalize(dataset, &column)?;
        context.transition(PipelineState::Normalized);

        let report = self.deriver.derive(dataset, &column)?;
        context.transition(PipelineState::PartitionsDerived);

        let mut rows_dropped = 0;
        if self.config.partitioning.invalid_rows == InvalidRowPolicy::Drop
            && !report.invalid_rows.is_empty()
        {
            let before = dataset.row_count();
            dataset.retain_rows(|row| !report.is_invalid(row));
            rows_dropped = before - dataset.row_count();
            warn!(rows_dropped, "Dropped rows without a valid date");
        }

        Ok(DatePartitioning {
            column: Some(column),
            candidates,
            normalization: Some(normalization),
            invalid_rows: report.invalid_rows,
            rows_dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::models::{Column, ColumnType, CompressionCodec, Value};
    use crate::storage::{ObjectMetadata, StorageError, StorageResult, WriteResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves fixed datasets and records writes
    #[derive(Default)]
    struct RecordingStore {
        objects: HashMap<String, Dataset>,
        writes: Mutex<Vec<(String, PartitionSpec, Dataset)>>,
        fail_writes: bool,
    }

    impl RecordingStore {
        fn with(uri: &str, dataset: Dataset) -> Self {
            let mut store = Self::default();
            store.objects.insert(uri.to_string(), dataset);
            store
        }

        fn writes(&self) -> Vec<(String, PartitionSpec, Dataset)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn head_metadata(&self, _locator: &StorageLocator) -> StorageResult<ObjectMetadata> {
            Err(StorageError::Backend("head not supported".to_string()))
        }

        async fn read_tabular(&self, path: &str) -> StorageResult<Dataset> {
            self.objects
                .get(path)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(path.to_string()))
        }

        async fn write_columnar(
            &self,
            dataset: &Dataset,
            path: &str,
            spec: &PartitionSpec,
            _compression: CompressionCodec,
        ) -> StorageResult<WriteResult> {
            if self.fail_writes {
                return Err(StorageError::Backend("disk full".to_string()));
            }
            self.writes
                .lock()
                .unwrap()
                .push((path.to_string(), spec.clone(), dataset.clone()));
            Ok(WriteResult {
                rows_written: dataset.row_count(),
                files_written: 1,
                partitions_written: Vec::new(),
            })
        }
    }

    fn orders() -> Dataset {
        Dataset::new(vec![
            Column::text("id", &["1", "2", "3"]),
            Column::text("order_date", &["2024-03-07", "not a date", "2024-03-08"]),
            Column::text("shipped", &["2024-03-09", "2024-03-10", "2024-03-11"]),
        ])
        .unwrap()
    }

    const URI: &str = "s3://landing/raw/sales/orders/2024-03-07.csv";

    fn pipeline(store: RecordingStore, config: IngestConfig) -> IngestionPipeline<RecordingStore, MemoryCatalog> {
        IngestionPipeline::new(store, MemoryCatalog::new(), config)
    }

    #[tokio::test]
    async fn test_detected_column_and_candidates() {
        let p = pipeline(RecordingStore::with(URI, orders()), IngestConfig::default());
        let result = p
            .process_record(&TriggerRecord::new("landing", "raw/sales/orders/2024-03-07.csv"))
            .await
            .unwrap();

        assert_eq!(result.date_column_used.as_deref(), Some("order_date"));
        assert_eq!(result.date_candidates_considered, vec!["order_date", "shipped"]);
        assert_eq!(result.rows_processed, 3);
        assert_eq!(result.invalid_partition_rows.len(), 1);
        assert_eq!(result.output_path, "s3://clean-zone/sales/orders/");
        assert!(result.namespace_created);
        assert!(result.table_registered);

        let writes = p.store().writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1.partition_columns, vec!["year", "month", "day"]);
        assert_eq!(
            writes[0].2.column("order_date").unwrap().column_type,
            ColumnType::Timestamp
        );
    }

    #[tokio::test]
    async fn test_explicit_column_skips_detection() {
        let mut config = IngestConfig::default();
        config.source.date_column = Some("shipped".to_string());
        let p = pipeline(RecordingStore::with(URI, orders()), config);

        let result = p
            .process_record(&TriggerRecord::new("landing", "raw/sales/orders/2024-03-07.csv"))
            .await
            .unwrap();
        assert_eq!(result.date_column_used.as_deref(), Some("shipped"));
        assert!(result.date_candidates_considered.is_empty());
        assert!(result.invalid_partition_rows.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_column_missing() {
        let mut config = IngestConfig::default();
        config.source.date_column = Some("created".to_string());
        let p = pipeline(RecordingStore::with(URI, orders()), config);

        let err = p
            .process_record(&TriggerRecord::new("landing", "raw/sales/orders/2024-03-07.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::DateColumnNotFound { .. }));
        assert!(p.store().writes().is_empty());
    }

    #[tokio::test]
    async fn test_no_date_column() {
        let ds = Dataset::new(vec![Column::text("name", &["a", "b"])]).unwrap();
        let p = pipeline(RecordingStore::with(URI, ds), IngestConfig::default());

        let err = p
            .process_record(&TriggerRecord::new("landing", "raw/sales/orders/2024-03-07.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NoDateColumn));
        // Catalog is only touched after the date steps
        assert_eq!(p.catalog().create_attempts(), 0);
    }

    #[tokio::test]
    async fn test_unpartitioned_needs_no_date() {
        let ds = Dataset::new(vec![Column::text("name", &["a", "b"])]).unwrap();
        let mut config = IngestConfig::default();
        config.partitioning.enabled = false;
        let p = pipeline(RecordingStore::with(URI, ds), config);

        let result = p
            .process_record(&TriggerRecord::new("landing", "raw/sales/orders/2024-03-07.csv"))
            .await
            .unwrap();
        assert_eq!(result.date_column_used, None);
        assert!(result.normalization.is_none());
        assert!(!p.store().writes()[0].1.is_partitioned());
    }

    #[tokio::test]
    async fn test_drop_policy_removes_invalid_rows() {
        let mut config = IngestConfig::default();
        config.partitioning.invalid_rows = InvalidRowPolicy::Drop;
        let p = pipeline(RecordingStore::with(URI, orders()), config);

        let result = p
            .process_record(&TriggerRecord::new("landing", "raw/sales/orders/2024-03-07.csv"))
            .await
            .unwrap();
        assert_eq!(result.rows_processed, 3);
        assert_eq!(result.rows_dropped, 1);
        assert_eq!(result.write.rows_written, 2);
        assert_eq!(
            p.store().writes()[0].2.column("id").unwrap().values,
            vec![Value::Text("1".to_string()), Value::Text("3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_date_column_colliding_with_partition_fails_before_catalog() {
        let ds = Dataset::new(vec![
            Column::text("id", &["1"]),
            Column::text("year", &["2024-03-07"]),
        ])
        .unwrap();
        let mut config = IngestConfig::default();
        config.source.date_column = Some("year".to_string());
        let p = pipeline(RecordingStore::with(URI, ds), config);

        let err = p
            .process_record(&TriggerRecord::new("landing", "raw/sales/orders/2024-03-07.csv"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "PartitionColumnConflictError");
        assert_eq!(p.catalog().create_attempts(), 0);
        assert!(p.store().writes().is_empty());
    }

    #[tokio::test]
    async fn test_load_failure() {
        let p = pipeline(RecordingStore::default(), IngestConfig::default());
        let err = p
            .process_record(&TriggerRecord::new("landing", "raw/sales/orders/missing.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Load { .. }));
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let mut store = RecordingStore::with(URI, orders());
        store.fail_writes = true;
        let p = pipeline(store, IngestConfig::default());

        let err = p
            .process_record(&TriggerRecord::new("landing", "raw/sales/orders/2024-03-07.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Write { .. }));
        assert_eq!(err.kind(), "WriteError");
        // Nothing registered for a table without data
        assert!(p.catalog().registrations().is_empty());
    }

    #[tokio::test]
    async fn test_empty_event_rejected() {
        let p = pipeline(RecordingStore::default(), IngestConfig::default());
        assert!(matches!(
            p.handle_event(&TriggerEvent::default()).await,
            Err(IngestError::InvalidEvent(_))
        ));
    }

    #[tokio::test]
    async fn test_first_failure_fails_event() {
        let p = pipeline(RecordingStore::with(URI, orders()), IngestConfig::default());
        let event = TriggerEvent::new(vec![
            TriggerRecord::new("landing", "a/b.csv"),
            TriggerRecord::new("landing", "raw/sales/orders/2024-03-07.csv"),
        ]);

        let err = p.handle_event(&event).await.unwrap_err();
        assert!(matches!(err, IngestError::MalformedPath { .. }));
        assert!(p.store().writes().is_empty());
    }
}
