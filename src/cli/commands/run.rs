//! Run command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::catalog::{Catalog, MemoryCatalog};
use crate::config::IngestConfig;
use crate::pipeline::{FailureReport, IngestionPipeline, TriggerEvent};
use crate::storage::{FileSystemObjectStore, ObjectStore};

/// Arguments for the run command
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Event JSON file, or `-` for stdin
    pub event: String,
    /// Explicit config file; `.ingest.toml` in the working directory otherwise
    pub config: Option<PathBuf>,
    /// Directory standing in for the object store
    pub root: Option<PathBuf>,
    /// Iceberg catalog definition (TOML)
    pub catalog: Option<PathBuf>,
    pub pretty: bool,
}

/// Handle the run command
pub async fn handle_run(args: &RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => IngestConfig::load_file(path)?,
        None => IngestConfig::load(&PathBuf::from("."))?,
    };
    let event = TriggerEvent::from_s3_json(&super::load_input(&args.event)?)?;
    info!(records = event.records.len(), "Event loaded");

    match &args.root {
        Some(root) => {
            let store = FileSystemObjectStore::new(root);
            run_with_catalog(store, config, &event, args).await
        }
        None => {
            #[cfg(feature = "s3")]
            {
                let store = crate::storage::S3ObjectStore::from_env().await;
                run_with_catalog(store, config, &event, args).await
            }
            #[cfg(not(feature = "s3"))]
            {
                anyhow::bail!("--root is required when S3 support is not enabled")
            }
        }
    }
}

async fn run_with_catalog<S: ObjectStore>(
    store: S,
    config: IngestConfig,
    event: &TriggerEvent,
    args: &RunArgs,
) -> Result<()> {
    match &args.catalog {
        Some(path) => {
            #[cfg(feature = "iceberg")]
            {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let catalog_config: crate::catalog::CatalogConfig = toml::from_str(&content)
                    .with_context(|| format!("Invalid catalog definition in {}", path.display()))?;
                let catalog = crate::catalog::IcebergCatalog::new(catalog_config).await?;
                run_pipeline(IngestionPipeline::new(store, catalog, config), event, args.pretty)
                    .await
            }
            #[cfg(not(feature = "iceberg"))]
            {
                anyhow::bail!(
                    "Catalog definition {} given but Iceberg support is not enabled",
                    path.display()
                )
            }
        }
        None => {
            info!("No catalog definition given, using an in-memory catalog");
            let pipeline = IngestionPipeline::new(store, MemoryCatalog::new(), config);
            run_pipeline(pipeline, event, args.pretty).await
        }
    }
}

async fn run_pipeline<S: ObjectStore, C: Catalog>(
    pipeline: IngestionPipeline<S, C>,
    event: &TriggerEvent,
    pretty: bool,
) -> Result<()> {
    match pipeline.handle_event(event).await {
        Ok(result) => super::print_json(&result, pretty),
        Err(e) => {
            super::print_json(&FailureReport::from(&e), pretty)?;
            Err(e).context("Ingestion failed")
        }
    }
}
