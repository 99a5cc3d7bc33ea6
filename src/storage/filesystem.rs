//! Local filesystem object store
//!
//! Object URIs are mapped under a root directory: `s3://bucket/key` becomes
//! `<root>/bucket/key`, `file:///x/y` becomes `<root>/x/y`, and plain relative
//! paths are joined to the root unchanged.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use super::codec;
use super::{ObjectMetadata, ObjectStore, StorageError, StorageResult, WriteResult};
use crate::ingest::StorageLocator;
use crate::models::{CompressionCodec, Dataset, PartitionSpec, WriteMode};

#[derive(Debug, Clone)]
pub struct FileSystemObjectStore {
    root: PathBuf,
}

impl FileSystemObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object URI to a path under the root
    pub fn resolve(&self, uri: &str) -> StorageResult<PathBuf> {
        let relative = uri
            .strip_prefix("s3://")
            .or_else(|| uri.strip_prefix("file://"))
            .unwrap_or(uri)
            .trim_start_matches('/');

        if relative.split('/').any(|segment| segment == "..") {
            return Err(StorageError::InvalidPath(uri.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    if source.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.display().to_string())
    } else {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

async fn remove_dir_if_exists(dir: &Path) -> StorageResult<bool> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_error(dir, e)),
    }
}

#[async_trait]
impl ObjectStore for FileSystemObjectStore {
    async fn head_metadata(&self, locator: &StorageLocator) -> StorageResult<ObjectMetadata> {
        let path = self.resolve(&locator.source_uri())?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok(ObjectMetadata {
            size_bytes: metadata.len(),
        })
    }

    async fn read_tabular(&self, uri: &str) -> StorageResult<Dataset> {
        let path = self.resolve(uri)?;
        debug!(path = %path.display(), "Reading tabular object");

        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        codec::decode(uri, Bytes::from(data))
    }

    async fn write_columnar(
        &self,
        dataset: &Dataset,
        uri: &str,
        spec: &PartitionSpec,
        compression: CompressionCodec,
    ) -> StorageResult<WriteResult> {
        let table_dir = self.resolve(uri)?;
        let parts = codec::encode_parts(dataset, spec, compression)?;

        if spec.mode == WriteMode::Overwrite {
            if spec.is_partitioned() {
                for dir in parts.iter().filter_map(|p| p.partition_dir.as_deref()) {
                    if remove_dir_if_exists(&table_dir.join(dir)).await? {
                        debug!(partition = dir, "Cleared partition for overwrite");
                    }
                }
            } else if remove_dir_if_exists(&table_dir).await? {
                debug!(path = %table_dir.display(), "Cleared table directory for overwrite");
            }
        }

        for part in &parts {
            let path = table_dir.join(part.relative_path());
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error(parent, e))?;
            }
            tokio::fs::write(&path, &part.data)
                .await
                .map_err(|e| io_error(&path, e))?;
        }

        let result = codec::write_result(&parts);
        info!(
            path = %table_dir.display(),
            rows = result.rows_written,
            files = result.files_written,
            mode = %spec.mode,
            "Wrote columnar dataset"
        );
        Ok(result)
    }
}
