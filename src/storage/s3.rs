//! Amazon S3 object store
//!
//! Paths are full `s3://bucket/key` URIs; one client serves every bucket.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info, instrument};

use super::codec;
use super::{ObjectMetadata, ObjectStore, StorageError, StorageResult, WriteResult};
use crate::ingest::StorageLocator;
use crate::models::{CompressionCodec, Dataset, PartitionSpec, WriteMode};

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS environment (region, credentials)
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }

    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> StorageResult<usize> {
        let mut deleted = 0;
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;

            for key in response.contents().iter().filter_map(|o| o.key()) {
                self.client
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;
                deleted += 1;
            }

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(deleted)
    }
}

/// Split `s3://bucket/key` into bucket and key
pub fn parse_uri(uri: &str) -> StorageResult<(&str, &str)> {
    let rest = uri
        .strip_prefix("s3://")
        .ok_or_else(|| StorageError::InvalidPath(uri.to_string()))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() => Ok((bucket, key)),
        None if !rest.is_empty() => Ok((rest, "")),
        _ => Err(StorageError::InvalidPath(uri.to_string())),
    }
}

fn join_key(prefix: &str, relative: &str) -> String {
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), relative)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, locator), fields(key = locator.raw_path()))]
    async fn head_metadata(&self, locator: &StorageLocator) -> StorageResult<ObjectMetadata> {
        let uri = locator.source_uri();
        let (bucket, key) = parse_uri(&uri)?;

        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_not_found() => StorageError::NotFound(uri.clone()),
                _ => StorageError::Backend(DisplayErrorContext(&e).to_string()),
            })?;

        Ok(ObjectMetadata {
            size_bytes: response.content_length().unwrap_or(0).max(0) as u64,
        })
    }

    #[instrument(skip(self))]
    async fn read_tabular(&self, uri: &str) -> StorageResult<Dataset> {
        let (bucket, key) = parse_uri(uri)?;
        debug!(bucket, key, "Downloading object");

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_key() => StorageError::NotFound(uri.to_string()),
                _ => StorageError::Backend(DisplayErrorContext(&e).to_string()),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .into_bytes();

        codec::decode(uri, data)
    }

    #[instrument(skip(self, dataset, spec), fields(rows = dataset.row_count()))]
    async fn write_columnar(
        &self,
        dataset: &Dataset,
        uri: &str,
        spec: &PartitionSpec,
        compression: CompressionCodec,
    ) -> StorageResult<WriteResult> {
        let (bucket, table_prefix) = parse_uri(uri)?;
        let parts = codec::encode_parts(dataset, spec, compression)?;

        if spec.mode == WriteMode::Overwrite {
            if spec.is_partitioned() {
                for dir in parts.iter().filter_map(|p| p.partition_dir.as_deref()) {
                    let prefix = join_key(table_prefix, &format!("{}/", dir));
                    let deleted = self.delete_prefix(bucket, &prefix).await?;
                    debug!(prefix = %prefix, deleted, "Cleared partition for overwrite");
                }
            } else {
                let prefix = join_key(table_prefix, "");
                let deleted = self.delete_prefix(bucket, &prefix).await?;
                debug!(prefix = %prefix, deleted, "Cleared table prefix for overwrite");
            }
        }

        for part in &parts {
            let key = join_key(table_prefix, &part.relative_path());
            self.client
                .put_object()
                .bucket(bucket)
                .key(&key)
                .body(ByteStream::from(part.data.clone()))
                .send()
                .await
                .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;
        }

        let result = codec::write_result(&parts);
        info!(
            bucket,
            prefix = table_prefix,
            rows = result.rows_written,
            files = result.files_written,
            mode = %spec.mode,
            "Wrote columnar dataset"
        );
        Ok(result)
    }
}
