//! Namespace and table resolution from object keys
//!
//! Keys follow `[<prefix>/]…/<namespace>/<table>/<file>`: the namespace is the
//! third segment from the end and the table the second, whatever comes before.

use serde::Serialize;
use tracing::debug;

use crate::error::{IngestError, IngestResult};

/// Extension removed from the table segment of columnar sources
const COLUMNAR_SUFFIX: &str = ".parquet";

/// Where a triggering object lives and which dataset it feeds
///
/// Only built by [`PathMetadataExtractor::extract`], so namespace and table
/// are always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLocator {
    bucket: Option<String>,
    namespace: String,
    table: String,
    raw_path: String,
}

impl StorageLocator {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The decoded object key the locator was extracted from
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Attach the bucket (or container) the key belongs to
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Full URI of the source object, `s3://bucket/key` when the bucket is known
    pub fn source_uri(&self) -> String {
        match &self.bucket {
            Some(bucket) => format!("s3://{}/{}", bucket, self.raw_path),
            None => self.raw_path.clone(),
        }
    }
}

/// Derives a [`StorageLocator`] from an object key
#[derive(Debug, Clone, Default)]
pub struct PathMetadataExtractor {
    source_prefix: Option<String>,
}

impl PathMetadataExtractor {
    /// `source_prefix` is a leading segment naming the ingestion stage, removed
    /// before the segments are counted
    pub fn new(source_prefix: Option<String>) -> Self {
        Self {
            source_prefix: source_prefix.filter(|p| !p.trim_matches('/').is_empty()),
        }
    }

    pub fn extract(&self, raw_path: &str) -> IngestResult<StorageLocator> {
        let mut segments: Vec<&str> = raw_path.split('/').filter(|s| !s.is_empty()).collect();

        if let Some(prefix) = &self.source_prefix
            && segments.first() == Some(&prefix.trim_matches('/'))
        {
            segments.remove(0);
        }

        let malformed = || IngestError::MalformedPath {
            path: raw_path.to_string(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
        };

        if segments.len() < 3 {
            return Err(malformed());
        }

        let namespace = segments[segments.len() - 3];
        let table_segment = segments[segments.len() - 2];
        let table = table_segment
            .strip_suffix(COLUMNAR_SUFFIX)
            .unwrap_or(table_segment);

        if table.is_empty() {
            return Err(malformed());
        }

        debug!(namespace, table, key = raw_path, "Extracted storage locator");

        Ok(StorageLocator {
            bucket: None,
            namespace: namespace.to_string(),
            table: table.to_string(),
            raw_path: raw_path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_key() {
        let locator = PathMetadataExtractor::default()
            .extract("raw/sales/orders/2024-03-07.csv")
            .unwrap();
        assert_eq!(locator.namespace(), "sales");
        assert_eq!(locator.table(), "orders");
        assert_eq!(locator.raw_path(), "raw/sales/orders/2024-03-07.csv");
        assert_eq!(locator.source_uri(), "raw/sales/orders/2024-03-07.csv");
    }

    #[test]
    fn test_leading_segments_do_not_matter() {
        let extractor = PathMetadataExtractor::default();
        let short = extractor.extract("sales/orders/f.csv").unwrap();
        for key in [
            "raw/sales/orders/f.csv",
            "a/b/c/d/sales/orders/f.csv",
            "/landing//raw/sales/orders/f.csv",
        ] {
            let locator = extractor.extract(key).unwrap();
            assert_eq!(locator.namespace(), short.namespace(), "key {}", key);
            assert_eq!(locator.table(), short.table(), "key {}", key);
        }
    }

    #[test]
    fn test_too_few_segments() {
        let extractor = PathMetadataExtractor::default();
        for key in ["a/b.csv", "b.csv", "", "/a//b.csv/"] {
            assert!(
                matches!(extractor.extract(key), Err(IngestError::MalformedPath { .. })),
                "key {:?}",
                key
            );
        }
    }

    #[test]
    fn test_prefix_counts_against_minimum() {
        let extractor = PathMetadataExtractor::new(Some("non-partitioned-folder".to_string()));

        // Three segments, but one of them is the stage prefix
        let err = extractor
            .extract("non-partitioned-folder/orders/part-0.parquet")
            .unwrap_err();
        match err {
            IngestError::MalformedPath { segments, .. } => {
                assert_eq!(segments, vec!["orders", "part-0.parquet"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let locator = extractor
            .extract("non-partitioned-folder/sales/orders/part-0.parquet")
            .unwrap();
        assert_eq!(locator.namespace(), "sales");
    }

    #[test]
    fn test_prefix_only_stripped_when_leading() {
        let extractor = PathMetadataExtractor::new(Some("raw".to_string()));
        let locator = extractor.extract("sales/raw/orders/x.csv").unwrap();
        assert_eq!(locator.namespace(), "raw");
        assert_eq!(locator.table(), "orders");
    }

    #[test]
    fn test_columnar_suffix_stripped_from_table() {
        let locator = PathMetadataExtractor::default()
            .extract("staging/sales/orders.parquet/part-00000.snappy.parquet")
            .unwrap();
        assert_eq!(locator.table(), "orders");

        assert!(
            PathMetadataExtractor::default()
                .extract("sales/.parquet/part.parquet")
                .is_err()
        );
    }

    #[test]
    fn test_source_uri_with_bucket() {
        let locator = PathMetadataExtractor::default()
            .extract("raw/sales/orders/x.csv")
            .unwrap()
            .with_bucket("landing");
        assert_eq!(locator.bucket(), Some("landing"));
        assert_eq!(locator.source_uri(), "s3://landing/raw/sales/orders/x.csv");
    }
}
