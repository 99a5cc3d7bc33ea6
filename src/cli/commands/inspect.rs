//! Commands that run single inference steps

use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;

use crate::inference::{DateCandidate, DateColumnDetector};
use crate::ingest::PathMetadataExtractor;
use crate::pipeline::decode_object_key;
use crate::storage::codec;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyReport<'a> {
    decoded_key: &'a str,
    namespace: &'a str,
    table: &'a str,
}

/// Resolve namespace and table from an object key
pub fn handle_key(key: &str, prefix: Option<String>) -> Result<()> {
    let decoded = decode_object_key(key)?;
    let locator = PathMetadataExtractor::new(prefix).extract(&decoded)?;
    super::print_json(
        &KeyReport {
            decoded_key: &decoded,
            namespace: locator.namespace(),
            table: locator.table(),
        },
        true,
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectReport {
    rows: usize,
    columns: Vec<String>,
    candidates: Vec<DateCandidate>,
}

/// Load a local CSV or Parquet file and list date column candidates
pub fn handle_detect(file: PathBuf, min_parse_ratio: f64) -> Result<()> {
    let data = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let path = file.display().to_string();
    let dataset = codec::decode(&path, Bytes::from(data))?;

    let report = DetectReport {
        rows: dataset.row_count(),
        columns: dataset.column_names().into_iter().map(String::from).collect(),
        candidates: DateColumnDetector::new(min_parse_ratio).detect(&dataset),
    };
    super::print_json(&report, true)
}
