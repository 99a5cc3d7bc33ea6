//! Enumerations shared across the pipeline

use serde::{Deserialize, Serialize};

/// How written files relate to data already present at the output path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Add new files next to existing ones (default)
    #[default]
    Append,
    /// Replace the data of every partition being written
    Overwrite,
}

impl std::str::FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append" => Ok(WriteMode::Append),
            "overwrite" => Ok(WriteMode::Overwrite),
            _ => Err(format!(
                "Unknown write mode: {}. Use 'append' or 'overwrite'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Append => write!(f, "append"),
            WriteMode::Overwrite => write!(f, "overwrite"),
        }
    }
}

/// Compression codec passed through to the columnar writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// No compression
    None,
    /// Snappy (default)
    #[default]
    Snappy,
    /// Gzip
    Gzip,
    /// Zstandard
    Zstd,
    /// LZ4 (raw)
    Lz4,
}

impl CompressionCodec {
    /// File name infix used for written parts, e.g. `part-<id>.snappy.parquet`
    pub fn file_infix(self) -> Option<&'static str> {
        match self {
            CompressionCodec::None => None,
            CompressionCodec::Snappy => Some("snappy"),
            CompressionCodec::Gzip => Some("gz"),
            CompressionCodec::Zstd => Some("zstd"),
            CompressionCodec::Lz4 => Some("lz4"),
        }
    }
}

impl std::str::FromStr for CompressionCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "uncompressed" => Ok(CompressionCodec::None),
            "snappy" => Ok(CompressionCodec::Snappy),
            "gzip" | "gz" => Ok(CompressionCodec::Gzip),
            "zstd" => Ok(CompressionCodec::Zstd),
            "lz4" => Ok(CompressionCodec::Lz4),
            _ => Err(format!("Unknown compression codec: {}", s)),
        }
    }
}

impl std::fmt::Display for CompressionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionCodec::None => write!(f, "none"),
            CompressionCodec::Snappy => write!(f, "snappy"),
            CompressionCodec::Gzip => write!(f, "gzip"),
            CompressionCodec::Zstd => write!(f, "zstd"),
            CompressionCodec::Lz4 => write!(f, "lz4"),
        }
    }
}

/// How finely date-partitioned output is split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionGranularity {
    /// `year=`
    Year,
    /// `year=/month=`
    Month,
    /// `year=/month=/day=` (default)
    #[default]
    Day,
}

impl PartitionGranularity {
    /// Partition column names, coarsest first
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            PartitionGranularity::Year => &["year"],
            PartitionGranularity::Month => &["year", "month"],
            PartitionGranularity::Day => &["year", "month", "day"],
        }
    }
}

impl std::str::FromStr for PartitionGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "year" => Ok(PartitionGranularity::Year),
            "month" => Ok(PartitionGranularity::Month),
            "day" => Ok(PartitionGranularity::Day),
            _ => Err(format!("Unknown partition granularity: {}", s)),
        }
    }
}

/// What the orchestrator does with rows whose partition coordinates are invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRowPolicy {
    /// Write them under the default partition (default)
    #[default]
    Keep,
    /// Leave them out of the write
    Drop,
}

impl std::str::FromStr for InvalidRowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep" => Ok(InvalidRowPolicy::Keep),
            "drop" => Ok(InvalidRowPolicy::Drop),
            _ => Err(format!("Unknown invalid row policy: {}", s)),
        }
    }
}
