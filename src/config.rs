//! Pipeline configuration
//!
//! Handles parsing of `.ingest.toml` configuration files and environment
//! variable overrides. Every key is optional; missing keys take defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{IngestError, IngestResult};
use crate::inference::detector::DEFAULT_MIN_PARSE_RATIO;
use crate::models::{CompressionCodec, InvalidRowPolicy, PartitionGranularity, WriteMode};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".ingest.toml";

/// Default size above which a source object triggers a warning (100 MiB)
pub const DEFAULT_LARGE_FILE_WARN_BYTES: u64 = 100 * 1024 * 1024;

/// Default root under which datasets are written
pub const DEFAULT_OUTPUT_ROOT: &str = "s3://clean-zone";

/// Environment variable naming the date column, which disables detection
pub const ENV_DATE_COLUMN: &str = "DATE_COLUMN_NAME";

/// Environment variable for the ingestion-stage prefix segment
pub const ENV_SOURCE_PREFIX: &str = "INGEST_SOURCE_PREFIX";

/// Environment variable for the output root
pub const ENV_OUTPUT_ROOT: &str = "INGEST_OUTPUT_ROOT";

/// Environment variable for the write mode (`append` or `overwrite`)
pub const ENV_WRITE_MODE: &str = "INGEST_WRITE_MODE";

/// Environment variable for the compression codec
pub const ENV_COMPRESSION: &str = "INGEST_COMPRESSION";

/// Environment variable for the large file warning threshold in bytes
pub const ENV_LARGE_FILE_WARN_BYTES: &str = "INGEST_LARGE_FILE_WARN_BYTES";

/// Environment variable switching date partitioning on or off
pub const ENV_PARTITIONING: &str = "INGEST_PARTITIONING";

/// Source object handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Date column to use instead of detection
    #[serde(default)]
    pub date_column: Option<String>,

    /// Leading key segment naming the ingestion stage, stripped before parsing
    #[serde(default)]
    pub prefix_to_strip: Option<String>,

    /// Objects larger than this are logged with a warning
    #[serde(default = "default_large_file_warn_bytes")]
    pub large_file_warn_bytes: u64,
}

fn default_large_file_warn_bytes() -> u64 {
    DEFAULT_LARGE_FILE_WARN_BYTES
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            date_column: None,
            prefix_to_strip: None,
            large_file_warn_bytes: default_large_file_warn_bytes(),
        }
    }
}

/// Output dataset handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Root URI; datasets land in `<root>/<namespace>/<table>/`
    #[serde(default = "default_output_root")]
    pub root: String,

    #[serde(default)]
    pub write_mode: WriteMode,

    #[serde(default)]
    pub compression: CompressionCodec,
}

fn default_output_root() -> String {
    DEFAULT_OUTPUT_ROOT.to_string()
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            write_mode: WriteMode::default(),
            compression: CompressionCodec::default(),
        }
    }
}

/// Date partitioning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitioningSection {
    /// When false, data is written un-partitioned and no date column is needed
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub granularity: PartitionGranularity,

    /// What to do with rows that have no valid date
    #[serde(default)]
    pub invalid_rows: InvalidRowPolicy,

    /// Share of sampled non-null values that must parse for a column to qualify
    #[serde(default = "default_min_parse_ratio")]
    pub min_sample_parse_ratio: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_min_parse_ratio() -> f64 {
    DEFAULT_MIN_PARSE_RATIO
}

impl Default for PartitioningSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            granularity: PartitionGranularity::default(),
            invalid_rows: InvalidRowPolicy::default(),
            min_sample_parse_ratio: default_min_parse_ratio(),
        }
    }
}

/// Main configuration structure
///
/// Represents the `.ingest.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IngestConfig {
    #[serde(default)]
    pub source: SourceSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub partitioning: PartitioningSection,
}

impl IngestConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a directory
    ///
    /// Looks for `.ingest.toml` in the directory, falls back to defaults if
    /// absent, then applies environment overrides.
    pub fn load(dir: &Path) -> IngestResult<Self> {
        let config_path = dir.join(CONFIG_FILENAME);
        if config_path.exists() {
            Self::load_file(&config_path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load a specific configuration file, then apply environment overrides
    pub fn load_file(path: &Path) -> IngestResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> IngestResult<Self> {
        toml::from_str(content)
            .map_err(|e| IngestError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> IngestResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| IngestError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable lookup.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(column) = lookup(ENV_DATE_COLUMN) {
            let column = column.trim();
            self.source.date_column = (!column.is_empty()).then(|| column.to_string());
        }

        if let Some(prefix) = lookup(ENV_SOURCE_PREFIX) {
            self.source.prefix_to_strip = (!prefix.is_empty()).then_some(prefix);
        }

        if let Some(root) = lookup(ENV_OUTPUT_ROOT)
            && !root.is_empty()
        {
            self.output.root = root;
        }

        if let Some(mode) = lookup(ENV_WRITE_MODE) {
            match mode.parse() {
                Ok(mode) => self.output.write_mode = mode,
                Err(e) => warn!(variable = ENV_WRITE_MODE, error = %e, "Ignoring override"),
            }
        }

        if let Some(codec) = lookup(ENV_COMPRESSION) {
            match codec.parse() {
                Ok(codec) => self.output.compression = codec,
                Err(e) => warn!(variable = ENV_COMPRESSION, error = %e, "Ignoring override"),
            }
        }

        if let Some(bytes) = lookup(ENV_LARGE_FILE_WARN_BYTES) {
            match bytes.parse() {
                Ok(bytes) => self.source.large_file_warn_bytes = bytes,
                Err(e) => {
                    warn!(variable = ENV_LARGE_FILE_WARN_BYTES, error = %e, "Ignoring override")
                }
            }
        }

        if let Some(enabled) = lookup(ENV_PARTITIONING) {
            match enabled.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => self.partitioning.enabled = true,
                "false" | "0" | "no" | "off" => self.partitioning.enabled = false,
                other => warn!(variable = ENV_PARTITIONING, value = other, "Ignoring override"),
            }
        }
    }

    /// Reject values no pipeline run could use
    pub fn validate(&self) -> IngestResult<()> {
        if self.output.root.trim().is_empty() {
            return Err(IngestError::Config("output.root must not be empty".to_string()));
        }
        let ratio = self.partitioning.min_sample_parse_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(IngestError::Config(format!(
                "partitioning.min_sample_parse_ratio must be in (0, 1], got {}",
                ratio
            )));
        }
        Ok(())
    }

    /// Output directory for a dataset, always ending in `/`
    pub fn output_path(&self, namespace: &str, table: &str) -> String {
        format!(
            "{}/{}/{}/",
            self.output.root.trim_end_matches('/'),
            namespace,
            table
        )
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Lakehouse ingestion configuration

[source]
# Date column to partition by. When unset the column is detected from the data.
# date_column = "order_date"

# Leading key segment naming the ingestion stage, removed before the
# namespace and table are read from the key
# prefix_to_strip = "non-partitioned-folder"

# Objects larger than this many bytes are logged with a warning
large_file_warn_bytes = 104857600

[output]
# Datasets are written to <root>/<namespace>/<table>/
root = "s3://clean-zone"

# "append" (default) or "overwrite" (replaces the written partitions)
write_mode = "append"

# "snappy" (default), "gzip", "zstd", "lz4" or "none"
compression = "snappy"

[partitioning]
# Partition output by the date column
enabled = true

# "day" (year/month/day, default), "month" (year/month) or "year"
granularity = "day"

# Rows without a valid date: "keep" (default partition) or "drop"
invalid_rows = "keep"

# Share of sampled values that must parse for a column to count as a date
min_sample_parse_ratio = 0.5
"#
}
