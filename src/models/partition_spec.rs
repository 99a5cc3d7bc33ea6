//! Partition layout and write mode for one invocation

use serde::{Deserialize, Serialize};

use super::enums::{PartitionGranularity, WriteMode};

/// Partition columns and write mode applied atomically to one write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSpec {
    /// Partition column names, coarsest first; empty when un-partitioned
    pub partition_columns: Vec<String>,
    /// Append or overwrite
    pub mode: WriteMode,
}

impl PartitionSpec {
    /// Date-based layout for the given granularity
    pub fn by_date(granularity: PartitionGranularity, mode: WriteMode) -> Self {
        Self {
            partition_columns: granularity
                .columns()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            mode,
        }
    }

    /// Single-directory layout
    pub fn unpartitioned(mode: WriteMode) -> Self {
        Self {
            partition_columns: Vec::new(),
            mode,
        }
    }

    /// Whether the layout has any partition column
    pub fn is_partitioned(&self) -> bool {
        !self.partition_columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_date_layout() {
        let spec = PartitionSpec::by_date(PartitionGranularity::default(), WriteMode::Append);
        assert_eq!(spec.partition_columns, vec!["year", "month", "day"]);
        assert!(spec.is_partitioned());
        assert!(!PartitionSpec::unpartitioned(WriteMode::Overwrite).is_partitioned());
    }
}
