//! Partition coordinate derivation
//!
//! Adds integer `year`, `month` and `day` columns (or a coarser prefix of them)
//! computed from a normalized date column. Rows without a usable date get null
//! coordinates and are reported; they are never given a default date and never
//! dropped here.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{IngestError, IngestResult};
use crate::models::{Column, ColumnType, Dataset, PartitionGranularity, PartitionSpec, Value, WriteMode};

/// Why a row has no partition coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvalidReason {
    /// The date value was present but could not be parsed
    Unparseable,
    /// The date value was absent
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidPartitionRow {
    /// Zero-based row index in the loaded dataset
    pub row: usize,
    pub reason: InvalidReason,
}

/// Outcome of deriving partition columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionReport {
    /// Columns added to the dataset, coarsest first
    pub columns: Vec<String>,
    /// Rows whose coordinates are all null
    pub invalid_rows: Vec<InvalidPartitionRow>,
}

impl PartitionReport {
    /// Whether `row` was flagged
    pub fn is_invalid(&self, row: usize) -> bool {
        self.invalid_rows
            .binary_search_by_key(&row, |r| r.row)
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionKeyDeriver {
    granularity: PartitionGranularity,
}

impl PartitionKeyDeriver {
    pub fn new(granularity: PartitionGranularity) -> Self {
        Self { granularity }
    }

    pub fn granularity(&self) -> PartitionGranularity {
        self.granularity
    }

    /// Partition spec matching the columns this deriver adds
    pub fn spec(&self, mode: WriteMode) -> PartitionSpec {
        PartitionSpec::by_date(self.granularity, mode)
    }

    /// Add the partition columns derived from `date_column`.
    ///
    /// Source columns that already use a partition column name are replaced,
    /// except the date column itself, which is rejected.
    pub fn derive(&self, dataset: &mut Dataset, date_column: &str) -> IngestResult<PartitionReport> {
        let names = self.granularity.columns();
        if names.contains(&date_column) {
            return Err(IngestError::PartitionColumnConflict {
                column: date_column.to_string(),
            });
        }

        let source = dataset
            .column(date_column)
            .ok_or_else(|| IngestError::DateColumnNotFound {
                column: date_column.to_string(),
                available: dataset.column_names().iter().map(|c| c.to_string()).collect(),
            })?;

        let mut coordinates: Vec<Vec<Value>> = vec![Vec::with_capacity(source.len()); names.len()];
        let mut invalid_rows = Vec::new();

        for (row, value) in source.values.iter().enumerate() {
            match value.calendar_date() {
                Some(date) => {
                    let parts = [
                        i64::from(date.year()),
                        i64::from(date.month()),
                        i64::from(date.day()),
                    ];
                    for (column, part) in coordinates.iter_mut().zip(parts) {
                        column.push(Value::Integer(part));
                    }
                }
                None => {
                    for column in coordinates.iter_mut() {
                        column.push(Value::Null);
                    }
                    let reason = if value.is_null() {
                        InvalidReason::Missing
                    } else {
                        InvalidReason::Unparseable
                    };
                    invalid_rows.push(InvalidPartitionRow { row, reason });
                }
            }
        }

        for (name, values) in names.iter().zip(coordinates) {
            let replaced = dataset.replace_column(Column::new(*name, ColumnType::Integer, values))?;
            if replaced.is_some() {
                warn!(column = *name, "Replaced existing source column with derived partition column");
            }
        }

        if invalid_rows.is_empty() {
            info!(columns = ?names, "Derived partition columns");
        } else {
            warn!(
                columns = ?names,
                invalid = invalid_rows.len(),
                "Derived partition columns; some rows have no valid date"
            );
        }

        Ok(PartitionReport {
            columns: names.iter().map(|c| c.to_string()).collect(),
            invalid_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn normalized(values: Vec<Value>) -> Dataset {
        Dataset::new(vec![
            Column::text("id", &vec!["x"; values.len()]),
            Column::new("order_date", ColumnType::Timestamp, values),
        ])
        .unwrap()
    }

    fn ts(y: i32, m: u32, d: u32) -> Value {
        Value::Timestamp(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_derives_year_month_day() {
        let mut ds = normalized(vec![ts(2024, 3, 7)]);
        let report = PartitionKeyDeriver::default()
            .derive(&mut ds, "order_date")
            .unwrap();

        assert!(report.invalid_rows.is_empty());
        assert_eq!(report.columns, vec!["year", "month", "day"]);
        assert_eq!(ds.column("year").unwrap().values, vec![Value::Integer(2024)]);
        assert_eq!(ds.column("month").unwrap().values, vec![Value::Integer(3)]);
        assert_eq!(ds.column("day").unwrap().values, vec![Value::Integer(7)]);
    }

    #[test]
    fn test_sentinel_rows_get_null_coordinates() {
        let mut ds = normalized(vec![
            ts(2024, 3, 7),
            Value::Unparseable("N/A".to_string()),
            Value::Null,
        ]);
        let report = PartitionKeyDeriver::default()
            .derive(&mut ds, "order_date")
            .unwrap();

        assert_eq!(
            report.invalid_rows,
            vec![
                InvalidPartitionRow {
                    row: 1,
                    reason: InvalidReason::Unparseable
                },
                InvalidPartitionRow {
                    row: 2,
                    reason: InvalidReason::Missing
                },
            ]
        );
        assert!(report.is_invalid(1));
        assert!(!report.is_invalid(0));
        for name in ["year", "month", "day"] {
            let values = &ds.column(name).unwrap().values;
            assert_eq!(values[1], Value::Null);
            assert_eq!(values[2], Value::Null);
        }
        // Never a plausible default
        assert_ne!(ds.column("year").unwrap().values[1], Value::Integer(1970));
        assert_eq!(ds.row_count(), 3);
    }

    #[test]
    fn test_existing_partition_named_column_replaced() {
        let mut ds = normalized(vec![ts(2023, 12, 31)]);
        ds.push_column(Column::text("year", &["FY24"])).unwrap();

        PartitionKeyDeriver::default()
            .derive(&mut ds, "order_date")
            .unwrap();
        let year = ds.column("year").unwrap();
        assert_eq!(year.column_type, ColumnType::Integer);
        assert_eq!(year.values, vec![Value::Integer(2023)]);
    }

    #[test]
    fn test_date_column_named_like_partition_rejected() {
        let mut ds = Dataset::new(vec![Column::new(
            "day",
            ColumnType::Timestamp,
            vec![ts(2024, 3, 7)],
        )])
        .unwrap();
        let err = PartitionKeyDeriver::default().derive(&mut ds, "day").unwrap_err();
        assert!(matches!(
            err,
            IngestError::PartitionColumnConflict { ref column } if column == "day"
        ));
        assert_eq!(ds.column("day").unwrap().values, vec![ts(2024, 3, 7)]);

        // Coarser granularity does not derive `day`
        let report = PartitionKeyDeriver::new(PartitionGranularity::Month)
            .derive(&mut ds, "day")
            .unwrap();
        assert_eq!(report.columns, vec!["year", "month"]);
        assert_eq!(ds.column("day").unwrap().values, vec![ts(2024, 3, 7)]);
    }

    #[test]
    fn test_month_granularity() {
        let mut ds = normalized(vec![ts(2024, 3, 7)]);
        let deriver = PartitionKeyDeriver::new(PartitionGranularity::Month);
        let report = deriver.derive(&mut ds, "order_date").unwrap();

        assert_eq!(report.columns, vec!["year", "month"]);
        assert!(!ds.contains_column("day"));
        assert_eq!(
            deriver.spec(WriteMode::Overwrite).partition_columns,
            vec!["year", "month"]
        );
    }

    #[test]
    fn test_missing_date_column() {
        let mut ds = normalized(vec![ts(2024, 3, 7)]);
        assert!(matches!(
            PartitionKeyDeriver::default().derive(&mut ds, "shipped_at"),
            Err(IngestError::DateColumnNotFound { .. })
        ));
    }
}
