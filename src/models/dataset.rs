//! In-memory tabular dataset
//!
//! A [`Dataset`] is an ordered collection of named, typed columns loaded from
//! one source object. It is owned by the pipeline invocation that loaded it and
//! never shared across invocations.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared value type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// true/false
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    /// Free text (the generic type of untyped sources such as CSV)
    Text,
    /// Calendar date
    Date,
    /// Date and time without zone
    Timestamp,
}

impl ColumnType {
    /// Whether the type already carries a temporal value
    pub fn is_temporal(self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::Timestamp)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Date => write!(f, "date"),
            ColumnType::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// A single cell value
///
/// `Null` means the value is absent. `Unparseable` is the sentinel produced by
/// date normalization for a value that was present but could not be parsed; it
/// keeps the raw text for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Unparseable(String),
}

impl Value {
    /// Whether the value is absent
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Calendar date carried by a temporal value
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            _ => None,
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared value type
    pub column_type: ColumnType,
    /// Row values, one per row
    pub values: Vec<Value>,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, column_type: ColumnType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            column_type,
            values,
        }
    }

    /// Convenience constructor for a text column
    pub fn text<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        Self::new(
            name,
            ColumnType::Text,
            values
                .iter()
                .map(|v| Value::Text(v.as_ref().to_string()))
                .collect(),
        )
    }

    /// Number of rows in the column
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Errors raised when assembling a dataset
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// Column length differs from the dataset's row count
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Column name appears twice
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),
}

/// Ordered collection of columns sharing one row count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Build a dataset, rejecting ragged or duplicate columns
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let mut dataset = Self {
            row_count: columns.first().map(Column::len).unwrap_or(0),
            columns: Vec::with_capacity(columns.len()),
        };
        for column in columns {
            dataset.push_column(column)?;
        }
        Ok(dataset)
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether a column with this exact name exists
    pub fn contains_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column by name for mutation
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Append a column at the end
    pub fn push_column(&mut self, column: Column) -> Result<(), DatasetError> {
        if self.contains_column(&column.name) {
            return Err(DatasetError::DuplicateColumn(column.name));
        }
        if self.columns.is_empty() {
            self.row_count = column.len();
        } else if column.len() != self.row_count {
            let actual = column.len();
            return Err(DatasetError::RaggedColumn {
                column: column.name,
                expected: self.row_count,
                actual,
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replace a column of the same name in place, or append it if absent.
    ///
    /// Returns the column that was replaced.
    pub fn replace_column(&mut self, column: Column) -> Result<Option<Column>, DatasetError> {
        match self.columns.iter().position(|c| c.name == column.name) {
            Some(index) => {
                if column.len() != self.row_count {
                    let actual = column.len();
                    return Err(DatasetError::RaggedColumn {
                        column: column.name,
                        expected: self.row_count,
                        actual,
                    });
                }
                Ok(Some(std::mem::replace(&mut self.columns[index], column)))
            }
            None => {
                self.push_column(column)?;
                Ok(None)
            }
        }
    }

    /// Remove a column by name
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let index = self.columns.iter().position(|c| c.name == name)?;
        let removed = self.columns.remove(index);
        if self.columns.is_empty() {
            self.row_count = 0;
        }
        Some(removed)
    }

    /// Keep only the rows for which `keep(row_index)` returns true
    pub fn retain_rows<F: Fn(usize) -> bool>(&mut self, keep: F) {
        let mask: Vec<bool> = (0..self.row_count).map(&keep).collect();
        for column in &mut self.columns {
            let mut index = 0;
            column.values.retain(|_| {
                let kept = mask[index];
                index += 1;
                kept
            });
        }
        self.row_count = mask.iter().filter(|k| **k).count();
    }

    /// Copy the given rows into a new dataset, preserving column order
    pub fn take_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    column_type: c.column_type,
                    values: rows.iter().map(|r| c.values[*r].clone()).collect(),
                })
                .collect(),
            row_count: rows.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::text("id", &["1", "2", "3"]),
            Column::text("order_date", &["2024-03-07", "2024-03-08", "N/A"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_dataset_shape() {
        let ds = sample();
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.column_names(), vec!["id", "order_date"]);
        assert!(ds.contains_column("order_date"));
        assert!(!ds.contains_column("Order_Date"));
    }

    #[test]
    fn test_ragged_column_rejected() {
        let err = Dataset::new(vec![
            Column::text("a", &["1", "2"]),
            Column::text("b", &["1"]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            DatasetError::RaggedColumn {
                column: "b".to_string(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_push_and_replace_reject_wrong_length() {
        let mut ds = sample();
        let err = ds.push_column(Column::text("amount", &["1.5"])).unwrap_err();
        assert_eq!(
            err,
            DatasetError::RaggedColumn {
                column: "amount".to_string(),
                expected: 3,
                actual: 1
            }
        );

        let err = ds
            .replace_column(Column::text("order_date", &["2024-03-07"; 4]))
            .unwrap_err();
        assert_eq!(
            err,
            DatasetError::RaggedColumn {
                column: "order_date".to_string(),
                expected: 3,
                actual: 4
            }
        );
        assert_eq!(ds.column_names(), vec!["id", "order_date"]);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut ds = sample();
        let err = ds.push_column(Column::text("id", &["x", "y", "z"])).unwrap_err();
        assert_eq!(err, DatasetError::DuplicateColumn("id".to_string()));
    }

    #[test]
    fn test_replace_column_keeps_position() {
        let mut ds = sample();
        let old = ds
            .replace_column(Column::new(
                "id",
                ColumnType::Integer,
                vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
            ))
            .unwrap();
        assert!(old.is_some());
        assert_eq!(ds.column_names(), vec!["id", "order_date"]);
        assert_eq!(ds.column("id").unwrap().column_type, ColumnType::Integer);
    }

    #[test]
    fn test_retain_and_take_rows() {
        let mut ds = sample();
        let taken = ds.take_rows(&[2, 0]);
        assert_eq!(taken.row_count(), 2);
        assert_eq!(
            taken.column("id").unwrap().values[0],
            Value::Text("3".to_string())
        );

        ds.retain_rows(|row| row != 1);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(
            ds.column("order_date").unwrap().values[1],
            Value::Text("N/A".to_string())
        );
    }

    #[test]
    fn test_sentinel_is_not_null() {
        let sentinel = Value::Unparseable("N/A".to_string());
        assert!(!sentinel.is_null());
        assert!(sentinel.calendar_date().is_none());
    }
}
