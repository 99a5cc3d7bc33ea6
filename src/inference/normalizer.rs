//! Date normalization
//!
//! Converts the selected date column to timestamps with an ordered list of
//! strategies. The first strategy that parses every non-null value of the
//! column wins; the last one never fails and marks individual failures with
//! [`Value::Unparseable`].

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::formats::{
    EPOCH_SECONDS, ISO_DATE, KNOWN_FORMATS, parse_epoch_seconds, parse_integer, parse_lenient,
};
use crate::error::{IngestError, IngestResult};
use crate::models::{Column, ColumnType, Dataset, Value};

/// Which strategy converted the column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum NormalizationStrategy {
    /// Already temporal, or strict `%Y-%m-%d` text
    Iso,
    /// One known format fits every value; integer columns report `%Y%m%d`
    /// or `epoch-seconds`
    Inferred { format: String },
    /// Per-value parsing with sentinels for failures
    BestEffort,
}

/// Outcome of normalizing one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationReport {
    pub column: String,
    pub strategy: NormalizationStrategy,
    /// Values converted to timestamps
    pub parsed: usize,
    /// Null values, left as null
    pub missing: usize,
    /// Values replaced by the unparseable sentinel
    pub unparseable: usize,
}

/// Parses a date column in place
#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer;

impl DateNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Convert `column` to a timestamp column.
    ///
    /// Fails only when the column does not exist.
    pub fn normalize(&self, dataset: &mut Dataset, column: &str) -> IngestResult<NormalizationReport> {
        let available: Vec<String> = dataset.column_names().iter().map(|c| c.to_string()).collect();
        let target = dataset
            .column_mut(column)
            .ok_or_else(|| IngestError::DateColumnNotFound {
                column: column.to_string(),
                available,
            })?;

        let (strategy, values) = convert(&target.values);
        *target = Column::new(column, ColumnType::Timestamp, values);

        let report = summarize(column, strategy, &target.values);
        match report.strategy {
            NormalizationStrategy::BestEffort => warn!(
                column,
                parsed = report.parsed,
                missing = report.missing,
                unparseable = report.unparseable,
                "Date conversion fell back to per-value parsing"
            ),
            _ => info!(
                column,
                strategy = ?report.strategy,
                parsed = report.parsed,
                missing = report.missing,
                "Date conversion successful"
            ),
        }
        Ok(report)
    }
}

fn convert(values: &[Value]) -> (NormalizationStrategy, Vec<Value>) {
    if let Some(parsed) = parse_all(values, |v| match v {
        Value::Timestamp(ts) => Some(*ts),
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::Text(s) => ISO_DATE.parse(s),
        _ => None,
    }) {
        return (NormalizationStrategy::Iso, parsed);
    }

    if let Some((format, parsed)) = infer_format(values) {
        return (NormalizationStrategy::Inferred { format }, parsed);
    }

    (NormalizationStrategy::BestEffort, best_effort(values))
}

/// Apply `parse` to every value; `None` as soon as one non-null value fails
fn parse_all<F>(values: &[Value], parse: F) -> Option<Vec<Value>>
where
    F: Fn(&Value) -> Option<chrono::NaiveDateTime>,
{
    values
        .iter()
        .map(|v| {
            if v.is_null() {
                Some(Value::Null)
            } else {
                parse(v).map(Value::Timestamp)
            }
        })
        .collect()
}

fn infer_format(values: &[Value]) -> Option<(String, Vec<Value>)> {
    // Nothing to infer from an all-null column
    values.iter().find(|v| !v.is_null())?;

    let by_pattern = KNOWN_FORMATS.iter().find_map(|format| {
        parse_all(values, |v| match v {
            Value::Text(s) => format.parse(s.trim()),
            Value::Integer(i) => format.parse(&i.to_string()),
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        })
        .map(|parsed| (format.to_string(), parsed))
    });
    if by_pattern.is_some() {
        return by_pattern;
    }

    parse_all(values, |v| match v {
        Value::Integer(i) => parse_epoch_seconds(*i),
        Value::Timestamp(ts) => Some(*ts),
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        _ => None,
    })
    .map(|parsed| (EPOCH_SECONDS.to_string(), parsed))
}

fn best_effort(values: &[Value]) -> Vec<Value> {
    values
        .iter()
        .map(|v| match v {
            Value::Null => Value::Null,
            Value::Timestamp(ts) => Value::Timestamp(*ts),
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .map_or_else(|| Value::Unparseable(d.to_string()), Value::Timestamp),
            Value::Text(s) => {
                parse_lenient(s).map_or_else(|| Value::Unparseable(s.clone()), Value::Timestamp)
            }
            Value::Unparseable(raw) => Value::Unparseable(raw.clone()),
            Value::Boolean(b) => Value::Unparseable(b.to_string()),
            Value::Integer(i) => {
                parse_integer(*i).map_or_else(|| Value::Unparseable(i.to_string()), Value::Timestamp)
            }
            Value::Float(f) => Value::Unparseable(f.to_string()),
        })
        .collect()
}

fn summarize(column: &str, strategy: NormalizationStrategy, values: &[Value]) -> NormalizationReport {
    let mut report = NormalizationReport {
        column: column.to_string(),
        strategy,
        parsed: 0,
        missing: 0,
        unparseable: 0,
    };
    for value in values {
        match value {
            Value::Null => report.missing += 1,
            Value::Unparseable(_) => report.unparseable += 1,
            _ => report.parsed += 1,
        }
    }
    report
}
