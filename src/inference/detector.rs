//! Date column detection
//!
//! Two independent passes score columns, then a stable sort on priority merges
//! them:
//! 1. Name keyword pass: columns whose lowercased name contains a date-ish
//!    keyword (priority 1).
//! 2. Type pass: remaining temporal or text columns (priority 2).
//!
//! A column qualifies in either pass only if a sample of its values parses as
//! dates. Columns keep dataset order within a priority level.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::formats::parse_value;
use crate::models::{Column, ColumnType, Dataset};

/// Substrings that mark a column name as date-like
pub const DATE_KEYWORDS: &[&str] = &[
    "date",
    "time",
    "timestamp",
    "created_at",
    "updated_at",
    "transaction_date",
];

/// Number of leading values sampled per column
pub const SAMPLE_SIZE: usize = 100;

/// Default share of non-null sampled values that must parse
pub const DEFAULT_MIN_PARSE_RATIO: f64 = 0.5;

/// How a candidate was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectionMethod {
    NameKeywordMatch,
    TypeInference,
}

impl DetectionMethod {
    /// Lower is preferred
    pub fn priority(self) -> u8 {
        match self {
            DetectionMethod::NameKeywordMatch => 1,
            DetectionMethod::TypeInference => 2,
        }
    }
}

/// A column that may hold the dataset's date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateCandidate {
    pub column_name: String,
    pub method: DetectionMethod,
    pub priority: u8,
}

impl DateCandidate {
    fn new(column_name: &str, method: DetectionMethod) -> Self {
        Self {
            column_name: column_name.to_string(),
            method,
            priority: method.priority(),
        }
    }
}

/// Ranks the columns of a dataset by how likely they are to hold its date
#[derive(Debug, Clone, Copy)]
pub struct DateColumnDetector {
    min_parse_ratio: f64,
}

impl Default for DateColumnDetector {
    fn default() -> Self {
        Self {
            min_parse_ratio: DEFAULT_MIN_PARSE_RATIO,
        }
    }
}

impl DateColumnDetector {
    pub fn new(min_parse_ratio: f64) -> Self {
        Self {
            min_parse_ratio: min_parse_ratio.clamp(0.0, 1.0),
        }
    }

    /// Ranked candidates, best first; empty when no column parses
    pub fn detect(&self, dataset: &Dataset) -> Vec<DateCandidate> {
        let mut candidates = self.keyword_pass(dataset);
        candidates.extend(self.type_pass(dataset));
        candidates.sort_by_key(|c| c.priority);

        debug!(
            candidates = ?candidates.iter().map(|c| c.column_name.as_str()).collect::<Vec<_>>(),
            "Date column detection finished"
        );
        candidates
    }

    /// Columns whose name contains a date keyword and whose sample parses
    pub fn keyword_pass(&self, dataset: &Dataset) -> Vec<DateCandidate> {
        dataset
            .columns()
            .iter()
            .filter(|c| has_date_keyword(&c.name))
            .filter(|c| self.sample_parses(c, true))
            .map(|c| DateCandidate::new(&c.name, DetectionMethod::NameKeywordMatch))
            .collect()
    }

    /// Temporal or text columns without a date keyword whose sample parses
    pub fn type_pass(&self, dataset: &Dataset) -> Vec<DateCandidate> {
        dataset
            .columns()
            .iter()
            .filter(|c| !has_date_keyword(&c.name))
            .filter(|c| c.column_type.is_temporal() || c.column_type == ColumnType::Text)
            .filter(|c| self.sample_parses(c, false))
            .map(|c| DateCandidate::new(&c.name, DetectionMethod::TypeInference))
            .collect()
    }

    fn sample_parses(&self, column: &Column, allow_integers: bool) -> bool {
        let mut present = 0usize;
        let mut parsed = 0usize;

        for value in column.values.iter().take(SAMPLE_SIZE) {
            if value.is_null() {
                continue;
            }
            present += 1;
            if parse_value(value, allow_integers).is_some() {
                parsed += 1;
            }
        }

        parsed > 0 && parsed as f64 >= present as f64 * self.min_parse_ratio
    }
}

fn has_date_keyword(name: &str) -> bool {
    let lower = name.to_lowercase();
    DATE_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use chrono::NaiveDate;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Column::text("id", &["1", "2", "3"]),
            Column::text("shipped", &["2024-03-09", "2024-03-10", "2024-03-11"]),
            Column::text("Order_Date", &["2024-03-07", "N/A", "2024-03-08"]),
            Column::text("updated_at", &["yesterday", "soon", "never"]),
            Column::new(
                "received",
                ColumnType::Date,
                vec![
                    Value::Date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()),
                    Value::Null,
                    Value::Null,
                ],
            ),
            Column::new(
                "event_time",
                ColumnType::Integer,
                vec![
                    Value::Integer(1_709_769_600),
                    Value::Integer(1_709_856_000),
                    Value::Null,
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_keyword_candidates_rank_first() {
        let candidates = DateColumnDetector::default().detect(&dataset());
        let names: Vec<_> = candidates.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["Order_Date", "event_time", "shipped", "received"]);

        let first_type = candidates
            .iter()
            .position(|c| c.method == DetectionMethod::TypeInference)
            .unwrap();
        assert!(candidates[..first_type]
            .iter()
            .all(|c| c.method == DetectionMethod::NameKeywordMatch && c.priority == 1));
        assert!(candidates[first_type..]
            .iter()
            .all(|c| c.method == DetectionMethod::TypeInference && c.priority == 2));
    }

    #[test]
    fn test_deterministic() {
        let ds = dataset();
        let detector = DateColumnDetector::default();
        assert_eq!(detector.detect(&ds), detector.detect(&ds));
    }

    #[test]
    fn test_keyword_column_without_parseable_values_skipped() {
        let candidates = DateColumnDetector::default().keyword_pass(&dataset());
        assert!(candidates.iter().all(|c| c.column_name != "updated_at"));
    }

    #[test]
    fn test_integer_columns_never_type_inferred() {
        let ds = Dataset::new(vec![Column::new(
            "epoch",
            ColumnType::Integer,
            vec![Value::Integer(1_709_769_600)],
        )])
        .unwrap();
        assert!(DateColumnDetector::default().detect(&ds).is_empty());
    }

    #[test]
    fn test_compact_integer_keyword_column() {
        let ds = Dataset::new(vec![Column::new(
            "order_date",
            ColumnType::Integer,
            vec![Value::Integer(20_240_307), Value::Integer(20_240_308)],
        )])
        .unwrap();
        let candidates = DateColumnDetector::default().detect(&ds);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].method, DetectionMethod::NameKeywordMatch);
    }

    #[test]
    fn test_parse_ratio_threshold() {
        let ds = Dataset::new(vec![Column::text(
            "created",
            &["2024-03-07", "x", "y", "z"],
        )])
        .unwrap();
        assert!(DateColumnDetector::default().detect(&ds).is_empty());
        assert_eq!(DateColumnDetector::new(0.25).detect(&ds).len(), 1);
    }

    #[test]
    fn test_no_candidates() {
        let ds = Dataset::new(vec![
            Column::text("name", &["alice", "bob"]),
            Column::new(
                "amount",
                ColumnType::Float,
                vec![Value::Float(1.0), Value::Float(2.0)],
            ),
        ])
        .unwrap();
        assert!(DateColumnDetector::default().detect(&ds).is_empty());
    }
}
