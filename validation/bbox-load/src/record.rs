//! Per-request result records and their log line format.
//!
//! A run log is plain text: a header naming the columns, one
//! comma-separated line per counted request, and a trailing summary line.
//! Integers are written with `{}`, latency with six fixed decimals, and an
//! absent optional value as an empty field.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between fields on header and record lines.
pub const FIELD_SEPARATOR: &str = ", ";

/// A column of the result log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    /// Server-reported query time (ms).
    QueryTime,
    /// Number of features returned.
    NumFeatures,
    /// Server-reported total handling time (ms).
    TotalServerTime,
    /// Client-observed latency (ms).
    ResponseTime,
}

impl Column {
    /// Name used on the header line.
    pub fn header_name(&self) -> &'static str {
        match self {
            Column::QueryTime => "querytime",
            Column::NumFeatures => "numFeatures",
            Column::TotalServerTime => "totalServerTime",
            Column::ResponseTime => "responseTime",
        }
    }

    pub fn from_header_name(name: &str) -> Option<Self> {
        match name.trim() {
            "querytime" => Some(Column::QueryTime),
            "numFeatures" => Some(Column::NumFeatures),
            "totalServerTime" => Some(Column::TotalServerTime),
            "responseTime" => Some(Column::ResponseTime),
            _ => None,
        }
    }
}

/// Header names for the given columns.
pub fn header_fields(columns: &[Column]) -> Vec<&'static str> {
    columns.iter().map(Column::header_name).collect()
}

/// One successfully completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub query_time_ms: Option<u64>,
    pub feature_count: u64,
    pub server_time_ms: Option<u64>,
    pub client_latency_ms: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordParseError {
    #[error("Expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("Invalid value for '{column}': '{value}'")]
    InvalidValue { column: &'static str, value: String },
}

impl ResultRecord {
    /// Format as a log line with the given column order.
    pub fn to_line(&self, columns: &[Column]) -> String {
        columns
            .iter()
            .map(|column| match column {
                Column::QueryTime => optional(self.query_time_ms),
                Column::NumFeatures => self.feature_count.to_string(),
                Column::TotalServerTime => optional(self.server_time_ms),
                Column::ResponseTime => format!("{:.6}", self.client_latency_ms),
            })
            .collect::<Vec<_>>()
            .join(FIELD_SEPARATOR)
    }

    /// Parse a log line written with the given column order.
    ///
    /// Values for columns not in `columns` read back as `0` / `None`.
    pub fn from_line(line: &str, columns: &[Column]) -> Result<Self, RecordParseError> {
        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        if values.len() != columns.len() {
            return Err(RecordParseError::FieldCount {
                expected: columns.len(),
                found: values.len(),
            });
        }

        let mut record = ResultRecord {
            query_time_ms: None,
            feature_count: 0,
            server_time_ms: None,
            client_latency_ms: 0.0,
        };

        for (column, value) in columns.iter().zip(values) {
            let invalid = || RecordParseError::InvalidValue {
                column: column.header_name(),
                value: value.to_string(),
            };
            match column {
                Column::QueryTime => record.query_time_ms = parse_optional(value).ok_or_else(invalid)?,
                Column::NumFeatures => record.feature_count = value.parse().map_err(|_| invalid())?,
                Column::TotalServerTime => {
                    record.server_time_ms = parse_optional(value).ok_or_else(invalid)?
                }
                Column::ResponseTime => {
                    record.client_latency_ms = value.parse().map_err(|_| invalid())?
                }
            }
        }

        Ok(record)
    }
}

fn optional(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// `Some(None)` for an empty field, `None` for an unparseable one.
fn parse_optional(value: &str) -> Option<Option<u64>> {
    if value.is_empty() {
        Some(None)
    } else {
        value.parse().ok().map(Some)
    }
}
