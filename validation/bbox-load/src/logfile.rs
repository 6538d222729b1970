//! Reading result logs back for offline analysis.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::metrics::{LatencyStats, SUMMARY_PREFIX};
use crate::record::{Column, RecordParseError, ResultRecord, FIELD_SEPARATOR};

#[derive(Debug, Error)]
pub enum LogFileError {
    #[error("Failed to read log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: unknown column '{name}'")]
    UnknownColumn { line: usize, name: String },

    #[error("Line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: RecordParseError,
    },

    #[error("Line {line}: invalid throughput '{value}'")]
    InvalidSummary { line: usize, value: String },

    #[error("Line {line}: content after the summary line")]
    TrailingContent { line: usize },

    #[error("Analysis failed: {0}")]
    Analysis(String),
}

/// A parsed run log.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLog {
    /// Empty when the run never ramped up.
    pub columns: Vec<Column>,
    pub records: Vec<ResultRecord>,
    /// `None` without a summary line (the run was killed),
    /// `Some(None)` for `throughput: undefined`.
    pub summary: Option<Option<f64>>,
}

impl RunLog {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, LogFileError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, LogFileError> {
        let mut log = RunLog {
            columns: Vec::new(),
            records: Vec::new(),
            summary: None,
        };
        let mut has_header = false;

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if log.summary.is_some() {
                return Err(LogFileError::TrailingContent { line: line_no });
            }

            if let Some(value) = line.strip_prefix(SUMMARY_PREFIX) {
                log.summary = Some(parse_throughput(value.trim(), line_no)?);
            } else if !has_header {
                log.columns = parse_header(line, line_no)?;
                has_header = true;
            } else {
                let record = ResultRecord::from_line(line, &log.columns)
                    .map_err(|source| LogFileError::Record { line: line_no, source })?;
                log.records.push(record);
            }
        }

        Ok(log)
    }

    /// Summary statistics over the records.
    pub fn analyze(&self, source: impl Into<String>) -> Result<LogAnalysis, LogFileError> {
        let count = self.records.len();
        let mut histogram = Histogram::<u64>::new(3)
            .map_err(|e| LogFileError::Analysis(format!("{:?}", e)))?;
        let mut feature_total = 0u64;
        let mut max_features = 0u64;
        let mut server_times = Vec::new();

        for record in &self.records {
            feature_total += record.feature_count;
            max_features = max_features.max(record.feature_count);
            if let Some(ms) = record.server_time_ms {
                server_times.push(ms);
            }
            let micros = (record.client_latency_ms * 1000.0).round().max(0.0) as u64;
            histogram.record(micros).ok();
        }

        let mean_features = if count > 0 {
            feature_total as f64 / count as f64
        } else {
            0.0
        };
        let mean_server_time_ms = (!server_times.is_empty())
            .then(|| server_times.iter().sum::<u64>() as f64 / server_times.len() as f64);
        let latency = if self.columns.contains(&Column::ResponseTime) {
            LatencyStats::from_histogram(&histogram)
        } else {
            LatencyStats::default()
        };

        Ok(LogAnalysis {
            source: source.into(),
            columns: self.columns.iter().map(|c| c.header_name().to_string()).collect(),
            record_count: count,
            throughput: self.summary,
            mean_features,
            max_features,
            mean_server_time_ms,
            latency,
        })
    }
}

fn parse_header(line: &str, line_no: usize) -> Result<Vec<Column>, LogFileError> {
    line.split(FIELD_SEPARATOR.trim())
        .map(|name| {
            Column::from_header_name(name).ok_or_else(|| LogFileError::UnknownColumn {
                line: line_no,
                name: name.trim().to_string(),
            })
        })
        .collect()
}

fn parse_throughput(value: &str, line_no: usize) -> Result<Option<f64>, LogFileError> {
    if value == "undefined" {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| LogFileError::InvalidSummary {
            line: line_no,
            value: value.to_string(),
        })
}

/// Statistics over a parsed log.
#[derive(Debug, Clone, Serialize)]
pub struct LogAnalysis {
    pub source: String,
    pub columns: Vec<String>,
    pub record_count: usize,
    pub throughput: Option<Option<f64>>,
    pub mean_features: f64,
    pub max_features: u64,
    pub mean_server_time_ms: Option<f64>,
    pub latency: LatencyStats,
}
