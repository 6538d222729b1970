//! Metrics aggregation and the end-of-run summary.

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{info, warn};

use crate::error::{LoadError, LoadResult};
use crate::ramp::RampCoordinator;
use crate::record::{Column, ResultRecord};
use crate::sink::ResultSink;

/// Prefix of the summary line written at shutdown.
pub const SUMMARY_PREFIX: &str = "throughput:";

/// What happened to a result handed to [`MetricsAggregator::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Written to the log and counted.
    Counted,
    /// Arrived while warming up or after finalize.
    Ignored,
}

/// Why an iteration produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Transport,
    NonSuccessStatus,
    ResponseParse,
}

impl DropReason {
    /// Classify a request-side error. Sink and config errors are not drops.
    pub fn from_error(err: &LoadError) -> Option<Self> {
        match err {
            LoadError::Transport(_) => Some(DropReason::Transport),
            LoadError::NonSuccessStatus(_) => Some(DropReason::NonSuccessStatus),
            LoadError::ResponseParse(_) => Some(DropReason::ResponseParse),
            _ => None,
        }
    }
}

/// Diagnostic counters. None of these contribute to throughput.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounts {
    pub transport_errors: u64,
    pub non_success: u64,
    pub parse_errors: u64,
    pub ignored: u64,
    pub sink_errors: u64,
}

/// Client latency percentiles (ms).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl LatencyStats {
    /// Summarize a histogram of microsecond samples.
    pub fn from_histogram(histogram: &Histogram<u64>) -> Self {
        if histogram.is_empty() {
            return Self::default();
        }
        Self {
            p50: histogram.value_at_percentile(50.0) as f64 / 1000.0,
            p90: histogram.value_at_percentile(90.0) as f64 / 1000.0,
            p95: histogram.value_at_percentile(95.0) as f64 / 1000.0,
            p99: histogram.value_at_percentile(99.0) as f64 / 1000.0,
            min: histogram.min() as f64 / 1000.0,
            max: histogram.max() as f64 / 1000.0,
            mean: histogram.mean() / 1000.0,
        }
    }
}

/// End-of-run totals. `None` marks an undefined value: the run never
/// ramped, or the window had no positive length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub total_count: u64,
    pub total_elapsed_seconds: Option<f64>,
    pub throughput_per_second: Option<f64>,
}

impl SummaryRecord {
    pub fn compute(total_count: u64, elapsed_seconds: Option<f64>) -> Self {
        let throughput_per_second = elapsed_seconds
            .filter(|elapsed| *elapsed > 0.0)
            .map(|elapsed| total_count as f64 / elapsed);
        Self {
            total_count,
            total_elapsed_seconds: elapsed_seconds,
            throughput_per_second,
        }
    }

    /// Log line, e.g. `throughput: 12.500000` or `throughput: undefined`.
    pub fn summary_line(&self) -> String {
        format!("{} {}", SUMMARY_PREFIX, ThroughputDisplay(self.throughput_per_second))
    }
}

struct ThroughputDisplay(Option<f64>);

impl fmt::Display for ThroughputDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{:.6}", value),
            None => f.write_str("undefined"),
        }
    }
}

/// Thread-safe aggregation of completed requests.
///
/// Counting and appending the log line happen under the ramp status lock,
/// so concurrent callers never lose an increment and the log holds exactly
/// one line per counted result.
pub struct MetricsAggregator {
    ramp: Arc<RampCoordinator>,
    sink: Arc<ResultSink>,
    columns: Vec<Column>,
    latency: Mutex<Histogram<u64>>,
    summary: OnceLock<SummaryRecord>,
    transport_errors: AtomicU64,
    non_success: AtomicU64,
    parse_errors: AtomicU64,
    ignored: AtomicU64,
    sink_errors: AtomicU64,
}

impl MetricsAggregator {
    /// Create an aggregator writing lines with the given column order.
    pub fn new(
        ramp: Arc<RampCoordinator>,
        sink: Arc<ResultSink>,
        columns: Vec<Column>,
    ) -> LoadResult<Self> {
        let histogram = Histogram::new(3)
            .map_err(|e| LoadError::Config(format!("latency histogram: {:?}", e)))?;
        Ok(Self {
            ramp,
            sink,
            columns,
            latency: Mutex::new(histogram),
            summary: OnceLock::new(),
            transport_errors: AtomicU64::new(0),
            non_success: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
        })
    }

    /// Count a completed request and append its log line.
    ///
    /// A no-op while warming up and after finalize. A failed log write loses
    /// the line but the request still counts.
    ///
    /// The log write is a blocking call made under a std mutex from async
    /// tasks. Lines are short and flushed unbuffered, so the hold time is one
    /// small `write`; move writes to a dedicated writer task if contention
    /// shows up at high user counts.
    pub fn record(&self, result: &ResultRecord) -> RecordOutcome {
        let mut status = self.ramp.lock();
        if !status.is_counting() {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            return RecordOutcome::Ignored;
        }

        if let Err(e) = self.sink.write_line(&result.to_line(&self.columns)) {
            self.sink_errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Dropped result log line");
        }
        status.request_count += 1;

        // Auto-resizing histogram; record() grows it to fit the sample
        let micros = (result.client_latency_ms * 1000.0).round().max(0.0) as u64;
        self.latency_lock().record(micros).ok();

        RecordOutcome::Counted
    }

    /// Note an iteration that produced no result.
    pub fn record_drop(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Transport => &self.transport_errors,
            DropReason::NonSuccessStatus => &self.non_success,
            DropReason::ResponseParse => &self.parse_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Freeze the window, compute throughput and write the summary line.
    ///
    /// Only the first call does any work; later calls return the same
    /// summary, and results arriving in between are ignored.
    pub fn finalize(&self) -> SummaryRecord {
        let mut status = self.ramp.lock();
        if let Some(summary) = self.summary.get() {
            return *summary;
        }

        let elapsed = match (status.active, status.started_at) {
            (true, Some(started_at)) => Some(started_at.elapsed().as_secs_f64()),
            _ => None,
        };
        status.elapsed_seconds = Some(elapsed.unwrap_or(0.0));

        let summary = SummaryRecord::compute(status.request_count, elapsed);
        if let Err(e) = self.sink.write_line(&summary.summary_line()) {
            self.sink_errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Failed to write summary line");
        }
        let _ = self.summary.set(summary);

        match summary.throughput_per_second {
            Some(throughput) => info!(
                count = summary.total_count,
                elapsed_secs = elapsed.unwrap_or_default(),
                throughput,
                "Run finalized"
            ),
            None => warn!(
                count = summary.total_count,
                "Run finalized without a measurement window, throughput undefined"
            ),
        }
        summary
    }

    /// Results counted so far.
    pub fn request_count(&self) -> u64 {
        self.ramp.lock().request_count
    }

    /// The summary, once finalize has run.
    pub fn summary(&self) -> Option<SummaryRecord> {
        self.summary.get().copied()
    }

    pub fn drop_counts(&self) -> DropCounts {
        DropCounts {
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            non_success: self.non_success.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }

    pub fn latency_stats(&self) -> LatencyStats {
        LatencyStats::from_histogram(&self.latency_lock())
    }

    pub fn ramp(&self) -> &Arc<RampCoordinator> {
        &self.ramp
    }

    fn latency_lock(&self) -> MutexGuard<'_, Histogram<u64>> {
        self.latency.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
