//! Run reports and their console, JSON and CSV renderings.

use chrono::{DateTime, Utc};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ScenarioConfig;
use crate::logfile::LogAnalysis;
use crate::metrics::{DropCounts, LatencyStats, SummaryRecord};
use crate::runner::StopReason;
use crate::user::UserStats;

/// Everything known about a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub scenario: String,
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
    pub target_concurrency: u32,
    pub users_spawned: u32,
    pub stop_reason: StopReason,
    pub summary: SummaryRecord,
    /// Iterations across all users that reported back, counted or not.
    pub iterations: u64,
    pub drops: DropCounts,
    pub latency: LatencyStats,
    pub log_path: Option<String>,
}

impl RunReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &ScenarioConfig,
        users_spawned: u32,
        stop_reason: StopReason,
        summary: SummaryRecord,
        drops: DropCounts,
        latency: LatencyStats,
        user_stats: &[UserStats],
        log_path: Option<&Path>,
    ) -> Self {
        Self {
            scenario: config.name.clone(),
            endpoint: config.endpoint_url(),
            timestamp: Utc::now(),
            target_concurrency: config.target_concurrency,
            users_spawned,
            stop_reason,
            summary,
            iterations: user_stats.iter().map(|u| u.iterations).sum(),
            drops,
            latency,
            log_path: log_path.map(|p| p.display().to_string()),
        }
    }
}

/// Formats run reports for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format a run report as a console table.
    pub fn format_table(report: &RunReport) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Run Results: {}", report.scenario)]);

        table.add_row(vec!["Endpoint:", &report.endpoint]);
        table.add_row(vec![
            "Users:",
            &format!("{}/{}", report.users_spawned, report.target_concurrency),
        ]);
        table.add_row(vec!["Stopped:", &report.stop_reason.to_string()]);
        table.add_row(vec![
            "Window:",
            &report
                .summary
                .total_elapsed_seconds
                .map(|s| format!("{:.1}s", s))
                .unwrap_or_else(|| "never ramped".to_string()),
        ]);
        table.add_row(vec![
            "Counted Requests:",
            &format!("{}", report.summary.total_count),
        ]);
        table.add_row(vec![
            "Throughput:",
            &format_throughput(report.summary.throughput_per_second),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p90 / p95 / p99 / max"]);
        table.add_row(vec!["", &format_latency(&report.latency)]);

        table.add_row(vec!["", ""]);
        table.add_row(vec![
            "Dropped:",
            &format!(
                "{} transport / {} status / {} parse",
                report.drops.transport_errors, report.drops.non_success, report.drops.parse_errors
            ),
        ]);
        table.add_row(vec!["Ignored (warm-up):", &format!("{}", report.drops.ignored)]);
        if report.drops.sink_errors > 0 {
            table.add_row(vec!["Log Write Errors:", &format!("{}", report.drops.sink_errors)]);
        }
        if let Some(path) = &report.log_path {
            table.add_row(vec!["Log:", path]);
        }

        table.to_string()
    }

    /// Format a parsed log as a console table.
    pub fn format_analysis(analysis: &LogAnalysis) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Log Analysis: {}", analysis.source)]);

        table.add_row(vec!["Columns:", &analysis.columns.join(", ")]);
        table.add_row(vec!["Records:", &format!("{}", analysis.record_count)]);
        table.add_row(vec![
            "Throughput:",
            &match analysis.throughput {
                Some(value) => format_throughput(value),
                None => "no summary line".to_string(),
            },
        ]);
        table.add_row(vec![
            "Features (mean / max):",
            &format!("{:.1} / {}", analysis.mean_features, analysis.max_features),
        ]);
        if let Some(mean) = analysis.mean_server_time_ms {
            table.add_row(vec!["Server Time (mean ms):", &format!("{:.1}", mean)]);
        }

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p90 / p95 / p99 / max"]);
        table.add_row(vec!["", &format_latency(&analysis.latency)]);

        table.to_string()
    }

    /// Format a run report as JSON.
    pub fn format_json(report: &RunReport) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    /// Format a run report as a CSV row.
    pub fn format_csv(report: &RunReport) -> String {
        format!(
            "{},{},{},{},{},{},{:.1},{:.1},{:.1},{},{}",
            report.timestamp.to_rfc3339(),
            report.scenario,
            report.users_spawned,
            report
                .summary
                .total_elapsed_seconds
                .map(|s| format!("{:.3}", s))
                .unwrap_or_default(),
            report.summary.total_count,
            report
                .summary
                .throughput_per_second
                .map(|t| format!("{:.3}", t))
                .unwrap_or_default(),
            report.latency.p50,
            report.latency.p90,
            report.latency.p99,
            report.drops.transport_errors + report.drops.non_success + report.drops.parse_errors,
            report.drops.ignored
        )
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,scenario,users,elapsed,count,throughput,p50,p90,p99,dropped,ignored"
    }
}

fn format_throughput(value: Option<f64>) -> String {
    match value {
        Some(t) => format!("{:.2} req/s", t),
        None => "undefined".to_string(),
    }
}

fn format_latency(latency: &LatencyStats) -> String {
    format!(
        "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
        latency.p50, latency.p90, latency.p95, latency.p99, latency.max
    )
}
