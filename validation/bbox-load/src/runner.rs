//! Load run orchestration: hatching users, lifecycle events and shutdown.

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::config::ScenarioConfig;
use crate::metrics::MetricsAggregator;
use crate::ramp::RampCoordinator;
use crate::record::header_fields;
use crate::report::RunReport;
use crate::shutdown::ShutdownController;
use crate::sink::ResultSink;
use crate::transport::{HttpTransport, QueryTransport};
use crate::user::{UserStats, VirtualUser};

const PROGRESS_TICK: Duration = Duration::from_millis(250);

/// Signals that drive a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Target concurrency reached; start counting.
    TargetReached { user_count: u32 },
    /// End the run.
    Stop,
}

/// Sends lifecycle events into a running [`LoadRunner`].
#[derive(Debug, Clone)]
pub struct RunHandle {
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl RunHandle {
    /// Returns false once the run is over.
    pub fn send(&self, event: LifecycleEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn target_reached(&self, user_count: u32) -> bool {
        self.send(LifecycleEvent::TargetReached { user_count })
    }

    pub fn stop(&self) -> bool {
        self.send(LifecycleEvent::Stop)
    }
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Requested,
    Interrupted,
    DurationElapsed,
    UsersFinished,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Requested => "stop requested",
            StopReason::Interrupted => "interrupted",
            StopReason::DurationElapsed => "duration elapsed",
            StopReason::UsersFinished => "all users finished",
        };
        f.write_str(text)
    }
}

/// Executes a scenario with a population of virtual users.
pub struct LoadRunner {
    config: ScenarioConfig,
    transport: Arc<dyn QueryTransport>,
    show_progress: bool,
    handle_signals: bool,
    events_tx: mpsc::UnboundedSender<LifecycleEvent>,
    events_rx: mpsc::UnboundedReceiver<LifecycleEvent>,
}

impl LoadRunner {
    /// Create a runner that talks HTTP to the scenario's endpoint.
    pub fn new(config: ScenarioConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::from_config(&config).context("Failed to create HTTP client")?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a runner with a custom transport.
    pub fn with_transport(
        config: ScenarioConfig,
        transport: Arc<dyn QueryTransport>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            transport,
            show_progress: false,
            handle_signals: true,
            events_tx,
            events_rx,
        })
    }

    /// Show a live spinner on stderr.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Stop on ctrl-c (on by default).
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle {
            events: self.events_tx.clone(),
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Run until stopped, then finalize, close the log and report.
    pub async fn run(mut self) -> anyhow::Result<RunReport> {
        let output_path = self.config.resolve_output_path();
        let sink = Arc::new(
            ResultSink::create(&output_path)
                .with_context(|| format!("Failed to create result log {}", output_path.display()))?,
        );
        let columns = self.config.output.columns.clone();
        let ramp = Arc::new(RampCoordinator::new(sink.clone(), header_fields(&columns)));
        let aggregator = Arc::new(MetricsAggregator::new(ramp.clone(), sink.clone(), columns)?);
        let shutdown = ShutdownController::new(aggregator.clone(), sink.clone());

        let target = self.config.target_concurrency;
        info!(
            scenario = %self.config.name,
            url = %self.config.endpoint_url(),
            users = target,
            log = %output_path.display(),
            "Starting load run"
        );

        let progress = self.show_progress.then(spinner);
        let mut progress_tick = tokio::time::interval(PROGRESS_TICK);

        let mut users: JoinSet<UserStats> = JoinSet::new();
        let mut user_stats: Vec<UserStats> = Vec::with_capacity(target as usize);
        let mut spawned: u32 = 0;

        // Without a spawn rate everyone hatches at once
        let hatch_period = match self.config.spawn_rate {
            Some(rate) => Duration::from_secs_f64(1.0 / rate).max(Duration::from_millis(1)),
            None => {
                while spawned < target {
                    self.spawn_user(spawned, &mut users, &aggregator, &shutdown);
                    spawned += 1;
                }
                self.hatch_complete(spawned);
                Duration::from_secs(1)
            }
        };
        let mut hatch = tokio::time::interval(hatch_period);

        let has_deadline = self.config.duration_secs.is_some();
        let deadline = tokio::time::sleep(Duration::from_secs(self.config.duration_secs.unwrap_or(0)));
        tokio::pin!(deadline);

        let mut listen_ctrl_c = self.handle_signals;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let started = Instant::now();
        let stop_reason = loop {
            tokio::select! {
                _ = hatch.tick(), if spawned < target => {
                    self.spawn_user(spawned, &mut users, &aggregator, &shutdown);
                    spawned += 1;
                    if spawned == target {
                        self.hatch_complete(spawned);
                    }
                }
                Some(event) = self.events_rx.recv() => match event {
                    LifecycleEvent::TargetReached { user_count } => {
                        ramp.on_target_reached(user_count);
                    }
                    LifecycleEvent::Stop => break StopReason::Requested,
                },
                _ = &mut deadline, if has_deadline => break StopReason::DurationElapsed,
                result = &mut ctrl_c, if listen_ctrl_c => match result {
                    Ok(()) => break StopReason::Interrupted,
                    Err(e) => {
                        warn!(error = %e, "Cannot listen for ctrl-c");
                        listen_ctrl_c = false;
                    }
                },
                Some(joined) = users.join_next(), if !users.is_empty() => {
                    collect_stats(&mut user_stats, joined);
                    if users.is_empty() && spawned == target {
                        break StopReason::UsersFinished;
                    }
                }
                _ = progress_tick.tick(), if progress.is_some() => {
                    if let Some(pb) = &progress {
                        pb.set_message(progress_message(spawned, target, &aggregator));
                    }
                }
            }
        };
        info!(reason = %stop_reason, elapsed_secs = started.elapsed().as_secs_f64(), "Stopping run");

        let summary = shutdown.on_stop_signal();

        // In-flight requests may still complete; their results are ignored
        let drain = Duration::from_secs(self.config.drain_timeout_secs);
        let drained = tokio::time::timeout(drain, async {
            while let Some(joined) = users.join_next().await {
                collect_stats(&mut user_stats, joined);
            }
        })
        .await;
        if drained.is_err() {
            warn!(remaining = users.len(), "Aborting users still in flight");
            users.abort_all();
            while users.join_next().await.is_some() {}
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Ok(RunReport::new(
            &self.config,
            spawned,
            stop_reason,
            summary,
            aggregator.drop_counts(),
            aggregator.latency_stats(),
            &user_stats,
            sink.path(),
        ))
    }

    fn spawn_user(
        &self,
        id: u32,
        users: &mut JoinSet<UserStats>,
        aggregator: &Arc<MetricsAggregator>,
        shutdown: &ShutdownController,
    ) {
        let user = VirtualUser::new(id, &self.config, self.transport.clone(), aggregator.clone());
        users.spawn(user.run(shutdown.subscribe()));
        debug!(user = id, "Hatched virtual user");
    }

    fn hatch_complete(&self, user_count: u32) {
        info!(user_count, "All users hatched");
        let _ = self.events_tx.send(LifecycleEvent::TargetReached { user_count });
    }
}

fn collect_stats(stats: &mut Vec<UserStats>, joined: Result<UserStats, JoinError>) {
    match joined {
        Ok(user) => stats.push(user),
        Err(e) if e.is_cancelled() => {}
        Err(e) => warn!(error = %e, "Virtual user task failed"),
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(PROGRESS_TICK);
    pb
}

fn progress_message(spawned: u32, target: u32, aggregator: &MetricsAggregator) -> String {
    let status = aggregator.ramp().snapshot();
    let phase = if status.active { "counting" } else { "ramping up" };
    format!(
        "users {}/{} | {} | counted {}",
        spawned, target, phase, status.request_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThinkTimeRange;
    use crate::error::LoadResult;
    use crate::transport::TransportResponse;
    use async_trait::async_trait;
    use test_utils::responses;

    struct OkTransport;

    #[async_trait]
    impl QueryTransport for OkTransport {
        async fn fetch(&self, _bbox: &str) -> LoadResult<TransportResponse> {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok(TransportResponse::new(200, responses::FEATURESERVER_OK))
        }
    }

    fn scenario(dir: &std::path::Path) -> ScenarioConfig {
        let mut config = ScenarioConfig::preset("featureserver", "http://localhost").unwrap();
        config.target_concurrency = 3;
        config.spawn_rate = None;
        config.duration_secs = None;
        config.think_time_ms = ThinkTimeRange { min: 10, max: 10 };
        config.drain_timeout_secs = 1;
        config.output.path = Some(dir.join("run.log"));
        config
    }

    #[tokio::test]
    async fn test_handle_stop_ends_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = LoadRunner::with_transport(scenario(dir.path()), Arc::new(OkTransport))
            .unwrap()
            .with_signal_handling(false);
        let handle = runner.handle();

        let task = tokio::spawn(runner.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.stop());

        let report = task.await.unwrap().unwrap();
        assert_eq!(report.stop_reason, StopReason::Requested);
        assert_eq!(report.users_spawned, 3);
        assert!(report.summary.total_count > 0);
        assert!(report.summary.throughput_per_second.is_some());

        let log = std::fs::read_to_string(dir.path().join("run.log")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "numFeatures, responseTime");
        assert_eq!(lines.len() as u64, report.summary.total_count + 2);
        assert!(lines.last().unwrap().starts_with("throughput: "));
    }

    #[tokio::test]
    async fn test_duration_ends_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = scenario(dir.path());
        config.duration_secs = Some(1);
        let report = LoadRunner::with_transport(config, Arc::new(OkTransport))
            .unwrap()
            .with_signal_handling(false)
            .run()
            .await
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::DurationElapsed);
    }

    #[tokio::test]
    async fn test_spawn_rate_hatches_gradually() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = scenario(dir.path());
        config.spawn_rate = Some(50.0);
        config.iterations_per_user = Some(2);
        let report = LoadRunner::with_transport(config, Arc::new(OkTransport))
            .unwrap()
            .with_signal_handling(false)
            .run()
            .await
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::UsersFinished);
        assert_eq!(report.users_spawned, 3);
        assert_eq!(report.summary.total_count, 6);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = scenario(dir.path());
        config.target_concurrency = 0;
        assert!(LoadRunner::with_transport(config, Arc::new(OkTransport)).is_err());
    }

    #[test]
    fn test_handle_reports_closed_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = LoadRunner::with_transport(scenario(dir.path()), Arc::new(OkTransport)).unwrap();
        let handle = runner.handle();
        assert!(handle.target_reached(3));
        drop(runner);
        assert!(!handle.stop());
    }
}
