//! Shared helpers for bbox-load integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bbox_load::config::ThinkTimeRange;
use bbox_load::{LoadResult, QueryTransport, ScenarioConfig, TransportResponse};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Answers every query with the same status and body after a fixed delay.
pub struct MockTransport {
    status: u16,
    body: String,
    delay: Duration,
    calls: AtomicU64,
    queries: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn ok(body: impl Into<String>, delay: Duration) -> Self {
        Self::with_status(200, body, delay)
    }

    pub fn with_status(status: u16, body: impl Into<String>, delay: Duration) -> Self {
        Self {
            status,
            body: body.into(),
            delay,
            calls: AtomicU64::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every bbox string received, in arrival order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryTransport for MockTransport {
    async fn fetch(&self, bbox: &str) -> LoadResult<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(bbox.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(TransportResponse::new(self.status, self.body.clone()))
    }
}

/// Feature server preset writing its log into `dir`, with no think time,
/// no duration and everyone hatched at once.
pub fn featureserver_scenario(dir: &Path, users: u32) -> ScenarioConfig {
    let mut config = ScenarioConfig::preset("featureserver", "http://localhost:8080").unwrap();
    config.target_concurrency = users;
    config.spawn_rate = None;
    config.duration_secs = None;
    config.think_time_ms = ThinkTimeRange { min: 0, max: 0 };
    config.drain_timeout_secs = 2;
    config.seed = Some(2024);
    config.output.path = Some(dir.join("run.log"));
    config
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
