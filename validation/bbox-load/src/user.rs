//! Virtual users: one simulated client running the query loop.

use rand::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::ScenarioConfig;
use crate::error::LoadError;
use crate::generator::{QueryGenerator, ThinkTime};
use crate::metrics::{DropReason, MetricsAggregator, RecordOutcome};
use crate::record::ResultRecord;
use crate::response::{parse_response, ResponseFieldMap};
use crate::transport::QueryTransport;

/// HTTP status treated as success. Everything else is a dropped sample.
pub const SUCCESS_STATUS: u16 = 200;

/// Result of a single iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Result counted by the aggregator.
    Recorded,
    /// Result produced but not counted (warm-up or finalized).
    Ignored,
    /// No result.
    Dropped(DropReason),
}

/// Per-user totals returned when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub user_id: u32,
    pub iterations: u64,
    pub recorded: u64,
    pub ignored: u64,
    pub dropped: u64,
}

impl UserStats {
    fn note(&mut self, outcome: IterationOutcome) {
        self.iterations += 1;
        match outcome {
            IterationOutcome::Recorded => self.recorded += 1,
            IterationOutcome::Ignored => self.ignored += 1,
            IterationOutcome::Dropped(_) => self.dropped += 1,
        }
    }
}

pub struct VirtualUser {
    id: u32,
    generator: QueryGenerator,
    think_time: ThinkTime,
    rng: StdRng,
    transport: Arc<dyn QueryTransport>,
    aggregator: Arc<MetricsAggregator>,
    fields: ResponseFieldMap,
    iteration_limit: Option<u64>,
}

impl VirtualUser {
    pub fn new(
        id: u32,
        config: &ScenarioConfig,
        transport: Arc<dyn QueryTransport>,
        aggregator: Arc<MetricsAggregator>,
    ) -> Self {
        let rng = match config.seed {
            // Keep think-time draws independent of the query stream
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64).rotate_left(32)),
            None => StdRng::from_entropy(),
        };
        Self {
            id,
            generator: QueryGenerator::for_user(config, id),
            think_time: ThinkTime::new(config.think_time_ms),
            rng,
            transport,
            aggregator,
            fields: config.response_fields.clone(),
            iteration_limit: config.iterations_per_user,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Run one query: generate, send, time, parse and hand off the result.
    pub async fn iterate(&mut self) -> IterationOutcome {
        let bbox = self.generator.generate().to_query_string();

        let started = Instant::now();
        let response = match self.transport.fetch(&bbox).await {
            Ok(response) => response,
            Err(e) => return self.drop_sample(e),
        };
        let client_latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        if response.status != SUCCESS_STATUS {
            return self.drop_sample(LoadError::NonSuccessStatus(response.status));
        }

        let parsed = match parse_response(&response.body, &self.fields) {
            Ok(parsed) => parsed,
            Err(e) => return self.drop_sample(e),
        };

        let record = ResultRecord {
            query_time_ms: parsed.query_time_ms,
            feature_count: parsed.feature_count,
            server_time_ms: parsed.server_time_ms,
            client_latency_ms,
        };
        match self.aggregator.record(&record) {
            RecordOutcome::Counted => IterationOutcome::Recorded,
            RecordOutcome::Ignored => IterationOutcome::Ignored,
        }
    }

    /// Loop until stop is broadcast or the iteration limit is reached.
    ///
    /// In-flight requests are not interrupted; stop is observed between
    /// iterations and during think time.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> UserStats {
        let mut stats = UserStats {
            user_id: self.id,
            ..Default::default()
        };
        debug!(user = self.id, "Virtual user started");

        loop {
            if *stop.borrow() || self.limit_reached(&stats) {
                break;
            }

            let outcome = self.iterate().await;
            stats.note(outcome);
            if self.limit_reached(&stats) {
                break;
            }

            let pause = self.think_time.sample(&mut self.rng);
            if pause.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = stop.changed() => {
                    // Sender gone means the run is over
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!(
            user = self.id,
            iterations = stats.iterations,
            recorded = stats.recorded,
            "Virtual user finished"
        );
        stats
    }

    fn limit_reached(&self, stats: &UserStats) -> bool {
        self.iteration_limit
            .map_or(false, |limit| stats.recorded >= limit)
    }

    fn drop_sample(&self, err: LoadError) -> IterationOutcome {
        let reason = DropReason::from_error(&err).unwrap_or(DropReason::Transport);
        match reason {
            DropReason::ResponseParse => warn!(user = self.id, error = %err, "Dropping sample"),
            DropReason::NonSuccessStatus => debug!(user = self.id, error = %err, "Dropping sample"),
            DropReason::Transport => debug!(user = self.id, error = %err, "Request failed"),
        }
        self.aggregator.record_drop(reason);
        IterationOutcome::Dropped(reason)
    }
}
