//! Stop handling: broadcast stop, finalize, close the log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::metrics::{MetricsAggregator, SummaryRecord};
use crate::sink::ResultSink;

pub struct ShutdownController {
    stop_tx: watch::Sender<bool>,
    aggregator: Arc<MetricsAggregator>,
    sink: Arc<ResultSink>,
    fired: AtomicBool,
}

impl ShutdownController {
    pub fn new(aggregator: Arc<MetricsAggregator>, sink: Arc<ResultSink>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx,
            aggregator,
            sink,
            fired: AtomicBool::new(false),
        }
    }

    /// Receiver handed to each virtual user.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Stop every user, finalize the metrics and close the log.
    ///
    /// Safe to call more than once; later calls return the first summary.
    pub fn on_stop_signal(&self) -> SummaryRecord {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("Stop already handled");
            if let Some(summary) = self.aggregator.summary() {
                return summary;
            }
        } else {
            info!("Stopping virtual users");
        }

        self.stop_tx.send_replace(true);
        let summary = self.aggregator.finalize();
        if let Err(e) = self.sink.close() {
            warn!(error = %e, "Failed to close result log");
        }
        summary
    }
}
