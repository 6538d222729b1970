//! Ramp-up gating.
//!
//! Results are only counted once the target number of virtual users is
//! running. The switch happens once and never reverts.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::sink::ResultSink;

/// Measurement window state shared by the ramp and the aggregator.
#[derive(Debug, Clone, Default)]
pub struct RampStatus {
    /// False while warming up.
    pub active: bool,
    /// Captured on the transition to active.
    pub started_at: Option<Instant>,
    /// Users reported by the "target reached" signal.
    pub user_count: u32,
    /// Results counted since the transition.
    pub request_count: u64,
    /// Set once by finalize; the window is frozen afterwards.
    pub elapsed_seconds: Option<f64>,
}

impl RampStatus {
    /// True once finalize has closed the measurement window.
    pub fn is_frozen(&self) -> bool {
        self.elapsed_seconds.is_some()
    }

    /// True when a result arriving now would be counted.
    pub fn is_counting(&self) -> bool {
        self.active && !self.is_frozen()
    }
}

/// Owns [`RampStatus`] and performs the one-way warm-up → active transition.
///
/// The same mutex guards the transition, every counted result and finalize,
/// which orders them: a result counted after the transition sees it, and
/// finalize sees every counted result.
pub struct RampCoordinator {
    status: Mutex<RampStatus>,
    sink: Arc<ResultSink>,
    header: Vec<&'static str>,
}

impl RampCoordinator {
    /// `header` is written to the sink when the ramp completes.
    pub fn new(sink: Arc<ResultSink>, header: Vec<&'static str>) -> Self {
        Self {
            status: Mutex::new(RampStatus::default()),
            sink,
            header,
        }
    }

    /// Handle the "target concurrency reached" signal.
    ///
    /// Only the first call on a warming, unfrozen window does anything:
    /// it writes the header, captures the start time and resets the count.
    /// Returns whether this call performed the transition.
    pub fn on_target_reached(&self, user_count: u32) -> bool {
        let mut status = self.lock();
        if status.active || status.is_frozen() {
            debug!(user_count, "Ignoring repeated ramp signal");
            return false;
        }

        if let Err(e) = self.sink.write_header(&self.header) {
            warn!(error = %e, "Failed to write result log header");
        }
        status.active = true;
        status.started_at = Some(Instant::now());
        status.user_count = user_count;
        status.request_count = 0;

        info!(user_count, "Ramp-up complete, counting results");
        true
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Copy of the current status.
    pub fn snapshot(&self) -> RampStatus {
        self.lock().clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RampStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::SharedBuffer;

    fn coordinator() -> (RampCoordinator, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let sink = Arc::new(ResultSink::from_writer(buffer.clone()));
        (
            RampCoordinator::new(sink, vec!["numFeatures", "responseTime"]),
            buffer,
        )
    }

    #[test]
    fn test_starts_warming() {
        let (ramp, buffer) = coordinator();
        let status = ramp.snapshot();
        assert!(!status.active);
        assert!(status.started_at.is_none());
        assert!(!status.is_counting());
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_transition_writes_header_once() {
        let (ramp, buffer) = coordinator();
        assert!(ramp.on_target_reached(10));
        assert!(!ramp.on_target_reached(10));
        assert!(!ramp.on_target_reached(12));

        let status = ramp.snapshot();
        assert!(status.active);
        assert!(status.started_at.is_some());
        assert_eq!(status.user_count, 10);
        assert_eq!(buffer.lines(), vec!["numFeatures, responseTime"]);
    }

    #[test]
    fn test_transition_resets_count() {
        let (ramp, _buffer) = coordinator();
        ramp.lock().request_count = 99;
        ramp.on_target_reached(5);
        assert_eq!(ramp.snapshot().request_count, 0);
    }

    #[test]
    fn test_frozen_window_cannot_activate() {
        let (ramp, buffer) = coordinator();
        ramp.lock().elapsed_seconds = Some(0.0);
        assert!(!ramp.on_target_reached(10));
        assert!(!ramp.is_active());
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_concurrent_signals_transition_once() {
        let (ramp, buffer) = coordinator();
        let ramp = Arc::new(ramp);
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let ramp = ramp.clone();
                std::thread::spawn(move || ramp.on_target_reached(i))
            })
            .collect();
        let transitions = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|performed| *performed)
            .count();
        assert_eq!(transitions, 1);
        assert_eq!(buffer.lines().len(), 1);
    }
}
