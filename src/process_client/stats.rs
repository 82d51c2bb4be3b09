//! Correlation counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::correlation::CorrelationOutcome;

/// Lock-free counters shared by clones of a `ProcessClient`
#[derive(Debug, Default)]
pub struct CorrelationStats {
    started: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    active: AtomicUsize,
}

/// Point-in-time copy of [`CorrelationStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationStatsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub failed: u64,
    /// Calls currently holding a dedicated subscription connection
    pub active: usize,
}

impl CorrelationStats {
    /// Count a new call; the returned guard decrements `active` when dropped
    pub(crate) fn begin(self: &Arc<Self>) -> ActiveGuard {
        self.started.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::SeqCst);
        ActiveGuard {
            stats: Arc::clone(self),
        }
    }

    pub(crate) fn record_outcome(&self, outcome: &CorrelationOutcome) {
        match outcome {
            CorrelationOutcome::Completed(_) => self.completed.fetch_add(1, Ordering::Relaxed),
            CorrelationOutcome::TimedOut(_) => self.timed_out.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CorrelationStatsSnapshot {
        CorrelationStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            active: self.active.load(Ordering::SeqCst),
        }
    }
}

/// Keeps `active` accurate even when the awaiting future is dropped mid-call
#[derive(Debug)]
pub(crate) struct ActiveGuard {
    stats: Arc<CorrelationStats>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
    }
}
