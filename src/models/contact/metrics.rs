use std::sync::atomic::{AtomicU64, Ordering};

/// Evaluation counters owned by an objective. Safe to update from any thread.
#[derive(Debug, Default)]
pub struct ObjectiveMetrics {
    evaluations: AtomicU64,
    non_finite: AtomicU64,
}

/// Point-in-time copy of [`ObjectiveMetrics`] plus the pool size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub evaluations: u64,
    pub non_finite: u64,
    pub clones: usize,
}

impl ObjectiveMetrics {
    pub fn record(&self, value: f64) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        if !value.is_finite() {
            self.non_finite.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, clones: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            non_finite: self.non_finite.load(Ordering::Relaxed),
            clones,
        }
    }
}
