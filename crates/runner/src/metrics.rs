use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collab::{ResultReporter, NOT_ATTEMPTED};
use crate::sync::lock;

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub succeeded: u64,
    pub failed: u64,
    /// Tasks never attempted because the pool was saturated.
    pub rejected: u64,
    pub min_elapsed_ms: Option<i64>,
    pub max_elapsed_ms: Option<i64>,
    /// Mean elapsed time over attempted tasks.
    pub mean_elapsed_ms: f64,
    pub first_result_at: Option<DateTime<Utc>>,
    pub last_result_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.rejected
    }

    pub fn attempted(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// True when every reported task succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.rejected == 0
    }

    /// Record one result.
    pub fn record(&mut self, elapsed_ms: i64, success: bool) {
        let now = Utc::now();
        self.first_result_at.get_or_insert(now);
        self.last_result_at = Some(now);

        if elapsed_ms == NOT_ATTEMPTED {
            self.rejected += 1;
            return;
        }
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }

        self.min_elapsed_ms = Some(self.min_elapsed_ms.map_or(elapsed_ms, |m| m.min(elapsed_ms)));
        self.max_elapsed_ms = Some(self.max_elapsed_ms.map_or(elapsed_ms, |m| m.max(elapsed_ms)));

        // Incremental mean: new_avg = prev_avg + (x - prev_avg) / count
        let count = self.attempted() as f64;
        self.mean_elapsed_ms += (elapsed_ms as f64 - self.mean_elapsed_ms) / count;
    }
}

/// Reporter that accumulates a [`RunSummary`] and forwards every result.
pub struct SummaryReporter {
    inner: Arc<dyn ResultReporter>,
    summary: Mutex<RunSummary>,
}

impl SummaryReporter {
    pub fn new(inner: Arc<dyn ResultReporter>) -> Self {
        Self {
            inner,
            summary: Mutex::new(RunSummary::default()),
        }
    }

    pub fn summary(&self) -> RunSummary {
        lock(&self.summary).clone()
    }

    /// Clear the accumulated summary, e.g. after a reset.
    pub fn clear(&self) {
        *lock(&self.summary) = RunSummary::default();
    }
}

impl ResultReporter for SummaryReporter {
    fn succeeded(&self, index: usize, elapsed_ms: i64) {
        lock(&self.summary).record(elapsed_ms, true);
        self.inner.succeeded(index, elapsed_ms);
    }

    fn failed(&self, index: usize, elapsed_ms: i64) {
        lock(&self.summary).record(elapsed_ms, false);
        self.inner.failed(index, elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Discard;

    impl ResultReporter for Discard {
        fn succeeded(&self, _index: usize, _elapsed_ms: i64) {}
        fn failed(&self, _index: usize, _elapsed_ms: i64) {}
    }

    #[test]
    fn rejected_results_do_not_skew_timings() {
        let mut s = RunSummary::default();
        s.record(100, true);
        s.record(NOT_ATTEMPTED, false);
        s.record(300, false);

        assert_eq!(s.succeeded, 1);
        assert_eq!(s.failed, 1);
        assert_eq!(s.rejected, 1);
        assert_eq!(s.total(), 3);
        assert_eq!(s.min_elapsed_ms, Some(100));
        assert_eq!(s.max_elapsed_ms, Some(300));
        assert!((s.mean_elapsed_ms - 200.0).abs() < 1e-9);
        assert!(!s.all_succeeded());
    }

    #[test]
    fn default_summary() {
        let s = RunSummary::default();
        assert_eq!(s.total(), 0);
        assert!(s.all_succeeded());
        assert!(s.min_elapsed_ms.is_none());
        assert!(s.first_result_at.is_none());
    }

    #[test]
    fn reporter_accumulates_and_clears() {
        let reporter = SummaryReporter::new(Arc::new(Discard));
        reporter.succeeded(0, 10);
        reporter.failed(1, NOT_ATTEMPTED);
        let summary = reporter.summary();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.rejected, 1);
        assert!(summary.first_result_at.is_some());

        reporter.clear();
        assert_eq!(reporter.summary().total(), 0);
    }

    #[test]
    fn summary_serializes() {
        let mut s = RunSummary::default();
        s.record(42, true);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["max_elapsed_ms"], 42);
    }
}
