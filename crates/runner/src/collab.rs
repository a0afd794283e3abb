//! Capabilities the surrounding application supplies to a run.

use std::sync::Arc;

use crate::pool::Worker;

/// Elapsed value reported for a task that was never attempted because
/// every worker was busy and the pool was at capacity.
pub const NOT_ATTEMPTED: i64 = -1;

/// Receives the outcome of every scheduled task.
///
/// Reports from one worker arrive in the order it ran its tasks; reports
/// from different workers may interleave arbitrarily.
pub trait ResultReporter: Send + Sync {
    fn succeeded(&self, index: usize, elapsed_ms: i64);

    /// `elapsed_ms` is [`NOT_ATTEMPTED`] when the dispatch was rejected.
    fn failed(&self, index: usize, elapsed_ms: i64);
}

pub trait ProgressSink: Send + Sync {
    /// Called when the integer percentage through the schedule changes.
    fn percent_complete(&self, percent: u8);
}

pub trait CompletionSink: Send + Sync {
    /// Called once per run, after every dispatched task has reported.
    fn work_finished(&self);
}

/// Live view of the worker pool. Both calls are fire-and-forget.
pub trait DisplayCollaborator: Send + Sync {
    /// Called once when a worker is created.
    fn attach_worker_view(&self, worker: &Worker);

    /// Called by the activity tracker while the worker is busy, and once
    /// more after its task finishes.
    fn tick(&self, worker: &Worker);
}

/// Display that ignores every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplayCollaborator for NullDisplay {
    fn attach_worker_view(&self, _worker: &Worker) {}
    fn tick(&self, _worker: &Worker) {}
}

impl ProgressSink for NullDisplay {
    fn percent_complete(&self, _percent: u8) {}
}

/// The full set of collaborators one [`LoadTest`](crate::LoadTest) reports to.
#[derive(Clone)]
pub struct Collaborators {
    pub reporter: Arc<dyn ResultReporter>,
    pub progress: Arc<dyn ProgressSink>,
    pub completion: Arc<dyn CompletionSink>,
    pub display: Arc<dyn DisplayCollaborator>,
}

impl Collaborators {
    /// Collaborators with no progress or display output.
    pub fn new(reporter: Arc<dyn ResultReporter>, completion: Arc<dyn CompletionSink>) -> Self {
        Self {
            reporter,
            progress: Arc::new(NullDisplay),
            completion,
            display: Arc::new(NullDisplay),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_display(mut self, display: Arc<dyn DisplayCollaborator>) -> Self {
        self.display = display;
        self
    }
}
