//! Run controller: one scheduler, pool and tracker per run, replaced on reset.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use stampede_core::RunConfig;
use tracing::info;

use crate::collab::{Collaborators, CompletionSink, ProgressSink};
use crate::pool::WorkerPool;
use crate::scheduler::{ScheduleHandler, Scheduler};
use crate::sync::lock;
use crate::task::{RunError, TaskPayload};
use crate::tracker::ActivityTracker;

/// Bridges scheduler signals to the pool and the caller's sinks.
struct RunHandler {
    pool: Arc<WorkerPool>,
    progress: Arc<dyn ProgressSink>,
    completion: Arc<dyn CompletionSink>,
}

impl ScheduleHandler for RunHandler {
    fn percent_complete(&self, percent: u8) {
        self.progress.percent_complete(percent);
    }

    fn dispatch(&self, index: usize, payload: TaskPayload) {
        self.pool.dispatch(index, payload);
    }

    fn wait_for_idle(&self) {
        self.pool.wait_for_idle();
    }

    fn work_finished(&self) {
        info!(workers = self.pool.len(), "work finished");
        self.completion.work_finished();
    }
}

/// Everything belonging to a single run.
struct Run {
    scheduler: Scheduler,
    pool: Arc<WorkerPool>,
    tracker: Arc<ActivityTracker>,
    stopped: bool,
}

impl Run {
    fn new(config: &RunConfig, collaborators: &Collaborators) -> Result<Self, RunError> {
        let tracker = ActivityTracker::start(
            Arc::clone(&collaborators.display),
            Duration::from_millis(config.sample_interval_ms),
        )?;
        let pool = Arc::new(WorkerPool::new(
            config.max_workers,
            Arc::clone(&collaborators.reporter),
            Arc::clone(&collaborators.display),
            Arc::clone(&tracker),
        ));
        let handler = Arc::new(RunHandler {
            pool: Arc::clone(&pool),
            progress: Arc::clone(&collaborators.progress),
            completion: Arc::clone(&collaborators.completion),
        });
        let scheduler = Scheduler::new(handler, Duration::from_millis(config.assumed_task_ms));
        Ok(Self { scheduler, pool, tracker, stopped: false })
    }

    /// Scheduler first, then workers, then the tracker. A stale callback
    /// can only come from a thread that has not been joined yet.
    fn shutdown(&mut self) {
        self.stopped = true;
        self.scheduler.stop();
        self.pool.stop_all();
        self.tracker.stop();
    }
}

/// A load test: populate with timed tasks, start, and optionally reset.
///
/// Collaborator callbacks must not call back into the same `LoadTest`;
/// `stop` and `reset` hold the run lock while joining threads that may be
/// running those callbacks.
pub struct LoadTest {
    config: RunConfig,
    collaborators: Collaborators,
    run: Mutex<Run>,
}

impl LoadTest {
    pub fn new(config: RunConfig, collaborators: Collaborators) -> Result<Self, RunError> {
        config.validate()?;
        let run = Run::new(&config, &collaborators)?;
        Ok(Self {
            config,
            collaborators,
            run: Mutex::new(run),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Schedule `payload` at `offset_ms` after start. Returns its index.
    pub fn add_task(&self, offset_ms: u64, payload: TaskPayload) -> Result<usize, RunError> {
        let run = lock(&self.run);
        if run.stopped {
            return Err(RunError::InvalidState("load test stopped, reset before adding tasks"));
        }
        run.scheduler.add_task(offset_ms, payload)
    }

    pub fn start(&self) -> Result<(), RunError> {
        let run = lock(&self.run);
        if run.stopped {
            return Err(RunError::InvalidState("load test stopped, reset before starting"));
        }
        run.scheduler.start()?;
        info!(
            tasks = run.scheduler.pending(),
            max_workers = self.config.max_workers,
            "load test started"
        );
        Ok(())
    }

    /// End the current run without starting a new one. In-flight tasks
    /// finish and report before this returns; nothing fires afterwards.
    /// Adding tasks or starting again requires [`reset`](Self::reset).
    pub fn stop(&self) {
        lock(&self.run).shutdown();
        info!("load test stopped");
    }

    /// Stop the current run and replace it with a fresh, empty one.
    pub fn reset(&self) -> Result<(), RunError> {
        let mut run = lock(&self.run);
        run.shutdown();
        *run = Run::new(&self.config, &self.collaborators)?;
        info!("load test reset");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        lock(&self.run).scheduler.is_started()
    }

    pub fn pending_tasks(&self) -> usize {
        lock(&self.run).scheduler.pending()
    }

    pub fn worker_count(&self) -> usize {
        lock(&self.run).pool.len()
    }
}

impl Drop for LoadTest {
    fn drop(&mut self) {
        let run = self.run.get_mut().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !run.stopped {
            run.shutdown();
        }
    }
}
