use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::collab::ResultReporter;
use crate::sync::{join_unless_current, lock, wait};
use crate::task::{RunError, TaskPayload};
use crate::tracker::ActivityTracker;

/// Point-in-time view of a worker for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerSnapshot {
    pub slot: usize,
    pub busy: bool,
    pub task_index: Option<usize>,
    /// Milliseconds into the current task, 0 when idle.
    pub current_ms: u64,
    /// Elapsed time of the most recent completed task, 0 if none.
    pub last_ms: u64,
    /// Elapsed time of the task before that, 0 if none.
    pub previous_ms: u64,
}

struct Assignment {
    index: usize,
    payload: TaskPayload,
}

#[derive(Default)]
struct WorkerState {
    current: Option<Assignment>,
    started_at: Option<Instant>,
    last_elapsed_ms: u64,
    previous_elapsed_ms: u64,
    stop: bool,
}

/// A dedicated thread that runs one task at a time.
///
/// States: idle, busy, idle, ... and finally stopped. The two-slot
/// elapsed history is written only by the worker's own thread.
pub struct Worker {
    slot: usize,
    state: Mutex<WorkerState>,
    changed: Condvar,
    reporter: Arc<dyn ResultReporter>,
    tracker: Arc<ActivityTracker>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Create a worker and start its execution thread.
    pub fn spawn(
        slot: usize,
        reporter: Arc<dyn ResultReporter>,
        tracker: Arc<ActivityTracker>,
    ) -> Result<Arc<Self>, RunError> {
        let worker = Arc::new(Self {
            slot,
            state: Mutex::new(WorkerState::default()),
            changed: Condvar::new(),
            reporter,
            tracker,
            thread: Mutex::new(None),
        });

        let runner = Arc::clone(&worker);
        let handle = thread::Builder::new()
            .name(format!("load-worker-{slot}"))
            .spawn(move || runner.run_loop())?;
        *lock(&worker.thread) = Some(handle);

        debug!(slot, "worker started");
        Ok(worker)
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.state).current.is_some()
    }

    /// Assign a task if idle. Returns false without effect when busy or stopped.
    pub fn task(&self, index: usize, payload: TaskPayload) -> bool {
        let mut state = lock(&self.state);
        if state.current.is_some() || state.stop {
            return false;
        }
        state.current = Some(Assignment { index, payload });
        state.started_at = None;
        self.changed.notify_all();
        true
    }

    /// Block until the worker has no task in flight.
    pub fn wait_for_idle(&self) {
        let mut state = lock(&self.state);
        while state.current.is_some() {
            state = wait(&self.changed, state);
        }
    }

    pub fn last_elapsed_ms(&self) -> u64 {
        lock(&self.state).last_elapsed_ms
    }

    pub fn previous_elapsed_ms(&self) -> u64 {
        lock(&self.state).previous_elapsed_ms
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        let state = lock(&self.state);
        let current_ms = match (&state.current, state.started_at) {
            (Some(_), Some(started)) => elapsed_ms(started),
            _ => 0,
        };
        WorkerSnapshot {
            slot: self.slot,
            busy: state.current.is_some(),
            task_index: state.current.as_ref().map(|a| a.index),
            current_ms,
            last_ms: state.last_elapsed_ms,
            previous_ms: state.previous_elapsed_ms,
        }
    }

    /// Stop the execution thread and wait for it to exit.
    ///
    /// A task already running is allowed to finish and report first.
    /// Safe to call more than once.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.state);
            state.stop = true;
            self.changed.notify_all();
        }
        // Holding the handle slot while joining makes concurrent callers wait too.
        let mut thread = lock(&self.thread);
        if let Some(handle) = thread.take() {
            join_unless_current(handle, "worker");
            debug!(slot = self.slot, "worker stopped");
        }
    }

    fn run_loop(self: Arc<Self>) {
        loop {
            let (index, payload, started) = {
                let mut state = lock(&self.state);
                while state.current.is_none() && !state.stop {
                    state = wait(&self.changed, state);
                }
                if state.stop {
                    break;
                }
                let started = Instant::now();
                state.started_at = Some(started);
                let Some(assignment) = state.current.as_ref() else {
                    continue;
                };
                (assignment.index, Arc::clone(&assignment.payload), started)
            };

            self.tracker.start_activity(Arc::clone(&self));

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| payload.execute()));
            let elapsed = elapsed_ms(started);
            {
                let mut state = lock(&self.state);
                state.previous_elapsed_ms = state.last_elapsed_ms;
                state.last_elapsed_ms = elapsed;
            }

            let reported = i64::try_from(elapsed).unwrap_or(i64::MAX);
            match outcome {
                Ok(Ok(())) => {
                    debug!(slot = self.slot, index, elapsed_ms = elapsed, task = payload.name(), "task succeeded");
                    self.reporter.succeeded(index, reported);
                }
                Ok(Err(e)) => {
                    debug!(slot = self.slot, index, elapsed_ms = elapsed, error = %e, "task failed");
                    self.reporter.failed(index, reported);
                }
                Err(_) => {
                    warn!(slot = self.slot, index, elapsed_ms = elapsed, task = payload.name(), "task panicked");
                    self.reporter.failed(index, reported);
                }
            }

            self.tracker.stop_activity(&self);

            let mut state = lock(&self.state);
            state.current = None;
            state.started_at = None;
            self.changed.notify_all();
        }

        // An assignment that never started is dropped so idle waiters wake.
        let mut state = lock(&self.state);
        state.current = None;
        self.changed.notify_all();
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::collab::NullDisplay;
    use crate::task::FnTask;

    #[derive(Default)]
    struct RecordingReporter {
        results: Mutex<Vec<(usize, i64, bool)>>,
    }

    impl ResultReporter for RecordingReporter {
        fn succeeded(&self, index: usize, elapsed_ms: i64) {
            self.results.lock().unwrap().push((index, elapsed_ms, true));
        }
        fn failed(&self, index: usize, elapsed_ms: i64) {
            self.results.lock().unwrap().push((index, elapsed_ms, false));
        }
    }

    fn tracker() -> Arc<ActivityTracker> {
        ActivityTracker::start(Arc::new(NullDisplay), Duration::from_millis(5)).unwrap()
    }

    fn sleeper(ms: u64) -> TaskPayload {
        FnTask::payload("sleep", move || {
            thread::sleep(Duration::from_millis(ms));
            Ok(())
        })
    }

    #[test]
    fn runs_task_and_reports_success() {
        let reporter = Arc::new(RecordingReporter::default());
        let tracker = tracker();
        let worker = Worker::spawn(0, reporter.clone(), tracker.clone()).unwrap();

        assert!(worker.task(7, sleeper(10)));
        worker.wait_for_idle();

        let results = reporter.results.lock().unwrap().clone();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 7);
        assert!(results[0].1 >= 10, "elapsed {} should cover the sleep", results[0].1);
        assert!(results[0].2);

        worker.stop();
        tracker.stop();
    }

    #[test]
    fn rejects_second_task_while_busy() {
        let reporter = Arc::new(RecordingReporter::default());
        let tracker = tracker();
        let worker = Worker::spawn(0, reporter.clone(), tracker.clone()).unwrap();

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let blocking = FnTask::payload("block", move || {
            let _ = release_rx.lock().unwrap().recv();
            Ok(())
        });

        assert!(worker.task(0, blocking));
        assert!(worker.is_busy());
        assert!(!worker.task(1, sleeper(1)));

        release_tx.send(()).unwrap();
        worker.wait_for_idle();
        assert!(!worker.is_busy());
        assert_eq!(reporter.results.lock().unwrap().len(), 1);

        worker.stop();
        tracker.stop();
    }

    #[test]
    fn error_and_panic_become_failed_reports() {
        let reporter = Arc::new(RecordingReporter::default());
        let tracker = tracker();
        let worker = Worker::spawn(3, reporter.clone(), tracker.clone()).unwrap();

        assert!(worker.task(0, FnTask::payload("err", || anyhow::bail!("did not match"))));
        worker.wait_for_idle();
        assert!(worker.task(1, FnTask::payload("panic", || panic!("boom"))));
        worker.wait_for_idle();
        // Thread survived both and still takes work.
        assert!(worker.task(2, sleeper(1)));
        worker.wait_for_idle();

        let results = reporter.results.lock().unwrap().clone();
        let outcomes: Vec<(usize, bool)> = results.iter().map(|r| (r.0, r.2)).collect();
        assert_eq!(outcomes, vec![(0, false), (1, false), (2, true)]);
        assert!(results.iter().all(|r| r.1 >= 0));

        worker.stop();
        tracker.stop();
    }

    #[test]
    fn keeps_two_slot_elapsed_history() {
        let reporter = Arc::new(RecordingReporter::default());
        let tracker = tracker();
        let worker = Worker::spawn(0, reporter.clone(), tracker.clone()).unwrap();
        assert_eq!(worker.previous_elapsed_ms(), 0);
        assert_eq!(worker.last_elapsed_ms(), 0);

        assert!(worker.task(0, sleeper(30)));
        worker.wait_for_idle();
        let first = worker.last_elapsed_ms();
        assert_eq!(worker.previous_elapsed_ms(), 0);

        assert!(worker.task(1, sleeper(1)));
        worker.wait_for_idle();
        assert_eq!(worker.previous_elapsed_ms(), first);

        let snapshot = worker.snapshot();
        assert_eq!(snapshot.previous_ms, first);
        assert!(!snapshot.busy);
        assert_eq!(snapshot.current_ms, 0);

        worker.stop();
        tracker.stop();
    }

    #[test]
    fn stop_is_idempotent_and_refuses_new_work() {
        let reporter = Arc::new(RecordingReporter::default());
        let tracker = tracker();
        let worker = Worker::spawn(0, reporter.clone(), tracker.clone()).unwrap();
        worker.stop();
        worker.stop();
        assert!(!worker.task(0, sleeper(1)));
        worker.wait_for_idle();
        tracker.stop();
    }

    #[test]
    fn stop_waits_for_running_task() {
        let reporter = Arc::new(RecordingReporter::default());
        let tracker = tracker();
        let worker = Worker::spawn(0, reporter.clone(), tracker.clone()).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in_task = ran.clone();
        assert!(worker.task(
            0,
            FnTask::payload("slow", move || {
                thread::sleep(Duration::from_millis(40));
                ran_in_task.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        ));
        // Give the thread a moment to pick the task up.
        thread::sleep(Duration::from_millis(10));
        worker.stop();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.results.lock().unwrap().len(), 1);
        tracker.stop();
    }
}
