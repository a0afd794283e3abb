use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::info;

use crate::sync::{join_unless_current, lock};
use crate::task::{RunError, TaskPayload};

use super::timeline::Timeline;

/// Receives the scheduler's signals. Implemented by the run controller.
pub trait ScheduleHandler: Send + Sync {
    /// The integer percentage through the estimated run changed.
    fn percent_complete(&self, percent: u8);

    /// A task reached its offset. Must return quickly; the task itself runs
    /// elsewhere.
    fn dispatch(&self, index: usize, payload: TaskPayload);

    /// Block until every dispatched task has finished. Called once the
    /// timeline is empty, before [`work_finished`](Self::work_finished).
    fn wait_for_idle(&self) {}

    /// The timeline is empty and all work is idle. Called at most once, on
    /// the driving thread, and not at all if the scheduler was stopped.
    fn work_finished(&self);
}

pub(super) struct SchedulerState {
    pub timeline: Timeline,
    pub started: bool,
    pub stop: bool,
}

pub(super) struct Shared {
    pub state: Mutex<SchedulerState>,
    pub wake: Condvar,
    pub handler: Arc<dyn ScheduleHandler>,
    pub assumed_task_duration: Duration,
}

/// Owns the timeline of one run and the thread that releases it.
///
/// Tasks may only be added before [`start`](Scheduler::start); afterwards
/// the timeline is drained by the driving thread alone.
pub struct Scheduler {
    pub(super) shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler. `assumed_task_duration` is added to the last
    /// offset to estimate total run length for percent reporting.
    pub fn new(handler: Arc<dyn ScheduleHandler>, assumed_task_duration: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState {
                    timeline: Timeline::default(),
                    started: false,
                    stop: false,
                }),
                wake: Condvar::new(),
                handler,
                assumed_task_duration,
            }),
            thread: Mutex::new(None),
        }
    }

    /// Add a task at `offset_ms` after run start. Returns its sequence index.
    pub fn add_task(&self, offset_ms: u64, payload: TaskPayload) -> Result<usize, RunError> {
        let mut state = lock(&self.shared.state);
        if state.started {
            return Err(RunError::InvalidState("cannot add tasks after start of test"));
        }
        Ok(state.timeline.insert(offset_ms, payload))
    }

    /// Start the driving thread. The run clock starts now.
    pub fn start(&self) -> Result<(), RunError> {
        let mut thread = lock(&self.thread);
        {
            let mut state = lock(&self.shared.state);
            if state.started {
                return Err(RunError::InvalidState("test already started"));
            }
            state.started = true;
            info!(tasks = state.timeline.len(), "scheduler starting");
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("work-scheduler".to_string())
            .spawn(move || shared.drive());
        match spawned {
            Ok(handle) => {
                *thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                // Nothing ran, so the scheduler may be started again.
                lock(&self.shared.state).started = false;
                Err(RunError::Spawn(e))
            }
        }
    }

    /// Abandon remaining tasks and wait for the driving thread to exit.
    ///
    /// No handler call is made after this returns. A no-op if never
    /// started or already stopped.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.shared.state);
            if !state.started {
                return;
            }
            state.stop = true;
            self.shared.wake.notify_all();
        }
        let mut thread = lock(&self.thread);
        if let Some(handle) = thread.take() {
            join_unless_current(handle, "work-scheduler");
            info!("scheduler stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        lock(&self.shared.state).started
    }

    /// Tasks not yet dispatched.
    pub fn pending(&self) -> usize {
        lock(&self.shared.state).timeline.len()
    }
}
