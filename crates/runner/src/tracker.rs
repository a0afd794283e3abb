//! Activity tracker: samples busy workers for the live display.
//!
//! The sampling thread sleeps on a condition variable while no worker is
//! busy. Once a worker starts a task it ticks every active worker at a
//! fixed cadence. A worker that finishes is only marked for removal; it is
//! dropped at the start of the next tick, so the display always sees its
//! final elapsed time at least once.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::collab::DisplayCollaborator;
use crate::pool::Worker;
use crate::sync::{join_unless_current, lock, wait, wait_timeout};
use crate::task::RunError;

#[derive(Default)]
struct ActiveSet {
    active: BTreeMap<usize, Arc<Worker>>,
    pending_removal: BTreeSet<usize>,
    stop: bool,
}

pub struct ActivityTracker {
    state: Mutex<ActiveSet>,
    wake: Condvar,
    display: Arc<dyn DisplayCollaborator>,
    interval: Duration,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ActivityTracker {
    /// Create the tracker and start its (initially idle) sampling thread.
    pub fn start(
        display: Arc<dyn DisplayCollaborator>,
        interval: Duration,
    ) -> Result<Arc<Self>, RunError> {
        let tracker = Arc::new(Self {
            state: Mutex::new(ActiveSet::default()),
            wake: Condvar::new(),
            display,
            interval,
            thread: Mutex::new(None),
        });

        let sampler = Arc::clone(&tracker);
        let handle = thread::Builder::new()
            .name("activity-tracker".to_string())
            .spawn(move || sampler.run_loop())?;
        *lock(&tracker.thread) = Some(handle);
        Ok(tracker)
    }

    /// Begin ticking `worker`. Wakes the sampler if it was idle.
    pub fn start_activity(&self, worker: Arc<Worker>) {
        let mut state = lock(&self.state);
        let slot = worker.slot();
        // A worker restarting before its deferred removal stays tracked.
        state.pending_removal.remove(&slot);
        let was_empty = state.active.is_empty();
        state.active.insert(slot, worker);
        if was_empty {
            self.wake.notify_all();
        }
    }

    /// Stop ticking `worker` after one more tick.
    pub fn stop_activity(&self, worker: &Worker) {
        let mut state = lock(&self.state);
        if state.active.contains_key(&worker.slot()) {
            state.pending_removal.insert(worker.slot());
        }
    }

    /// Number of workers currently being ticked, including those pending removal.
    pub fn active_count(&self) -> usize {
        lock(&self.state).active.len()
    }

    /// Stop the sampling thread and wait for it to exit. Safe to call more than once.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.state);
            state.stop = true;
            self.wake.notify_all();
        }
        let mut thread = lock(&self.thread);
        if let Some(handle) = thread.take() {
            join_unless_current(handle, "activity-tracker");
        }
        // Drop worker references so discarded workers are freed.
        let mut state = lock(&self.state);
        state.active.clear();
        state.pending_removal.clear();
    }

    fn run_loop(&self) {
        loop {
            {
                let mut state = lock(&self.state);
                while !state.stop && state.active.is_empty() {
                    state = wait(&self.wake, state);
                }
                if state.stop {
                    return;
                }
            }
            debug!("activity tracker sampling");

            loop {
                let snapshot: Vec<Arc<Worker>> = {
                    let mut state = lock(&self.state);
                    let deadline = Instant::now() + self.interval;
                    while !state.stop {
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        state = wait_timeout(&self.wake, state, deadline - now).0;
                    }
                    if state.stop {
                        return;
                    }
                    let snapshot = state.active.values().cloned().collect();
                    let ActiveSet { active, pending_removal, .. } = &mut *state;
                    for slot in std::mem::take(pending_removal) {
                        active.remove(&slot);
                    }
                    snapshot
                };

                for worker in &snapshot {
                    self.display.tick(worker);
                }

                if lock(&self.state).active.is_empty() {
                    break;
                }
            }
            debug!("activity tracker idle");
        }
    }
}
