use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::collab::{DisplayCollaborator, ResultReporter, NOT_ATTEMPTED};
use crate::sync::lock;
use crate::task::TaskPayload;
use crate::tracker::ActivityTracker;

use super::worker::Worker;

/// Where a dispatched task ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Claimed an existing idle worker.
    Reused { slot: usize },
    /// Grew the pool by one worker.
    Spawned { slot: usize },
    /// Every worker busy and the pool at capacity; reported as not attempted.
    Rejected,
}

#[derive(Default)]
struct Slots {
    workers: Vec<Arc<Worker>>,
    /// Next slot to probe for reuse.
    cursor: usize,
}

/// Owns the workers of one run. Grows monotonically up to `max_workers`.
pub struct WorkerPool {
    slots: Mutex<Slots>,
    max_workers: usize,
    reporter: Arc<dyn ResultReporter>,
    display: Arc<dyn DisplayCollaborator>,
    tracker: Arc<ActivityTracker>,
}

impl WorkerPool {
    pub fn new(
        max_workers: usize,
        reporter: Arc<dyn ResultReporter>,
        display: Arc<dyn DisplayCollaborator>,
        tracker: Arc<ActivityTracker>,
    ) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            max_workers,
            reporter,
            display,
            tracker,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current workers in slot order.
    pub fn workers(&self) -> Vec<Arc<Worker>> {
        lock(&self.slots).workers.clone()
    }

    /// Hand a ready task to a worker, or reject it.
    ///
    /// Probes every existing worker once, starting at the cursor, and claims
    /// the first idle one. Otherwise a new worker is created if the pool is
    /// below capacity. A rejected task is reported failed with
    /// [`NOT_ATTEMPTED`] before this returns.
    pub fn dispatch(&self, index: usize, payload: TaskPayload) -> DispatchOutcome {
        let mut slots = lock(&self.slots);

        let len = slots.workers.len();
        for probe in 0..len {
            let slot = (slots.cursor + probe) % len;
            if slots.workers[slot].task(index, Arc::clone(&payload)) {
                slots.cursor = (slot + 1) % len;
                debug!(index, slot, "dispatched to idle worker");
                return DispatchOutcome::Reused { slot };
            }
        }

        if len < self.max_workers {
            match Worker::spawn(len, Arc::clone(&self.reporter), Arc::clone(&self.tracker)) {
                Ok(worker) => {
                    // In the pool before the display sees it, so stop_all reaches it either way.
                    slots.workers.push(Arc::clone(&worker));
                    self.display.attach_worker_view(&worker);
                    if worker.task(index, payload) {
                        info!(index, slot = len, pool_size = len + 1, "pool grew");
                        return DispatchOutcome::Spawned { slot: len };
                    }
                }
                Err(e) => warn!(index, error = %e, "failed to spawn worker"),
            }
        }
        drop(slots);

        warn!(index, max_workers = self.max_workers, "pool saturated, task rejected");
        self.reporter.failed(index, NOT_ATTEMPTED);
        DispatchOutcome::Rejected
    }

    /// Block until every worker has no task in flight.
    pub fn wait_for_idle(&self) {
        for worker in self.workers() {
            worker.wait_for_idle();
        }
    }

    /// Stop and join every worker, emptying the pool.
    pub fn stop_all(&self) {
        let workers = {
            let mut slots = lock(&self.slots);
            slots.cursor = 0;
            std::mem::take(&mut slots.workers)
        };
        for worker in &workers {
            worker.stop();
        }
        if !workers.is_empty() {
            debug!(count = workers.len(), "workers stopped");
        }
    }
}
