use std::collections::BTreeMap;

use crate::task::TaskPayload;

/// Ordering key: ascending offset, ties broken by insertion index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimelineKey {
    pub offset_ms: u64,
    pub index: usize,
}

/// Tasks not yet dispatched, earliest first.
#[derive(Default)]
pub(crate) struct Timeline {
    tasks: BTreeMap<TimelineKey, TaskPayload>,
    next_index: usize,
}

impl Timeline {
    /// Append a task and return its sequence index.
    pub fn insert(&mut self, offset_ms: u64, payload: TaskPayload) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        self.tasks.insert(TimelineKey { offset_ms, index }, payload);
        index
    }

    pub fn peek(&self) -> Option<TimelineKey> {
        self.tasks.keys().next().copied()
    }

    pub fn remove(&mut self, key: &TimelineKey) -> Option<TaskPayload> {
        self.tasks.remove(key)
    }

    /// Offset of the latest task, if any.
    pub fn last_offset_ms(&self) -> Option<u64> {
        self.tasks.keys().next_back().map(|k| k.offset_ms)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Percent of the estimated run elapsed, capped at 100.
///
/// `estimated_total_ms` is the last task's offset plus the assumed task
/// duration. A zero estimate counts as already complete.
pub fn progress_percent(elapsed_ms: u64, estimated_total_ms: u64) -> u8 {
    if estimated_total_ms == 0 {
        return 100;
    }
    let percent = u128::from(elapsed_ms) * 100 / u128::from(estimated_total_ms);
    percent.min(100) as u8
}
