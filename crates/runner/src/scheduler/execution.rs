use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::sync::{lock, wait_timeout};

use super::core::Shared;
use super::timeline::progress_percent;

impl Shared {
    /// Body of the driving thread.
    ///
    /// Waits for each task's offset, re-checking the clock on every wake so
    /// spurious wakeups and oversleeping are both harmless, then hands the
    /// task to the handler. No lock is held while the handler runs.
    pub(super) fn drive(&self) {
        let started = Instant::now();
        let estimated_total_ms = {
            let state = lock(&self.state);
            state
                .timeline
                .last_offset_ms()
                .map(|last| last.saturating_add(duration_ms(self.assumed_task_duration)))
                .unwrap_or(0)
        };
        // Wake at least once per percent step so progress advances between tasks.
        let percent_step = Duration::from_millis((estimated_total_ms / 100).max(1));
        let mut percent: u8 = 0;

        loop {
            let mut state = lock(&self.state);
            if state.stop {
                debug!(remaining = state.timeline.len(), "scheduler abandoning timeline");
                return;
            }
            let Some(next) = state.timeline.peek() else {
                break;
            };

            let elapsed = duration_ms(started.elapsed());
            let new_percent = progress_percent(elapsed, estimated_total_ms);
            if new_percent != percent {
                percent = new_percent;
                drop(state);
                self.handler.percent_complete(percent);
                continue;
            }

            if elapsed >= next.offset_ms {
                let payload = state.timeline.remove(&next);
                drop(state);
                if let Some(payload) = payload {
                    debug!(index = next.index, offset_ms = next.offset_ms, elapsed_ms = elapsed, "releasing task");
                    self.handler.dispatch(next.index, payload);
                }
                continue;
            }

            let remaining = Duration::from_millis(next.offset_ms - elapsed);
            let _ = wait_timeout(&self.wake, state, remaining.min(percent_step));
        }

        if percent != 100 {
            self.handler.percent_complete(100);
        }
        self.handler.wait_for_idle();
        if lock(&self.state).stop {
            return;
        }
        info!(elapsed_ms = duration_ms(started.elapsed()), "timeline drained");
        self.handler.work_finished();
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
