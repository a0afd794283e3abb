//! Time-driven scheduler releasing tasks at their offsets from run start.
//!
//! Split into focused submodules:
//! - `timeline`: ordering key, pending-task collection, percent estimate
//! - `core`: Scheduler struct, task registration, start/stop lifecycle
//! - `execution`: the driving thread's wait/dispatch loop

mod core;
mod execution;
mod timeline;

pub use self::core::{ScheduleHandler, Scheduler};
pub use self::timeline::progress_percent;
