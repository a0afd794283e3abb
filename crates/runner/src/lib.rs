//! Time-driven load test runner.
//!
//! A [`Scheduler`] releases timed tasks at their offsets, a [`WorkerPool`]
//! runs each on a reusable worker thread (growing up to a cap, rejecting
//! when saturated), and an [`ActivityTracker`] samples busy workers so a
//! display can show live elapsed times. [`LoadTest`] ties one run of the
//! three together and implements reset.

pub mod collab;
pub mod load_test;
pub mod metrics;
pub mod pool;
pub mod scheduler;
pub mod task;
pub mod tracker;

mod sync;

pub use collab::{
    Collaborators, CompletionSink, DisplayCollaborator, NullDisplay, ProgressSink, ResultReporter,
    NOT_ATTEMPTED,
};
pub use load_test::LoadTest;
pub use metrics::{RunSummary, SummaryReporter};
pub use pool::{DispatchOutcome, Worker, WorkerPool, WorkerSnapshot};
pub use scheduler::{ScheduleHandler, Scheduler};
pub use task::{FnTask, ProbeTask, RunError, TaskPayload};
pub use tracker::ActivityTracker;
