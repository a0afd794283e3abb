//! Worker pool: reusable worker threads with bounded growth.
//!
//! - `worker`: a single execution thread and its elapsed-time history
//! - `dispatcher`: round-robin claim of idle workers, growth up to the cap,
//!   rejection when saturated

mod dispatcher;
mod worker;

pub use dispatcher::{DispatchOutcome, WorkerPool};
pub use worker::{Worker, WorkerSnapshot};
