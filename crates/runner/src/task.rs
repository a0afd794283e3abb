use std::fmt;
use std::sync::Arc;

use stampede_core::StampedeError;

/// Error type for runner lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Caller misuse: adding tasks after start, or starting twice.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),
    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] StampedeError),
}

/// A unit of probe work released by the scheduler and run on a worker.
///
/// Implementations perform one synchronous action (an HTTP request, say)
/// and report failure through the returned error. The error detail is
/// opaque to the runner; only success or failure and the elapsed time are
/// reported.
pub trait ProbeTask: Send + Sync {
    /// Human-readable label for logging.
    fn name(&self) -> &str {
        "task"
    }

    /// Run the task to completion on the calling thread.
    fn execute(&self) -> anyhow::Result<()>;
}

/// Shared handle to a task payload as stored in the timeline.
pub type TaskPayload = Arc<dyn ProbeTask>;

/// Adapts a closure into a [`ProbeTask`].
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F> FnTask<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Wrap the closure directly as a [`TaskPayload`].
    pub fn payload(name: impl Into<String>, f: F) -> TaskPayload {
        Arc::new(Self::new(name, f))
    }
}

impl<F> ProbeTask for FnTask<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self) -> anyhow::Result<()> {
        (self.f)()
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}
