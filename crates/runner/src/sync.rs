use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, WaitTimeoutResult};
use std::thread::JoinHandle;
use std::time::Duration;

/// Lock a mutex, recovering the guard if another thread panicked while holding it.
///
/// No lock is held while a payload runs. The one collaborator call made
/// under a lock (`attach_worker_view`) happens after the pool state is
/// updated, so the protected state stays consistent after a poisoning panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait<'a, T>(cond: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait_timeout<'a, T>(
    cond: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
    cond.wait_timeout(guard, timeout)
        .unwrap_or_else(PoisonError::into_inner)
}

/// Join a component thread unless called from that same thread.
///
/// A collaborator callback that stops the component it was called from
/// would otherwise deadlock joining itself; in that case the thread exits
/// on its own once the callback returns.
pub(crate) fn join_unless_current(handle: JoinHandle<()>, component: &str) {
    if handle.thread().id() == std::thread::current().id() {
        tracing::debug!(component, "stop requested from own thread, not joining");
        return;
    }
    if handle.join().is_err() {
        tracing::warn!(component, "thread exited with a panic");
    }
}
