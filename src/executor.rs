//! # Batch execution with per-action failure isolation.
//!
//! An executor runs an ordered batch of queued actions on the calling thread.
//! A panicking action must not take the rest of the batch (or the fiber
//! feeding it) down with it, so every action runs under `catch_unwind` and
//! faults are routed to an observable hook instead of unwinding across the
//! fiber boundary.
//!
//! ## Rules
//! - Actions run **in order**, synchronously, on the caller's thread.
//! - A fault in action `k` never prevents action `k + 1` from running.
//! - Faults are **surfaced**, not swallowed: the default hook writes a line
//!   to stderr; [`Executor::with_fault_hook`] installs a custom observer
//!   (tests and supervisors use this to count or assert on faults).
//! - Nothing here is queue-aware: fibers decide *when* a batch runs, the
//!   executor decides only *how*.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::fibers::Action;

/// Shared handle to an executor implementation.
pub type ExecutorRef = Arc<dyn Execute>;

/// Observer invoked for every action that panics.
pub type FaultHook = Arc<dyn Fn(ActionFault) + Send + Sync>;

/// Description of one panicking action, as seen by the [`FaultHook`].
#[derive(Clone, Debug)]
pub struct ActionFault {
    /// Name of the thread the action ran on (worker threads are named by
    /// their fiber; pool threads carry tokio's worker names).
    pub thread: String,
    /// Panic payload rendered as text, when the payload was a string.
    pub message: String,
}

impl ActionFault {
    fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        let thread = std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string();
        Self { thread, message }
    }
}

/// Contract for running captured batches of actions.
///
/// Implementations are not required to tolerate concurrent `execute_batch`
/// calls on the same instance; every fiber strategy in this crate runs at
/// most one batch at a time per fiber.
pub trait Execute: Send + Sync {
    /// Runs a single action, containing any panic it raises.
    fn execute(&self, action: Action);

    /// Runs a batch in order, draining the vector (capacity is kept so
    /// callers can reuse the allocation for the next swap).
    fn execute_batch(&self, batch: &mut Vec<Action>) {
        for action in batch.drain(..) {
            self.execute(action);
        }
    }
}

/// Default executor: `catch_unwind` per action, faults to the hook.
#[derive(Clone)]
pub struct Executor {
    on_fault: FaultHook,
}

impl Executor {
    /// Executor with the default stderr fault hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor routing faults to a custom observer.
    pub fn with_fault_hook(on_fault: FaultHook) -> Self {
        Self { on_fault }
    }

    /// Wraps `self` in an [`ExecutorRef`] for handing to fiber factories.
    pub fn into_ref(self) -> ExecutorRef {
        Arc::new(self)
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            on_fault: Arc::new(|fault: ActionFault| {
                eprintln!(
                    "[fibra] action panicked on '{}': {}",
                    fault.thread, fault.message
                );
            }),
        }
    }
}

impl Execute for Executor {
    fn execute(&self, action: Action) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(action)) {
            (self.on_fault)(ActionFault::from_payload(payload));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_batch_runs_in_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let executor = Executor::new();
        let mut batch: Vec<Action> = Vec::new();
        for i in 0..5 {
            let order = Arc::clone(&order);
            batch.push(Box::new(move || order.lock().push(i)));
        }
        executor.execute_batch(&mut batch);
        assert!(batch.is_empty());
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_fault_does_not_stop_batch() {
        let faults = Arc::new(AtomicUsize::new(0));
        let ran = Arc::new(AtomicUsize::new(0));
        let hook = {
            let faults = Arc::clone(&faults);
            Arc::new(move |_fault: ActionFault| {
                faults.fetch_add(1, Ordering::SeqCst);
            })
        };
        let executor = Executor::with_fault_hook(hook);

        let mut batch: Vec<Action> = Vec::new();
        {
            let ran = Arc::clone(&ran);
            batch.push(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        batch.push(Box::new(|| panic!("boom")));
        {
            let ran = Arc::clone(&ran);
            batch.push(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }

        executor.execute_batch(&mut batch);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(faults.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fault_carries_message() {
        let seen = Arc::new(parking_lot::Mutex::new(String::new()));
        let hook = {
            let seen = Arc::clone(&seen);
            Arc::new(move |fault: ActionFault| {
                *seen.lock() = fault.message;
            })
        };
        let executor = Executor::with_fault_hook(hook);
        executor.execute(Box::new(|| panic!("exact message")));
        assert_eq!(*seen.lock(), "exact message");
    }
}
