//! Continuation dispatch.
//!
//! HTTP completions finish on transport worker threads. Hosts with a
//! main-thread rule (game engines, UI toolkits) need every continuation to run
//! on that thread instead. The core never invokes a caller continuation
//! directly; it hands it to a [`CallbackDispatcher`], which makes the thread
//! affinity an explicit configuration choice.

/// Boxed continuation ready to run.
pub type DispatchTask = Box<dyn FnOnce() + Send + 'static>;

pub trait CallbackDispatcher: Send + Sync {
    /// Schedule `task` on the dispatcher's execution context.
    ///
    /// Must not block and must not drop the task unless the target context is
    /// gone for good.
    fn dispatch(&self, task: DispatchTask);
}

/// Runs each continuation on the thread that completed the operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateDispatcher;

impl CallbackDispatcher for ImmediateDispatcher {
    fn dispatch(&self, task: DispatchTask) {
        task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_immediate_dispatcher_runs_inline() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        ImmediateDispatcher.dispatch(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
