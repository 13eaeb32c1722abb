//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables implicit dependency collection: when a cell is read, the
//! current computation is handed the cell's registry.
//!
//! # Implementation
//!
//! We use a thread-local stack rather than a single "current" slot. When a
//! watcher starts a run it pushes itself; when the run ends the guard pops
//! it. A write inside a running computation can synchronously re-run another
//! watcher, which pushes on top and pops back off, so the outer computation's
//! later reads are still attributed to the outer computation.
//!
//! The pop happens in `Drop`, so the stack is restored even when the
//! computation panics.

use std::cell::RefCell;
use std::rc::Rc;

use super::dep::{Dep, DepId};
use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The running computation.
    subscriber: Rc<dyn Subscriber>,
    /// Registries read during this run, in read order, repeats included.
    dependencies: Vec<DepId>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While the returned guard is alive, every tracked read is reported to
    /// this subscriber.
    pub fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let subscriber_id = subscriber.subscriber_id();
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                dependencies: Vec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.subscriber.subscriber_id())
        })
    }

    /// Number of computations currently running on this thread.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Report a read of `dep` to the current computation.
    ///
    /// Does nothing outside a reactive context.
    pub fn track(dep: &Dep) {
        let current = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            let id = dep.id();
            let first_read = !entry.dependencies.contains(&id);
            entry.dependencies.push(id);
            Some((entry.subscriber.clone(), first_read))
        });

        // The subscriber may touch other registries; the stack borrow is
        // released by now.
        if let Some((subscriber, first_read)) = current {
            subscriber.depend(dep, first_read);
        }
    }

    /// Get the registries read so far in the current context.
    pub fn get_dependencies() -> Vec<DepId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber.subscriber_id(),
                    self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id,
                    entry.subscriber.subscriber_id()
                );
            }
        });
    }
}
