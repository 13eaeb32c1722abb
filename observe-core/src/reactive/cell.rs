//! Reactive Cells
//!
//! A reactive cell is one intercepted property: a private backing value plus
//! the `Dep` of computations that read it.
//!
//! # How Cells Work
//!
//! 1. Reading the cell while a watcher is running hands the cell's `Dep` to
//!    that watcher, which subscribes to it.
//!
//! 2. Writing a value identical to the current one does nothing.
//!
//! 3. Writing a different value replaces it and notifies every subscriber
//!    before the write returns.
//!
//! # Recursive Observation
//!
//! When the initial value of an observed property is itself a container,
//! each of that container's fields is observed too, depth first, before the
//! outer property is installed. Containers reachable more than once (shared
//! or cyclic) are only walked the first time.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::config::ReactiveConfig;
use super::context::ReactiveContext;
use super::dep::Dep;
use super::value::{Container, Value};

/// An intercepted property with its own subscription registry.
pub struct ReactiveCell {
    value: RefCell<Value>,
    dep: Dep,
}

impl ReactiveCell {
    /// Create a cell with a fresh, empty registry.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: RefCell::new(value.into()),
            dep: Dep::new(),
        }
    }

    /// Get the current value, subscribing the running watcher if any.
    pub fn get(&self) -> Value {
        ReactiveContext::track(&self.dep);
        self.value.borrow().clone()
    }

    /// Get the current value without subscribing anyone.
    pub fn get_untracked(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Replace the value and notify subscribers, unless the new value is
    /// identical to the current one.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();

        let previous = {
            let mut current = self.value.borrow_mut();
            if *current == value {
                tracing::trace!(dep = %self.dep.id(), "identical write skipped");
                return;
            }
            std::mem::replace(&mut *current, value)
        };
        drop(previous);

        self.dep.notify();
    }

    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Number of registry entries, duplicates included.
    pub fn subscriber_count(&self) -> usize {
        self.dep.len()
    }
}

impl std::fmt::Debug for ReactiveCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveCell")
            .field("value", &self.get_untracked())
            .field("dep", &self.dep)
            .finish()
    }
}

/// Make `container[key]` reactive, starting from `value`.
///
/// Any previous cell at `key` is replaced along with its subscribers.
pub fn observe(container: &Container, key: impl Into<String>, value: impl Into<Value>) {
    let value = value.into();

    if ReactiveConfig::current().recursive {
        if let Value::Container(nested) = &value {
            observe_fields(nested, &mut HashSet::new());
        }
    }

    container.install(key.into(), Rc::new(ReactiveCell::new(value)));
}

/// Alias of [`observe`].
pub fn make_reactive(container: &Container, key: impl Into<String>, value: impl Into<Value>) {
    observe(container, key, value);
}

fn observe_fields(container: &Container, visited: &mut HashSet<usize>) {
    if !visited.insert(container.addr()) {
        tracing::debug!(container = ?container, "container already observed in this pass");
        return;
    }

    for key in container.keys() {
        let value = container.get_untracked(&key).unwrap_or_default();
        if let Value::Container(nested) = &value {
            observe_fields(nested, visited);
        }
        container.install(key, Rc::new(ReactiveCell::new(value)));
    }
}
