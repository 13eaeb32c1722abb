//! Subscriber types for the reactive system.
//!
//! A Subscriber is anything a `Dep` can record and later re-run. Watchers
//! are the only subscribers the crate creates, but registries only see this
//! trait.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::dep::Dep;

/// Unique identifier for a subscriber.
///
/// Registries use it to find, deduplicate and prune entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A computation that can be recorded by registries and re-run by them.
pub trait Subscriber {
    /// The subscriber's unique ID.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-run the computation. Called by `Dep::notify`.
    fn update(&self);

    /// Called when a cell's registry is read while this subscriber is the
    /// current computation.
    ///
    /// `first_read` is false when the same registry was already read earlier
    /// in the current run. The implementation decides whether to call
    /// `dep.add_subscriber`.
    fn depend(self: Rc<Self>, dep: &Dep, first_read: bool);
}
