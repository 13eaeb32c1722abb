//! Subscription Registry
//!
//! Every reactive cell owns one `Dep`: the ordered list of computations that
//! read the cell while they were running. Writing a new value to the cell
//! asks its `Dep` to notify, which re-runs every recorded subscriber.
//!
//! # Notification Order
//!
//! Subscribers are updated strictly in insertion order, synchronously, on the
//! caller's stack. If a subscriber's update writes other cells, those
//! notifications run to completion before the next subscriber here is
//! updated (depth-first, not a queue).
//!
//! The list is snapshotted when `notify` starts. Subscribers added while the
//! loop runs (a re-running watcher re-subscribing, for example) are not
//! visited by that same loop.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::subscriber::{Subscriber, SubscriberId};

/// Unique identifier for a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u64);

impl DepId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dep#{}", self.0)
    }
}

struct DepInner {
    id: DepId,
    subscribers: RefCell<Vec<Rc<dyn Subscriber>>>,
}

/// An append-only, ordered list of subscribers.
///
/// Cloning a `Dep` yields another handle to the same registry.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

impl Dep {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DepInner {
                id: DepId::new(),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Append a subscriber. Duplicates are kept.
    pub fn add_subscriber(&self, subscriber: Rc<dyn Subscriber>) {
        tracing::trace!(
            dep = %self.inner.id,
            subscriber = %subscriber.subscriber_id(),
            "subscribe"
        );
        self.inner.subscribers.borrow_mut().push(subscriber);
    }

    /// Update every recorded subscriber, in insertion order.
    pub fn notify(&self) {
        // Updates re-enter this registry, so never hold the borrow across them.
        let subscribers = self.inner.subscribers.borrow().clone();

        if subscribers.is_empty() {
            return;
        }

        tracing::debug!(dep = %self.inner.id, subscribers = subscribers.len(), "notify");

        for subscriber in subscribers {
            subscriber.update();
        }
    }

    /// Remove every entry belonging to `id`. Returns how many were removed.
    pub fn remove_subscriber(&self, id: SubscriberId) -> usize {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|s| s.subscriber_id() != id);
        before - subscribers.len()
    }

    /// Whether `id` has at least one entry. Scans the whole registry.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .any(|s| s.subscriber_id() == id)
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscriber IDs in notification order.
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .map(|s| s.subscriber_id())
            .collect()
    }

    /// A handle that does not keep the registry alive.
    pub fn downgrade(&self) -> WeakDep {
        WeakDep {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Non-owning handle to a `Dep`.
///
/// Watchers hold these for the registries they joined, so a cell that goes
/// away is not kept alive by its readers.
#[derive(Clone)]
pub struct WeakDep {
    id: DepId,
    inner: Weak<DepInner>,
}

impl WeakDep {
    pub fn id(&self) -> DepId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Dep> {
        self.inner.upgrade().map(|inner| Dep { inner })
    }
}

impl std::fmt::Debug for WeakDep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WeakDep").field(&self.id).finish()
    }
}
