//! Watcher Implementation
//!
//! A Watcher wraps a computation and re-runs it whenever a reactive cell it
//! read changes.
//!
//! # How Watchers Work
//!
//! 1. When created, the watcher runs its computation immediately to
//!    establish its initial dependencies.
//!
//! 2. Every run happens inside a `ReactiveContext`, so each cell read during
//!    the run reports its `Dep` back to the watcher.
//!
//! 3. When a cell it depends on is written, the cell's `Dep` calls
//!    `update`, which repeats the run and collects dependencies afresh.
//!
//! # Subscription Bookkeeping
//!
//! With `TrackingMode::Rebuild` a watcher joins each registry at most once
//! per run. Registries it already belonged to keep its entry where it is,
//! and registries it did not read in the latest run are left after the run
//! completes. With `TrackingMode::Accumulate` every tracked read appends a
//! new entry and nothing is ever removed.
//!
//! # Update Depth
//!
//! A computation that writes a cell it also reads re-triggers itself
//! synchronously. Nesting is unbounded unless `ReactiveConfig::max_depth` is
//! set, in which case deeper runs are refused with
//! `ReactiveError::DepthExceeded`.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::config::{ReactiveConfig, TrackingMode};
use super::context::ReactiveContext;
use super::dep::{Dep, DepId, WeakDep};
use super::error::ReactiveError;
use super::subscriber::{Subscriber, SubscriberId};

type DepList = SmallVec<[WeakDep; 4]>;

struct WatcherInner {
    id: SubscriberId,
    me: Weak<WatcherInner>,
    computation: Box<dyn Fn()>,
    tracking: TrackingMode,

    /// Registries joined during the current or latest run.
    joined: RefCell<DepList>,

    /// Registries joined by earlier runs, pending a sweep.
    stale: RefCell<DepList>,

    /// Registries currently holding an entry for this watcher (Rebuild only).
    subscribed: RefCell<HashSet<DepId>>,

    /// Distinct registries the watcher depends on after its latest run.
    dependencies: RefCell<Vec<DepId>>,

    run_count: Cell<usize>,
}

impl WatcherInner {
    fn run(&self) -> Result<(), ReactiveError> {
        let Some(me) = self.me.upgrade() else {
            return Ok(());
        };

        let depth = ReactiveContext::depth();
        if let Some(limit) = ReactiveConfig::current().max_depth {
            if depth >= limit {
                return Err(ReactiveError::DepthExceeded { limit });
            }
        }

        if self.tracking == TrackingMode::Rebuild {
            let mut joined = self.joined.borrow_mut();
            self.stale.borrow_mut().extend(joined.drain(..));
        }

        tracing::debug!(subscriber = %self.id, depth, "watcher run");

        let read = {
            let _ctx = ReactiveContext::enter(me);
            (self.computation)();
            ReactiveContext::get_dependencies()
        };
        self.run_count.set(self.run_count.get() + 1);

        let distinct = match self.tracking {
            TrackingMode::Accumulate => dedup(read),
            TrackingMode::Rebuild => {
                self.sweep();
                // A nested run of this watcher may have pruned registries
                // read earlier in this run, so report what is still joined.
                dedup(self.joined.borrow().iter().map(WeakDep::id))
            }
        };
        *self.dependencies.borrow_mut() = distinct;

        Ok(())
    }

    /// Leave every registry joined by an earlier run but not by the latest.
    fn sweep(&self) {
        let stale = std::mem::take(&mut *self.stale.borrow_mut());
        let kept: HashSet<DepId> = self.joined.borrow().iter().map(WeakDep::id).collect();

        for weak in stale {
            let id = weak.id();
            if kept.contains(&id) {
                continue;
            }
            self.subscribed.borrow_mut().remove(&id);
            if let Some(dep) = weak.upgrade() {
                let removed = dep.remove_subscriber(self.id);
                tracing::trace!(dep = %id, subscriber = %self.id, removed, "stale subscription pruned");
            }
        }
    }
}

fn dedup(ids: impl IntoIterator<Item = DepId>) -> Vec<DepId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

impl Subscriber for WatcherInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn update(&self) {
        if let Err(err) = self.run() {
            tracing::error!(subscriber = %self.id, error = %err, "watcher update skipped");
        }
    }

    fn depend(self: Rc<Self>, dep: &Dep, first_read: bool) {
        match self.tracking {
            TrackingMode::Accumulate => dep.add_subscriber(self),
            TrackingMode::Rebuild => {
                if !first_read {
                    return;
                }
                self.joined.borrow_mut().push(dep.downgrade());
                let joined_now = self.subscribed.borrow_mut().insert(dep.id());
                if joined_now {
                    dep.add_subscriber(self);
                }
            }
        }
    }
}

/// A computation that re-runs whenever the reactive cells it read change.
///
/// Registries keep the watcher alive, so dropping every `Watcher` handle
/// does not stop it while a cell it read still exists.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use observe_core::{observe, Container, Value, Watcher};
///
/// let state = Container::new();
/// observe(&state, "count", 1);
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let (reader, log) = (state.clone(), seen.clone());
/// let _watcher = Watcher::new(move || {
///     log.borrow_mut().push(reader.get("count").unwrap());
/// });
///
/// state.set("count", 2);
/// assert_eq!(*seen.borrow(), vec![Value::Int(1), Value::Int(2)]);
/// ```
#[derive(Clone)]
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

impl Watcher {
    /// Create a watcher and run `computation` once before returning.
    ///
    /// The tracking mode is taken from the current `ReactiveConfig`.
    pub fn new<F>(computation: F) -> Self
    where
        F: Fn() + 'static,
    {
        let tracking = ReactiveConfig::current().tracking;
        let inner = Rc::new_cyclic(|me| WatcherInner {
            id: SubscriberId::new(),
            me: me.clone(),
            computation: Box::new(computation),
            tracking,
            joined: RefCell::new(SmallVec::new()),
            stale: RefCell::new(SmallVec::new()),
            subscribed: RefCell::new(HashSet::new()),
            dependencies: RefCell::new(Vec::new()),
            run_count: Cell::new(0),
        });

        let watcher = Self { inner };
        watcher.update();
        watcher
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn tracking(&self) -> TrackingMode {
        self.inner.tracking
    }

    /// Run the computation now, re-collecting its dependencies.
    ///
    /// A refused run is logged and skipped; see [`Watcher::try_update`].
    pub fn update(&self) {
        Subscriber::update(&*self.inner);
    }

    /// Run the computation now, reporting a refused run as an error.
    pub fn try_update(&self) -> Result<(), ReactiveError> {
        self.inner.run()
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of distinct cells the watcher depends on.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Registries the watcher depends on, in first-read order.
    ///
    /// With `TrackingMode::Rebuild` these are exactly the registries that
    /// hold an entry for the watcher.
    pub fn dependencies(&self) -> Vec<DepId> {
        self.inner.dependencies.borrow().clone()
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("tracking", &self.inner.tracking)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Create a watcher for `computation`. Same as [`Watcher::new`].
pub fn create_computation<F>(computation: F) -> Watcher
where
    F: Fn() + 'static,
{
    Watcher::new(computation)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observe, Container, Value};

    #[test]
    fn watcher_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = run_count.clone();

        let watcher = Watcher::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 1);
        assert_eq!(watcher.run_count(), 1);
    }

    #[test]
    fn explicit_update_reruns() {
        let watcher = Watcher::new(|| {});
        watcher.update();
        watcher.update();
        assert_eq!(watcher.run_count(), 3);
    }

    #[test]
    fn watcher_tracks_dependency_count() {
        let root = Container::new();
        observe(&root, "a", 1);
        observe(&root, "b", 2);

        let reader = root.clone();
        let watcher = Watcher::new(move || {
            reader.get("a");
            reader.get("b");
            reader.get("a");
        });

        assert_eq!(watcher.dependency_count(), 2);
        assert_eq!(
            watcher.dependencies(),
            vec![root.cell("a").unwrap().dep().id(), root.cell("b").unwrap().dep().id()]
        );
    }

    #[test]
    fn rebuild_subscribes_once_per_run() {
        let root = Container::new();
        observe(&root, "x", 1);

        let reader = root.clone();
        let watcher = Watcher::new(move || {
            reader.get("x");
            reader.get("x");
        });

        let cell = root.cell("x").unwrap();
        assert_eq!(cell.subscriber_count(), 1);

        watcher.update();
        watcher.update();
        assert_eq!(cell.subscriber_count(), 1);
    }

    #[test]
    fn accumulate_appends_every_read() {
        let _scope = ReactiveConfig::default()
            .with_tracking(TrackingMode::Accumulate)
            .scoped();

        let root = Container::new();
        observe(&root, "x", 1);

        let reader = root.clone();
        let watcher = Watcher::new(move || {
            reader.get("x");
        });
        assert_eq!(watcher.tracking(), TrackingMode::Accumulate);

        let cell = root.cell("x").unwrap();
        assert_eq!(cell.subscriber_count(), 1);

        watcher.update();
        watcher.update();
        assert_eq!(cell.subscriber_count(), 3);
    }

    #[test]
    fn rebuild_keeps_position_of_retained_subscriptions() {
        let root = Container::new();
        observe(&root, "x", 1);

        let (r1, r2) = (root.clone(), root.clone());
        let first = Watcher::new(move || {
            r1.get("x");
        });
        let second = Watcher::new(move || {
            r2.get("x");
        });

        first.update();

        let dep = root.cell("x").unwrap().dep().clone();
        assert_eq!(dep.subscriber_ids(), vec![first.id(), second.id()]);
    }

    #[test]
    fn depth_limit_refuses_runaway_updates() {
        let _scope = ReactiveConfig::default().with_max_depth(8).scoped();

        let root = Container::new();
        observe(&root, "n", 0);

        let rw = root.clone();
        let watcher = Watcher::new(move || {
            let n = rw.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
            rw.set("n", n + 1);
        });

        // Nested runs stop once the stack holds `max_depth` watchers.
        assert_eq!(root.get_untracked("n"), Some(Value::Int(8)));
        assert_eq!(watcher.run_count(), 8);
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn nesting_is_unbounded_by_default() {
        let root = Container::new();
        observe(&root, "n", 0);

        let rw = root.clone();
        let watcher = Watcher::new(move || {
            let n = rw.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
            if n < 100 {
                rw.set("n", n + 1);
            }
        });

        assert_eq!(root.get_untracked("n"), Some(Value::Int(100)));
        assert_eq!(watcher.run_count(), 101);
        assert_eq!(root.cell("n").unwrap().subscriber_count(), 1);
    }

    #[test]
    fn try_update_reports_depth_exceeded() {
        let _scope = ReactiveConfig::default().with_max_depth(0).scoped();

        let run_count = Rc::new(Cell::new(0));
        let counter = run_count.clone();
        let watcher = Watcher::new(move || counter.set(counter.get() + 1));

        assert_eq!(run_count.get(), 0);
        let err = watcher.try_update().unwrap_err();
        assert!(matches!(err, ReactiveError::DepthExceeded { limit: 0 }));
    }

    #[test]
    fn dependencies_follow_a_self_triggered_rerun() {
        let root = Container::new();
        observe(&root, "n", 0);
        observe(&root, "a", 0);
        observe(&root, "b", 0);

        // The first run reads `a`, then bumps `n`, which re-runs the watcher
        // before the first run returns; that nested run reads `b` instead.
        let rw = root.clone();
        let watcher = Watcher::new(move || {
            let n = rw.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
            if n == 0 {
                rw.get("a");
                rw.set("n", 1);
            } else {
                rw.get("b");
            }
        });
        assert_eq!(watcher.run_count(), 2);

        let dep = |key: &str| root.cell(key).unwrap().dep().clone();
        assert!(!dep("a").contains(watcher.id()));
        assert_eq!(watcher.dependencies(), vec![dep("n").id(), dep("b").id()]);
        assert!(dep("n").contains(watcher.id()));
        assert!(dep("b").contains(watcher.id()));

        root.set("a", 1);
        assert_eq!(watcher.run_count(), 2);
    }

    #[test]
    fn wide_fan_out_keeps_one_entry_per_watcher() {
        let root = Container::new();
        observe(&root, "x", 0);

        let watchers: Vec<Watcher> = (0..2048)
            .map(|_| {
                let reader = root.clone();
                Watcher::new(move || {
                    reader.get("x");
                    reader.get("x");
                })
            })
            .collect();

        root.set("x", 1);
        root.set("x", 2);

        let dep = root.cell("x").unwrap().dep().clone();
        assert_eq!(dep.len(), watchers.len());
        assert_eq!(dep.subscriber_ids(), watchers.iter().map(Watcher::id).collect::<Vec<_>>());
        assert!(watchers.iter().all(|w| w.run_count() == 3));
    }

    #[test]
    fn panicking_computation_restores_context() {
        let root = Container::new();
        observe(&root, "x", 1);

        let reader = root.clone();
        let watcher = Watcher::new(move || {
            if reader.get("x") == Some(Value::Int(2)) {
                panic!("bad value");
            }
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            root.set("x", 2);
        }));
        assert!(result.is_err());
        assert!(!ReactiveContext::is_active());

        // Collection still works afterwards.
        root.set("x", 3);
        assert_eq!(watcher.run_count(), 2);
        assert_eq!(root.cell("x").unwrap().subscriber_count(), 1);
    }

    #[test]
    fn create_computation_is_watcher_new() {
        let watcher = create_computation(|| {});
        assert_eq!(watcher.run_count(), 1);
    }
}
