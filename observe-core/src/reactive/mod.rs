//! Reactive Primitives
//!
//! This module implements implicit dependency tracking: computations that
//! re-run whenever the properties they read change, without declaring what
//! they read.
//!
//! # Concepts
//!
//! ## Reactive Cells
//!
//! `observe(container, key, value)` turns one property of a `Container` into
//! a reactive cell. The cell owns its value and a `Dep`, the registry of
//! computations that read it.
//!
//! ## Watchers
//!
//! A `Watcher` wraps a computation. It runs once when created and again
//! every time a cell it read is written with a different value.
//!
//! ## The Context Stack
//!
//! While a watcher runs, it sits on top of a thread-local stack. A cell read
//! looks at the top of the stack to find out who is reading. Nested runs,
//! caused by writes inside a running computation, push and pop on top of the
//! outer run without disturbing it.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded and synchronous. A write notifies before it
//! returns, and nested notifications complete depth-first. Each thread has
//! its own context stack and configuration, so reactive graphs are confined
//! to the thread that built them.

mod cell;
mod config;
mod context;
mod dep;
mod error;
mod subscriber;
mod value;
mod watcher;

pub use cell::{make_reactive, observe, ReactiveCell};
pub use config::{ConfigScope, ReactiveConfig, TrackingMode};
pub use context::ReactiveContext;
pub use dep::{Dep, DepId, WeakDep};
pub use error::ReactiveError;
pub use subscriber::{Subscriber, SubscriberId};
pub use value::{Container, Value};
pub use watcher::{create_computation, Watcher};
