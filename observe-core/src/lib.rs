//! Observe Core
//!
//! This crate provides a fine-grained reactive core: computations re-run
//! automatically whenever the data they read changes, and they never have to
//! say what they depend on.
//!
//! It implements:
//!
//! - Reactive cells: intercepted container properties with change detection
//! - Subscription registries: per-cell lists of computations to re-run
//! - Watchers: computations that collect their dependencies on every run
//! - A per-thread context stack that ties reads to the running watcher
//!
//! Rendering, batching, derived values and teardown are left to the layers
//! built on top.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use observe_core::{make_reactive, create_computation, Container, Value};
//!
//! let state = Container::new();
//! make_reactive(&state, "x", 1);
//!
//! let output = Rc::new(RefCell::new(Vec::new()));
//! let (reader, sink) = (state.clone(), output.clone());
//! let _watcher = create_computation(move || {
//!     sink.borrow_mut().push(reader.get("x").unwrap());
//! });
//!
//! state.set("x", 1); // identical, nothing runs
//! state.set("x", 2);
//! assert_eq!(*output.borrow(), vec![Value::Int(1), Value::Int(2)]);
//! ```

pub mod reactive;

pub use reactive::{
    create_computation, make_reactive, observe, Container, Dep, ReactiveConfig, ReactiveContext,
    ReactiveError, TrackingMode, Value, Watcher,
};
