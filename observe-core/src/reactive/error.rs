//! Error types for the reactive core.
//!
//! Reads, writes and notifications never fail. These errors belong to the
//! surfaces around them: checked property access, value conversion, update
//! depth limiting, configuration parsing and snapshots.

use thiserror::Error;

/// Errors reported by the fallible reactive operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// The container has no property with this name.
    #[error("no property named `{key}`")]
    MissingKey {
        /// The key that was looked up.
        key: String,
    },

    /// A value was converted to a type it does not hold.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// The requested kind.
        expected: &'static str,
        /// The kind actually held.
        found: &'static str,
    },

    /// Nested watcher updates went deeper than the configured limit.
    ///
    /// Usually a computation that writes a cell it also reads.
    #[error("watcher update depth limit of {limit} exceeded")]
    DepthExceeded {
        /// The configured `max_depth`.
        limit: usize,
    },

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A container snapshot could not be serialized (it contains itself).
    #[error("snapshot failed: {0}")]
    Snapshot(#[source] serde_json::Error),
}
