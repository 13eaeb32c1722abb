//! Reactive Configuration
//!
//! Each thread carries its own `ReactiveConfig`, just as it carries its own
//! context stack. The configuration is read at the moment it matters:
//!
//! - `tracking` when a watcher is created (the watcher keeps it for life)
//! - `recursive` when a property is observed
//! - `max_depth` every time a watcher update starts
//!
//! Nested watcher updates are unbounded by default, so a long chain of
//! watchers propagates to its end. Setting `max_depth` caps the nesting.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use super::error::ReactiveError;

thread_local! {
    static CURRENT: Cell<ReactiveConfig> = Cell::new(ReactiveConfig::default());
}

/// How a watcher maintains its subscriptions across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Subscriptions are deduplicated within a run, and registries the
    /// watcher stopped reading are pruned after each run.
    #[default]
    Rebuild,

    /// Every tracked read appends a subscription and nothing is ever pruned.
    /// A registry read N times by the same watcher notifies it N times.
    Accumulate,
}

/// Per-thread settings for the reactive core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// Subscription bookkeeping used by newly created watchers.
    pub tracking: TrackingMode,

    /// Whether observing a container value also makes its fields reactive.
    pub recursive: bool,

    /// Maximum number of watcher updates nested on one call stack, if any.
    pub max_depth: Option<usize>,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingMode::default(),
            recursive: true,
            max_depth: None,
        }
    }
}

impl ReactiveConfig {
    /// The configuration in effect on this thread.
    pub fn current() -> Self {
        CURRENT.with(Cell::get)
    }

    /// Make this the configuration for the current thread.
    ///
    /// Returns the configuration it replaced.
    pub fn install(self) -> Self {
        CURRENT.with(|current| current.replace(self))
    }

    /// Install this configuration until the returned guard is dropped.
    pub fn scoped(self) -> ConfigScope {
        ConfigScope {
            previous: self.install(),
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ReactiveError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn without_max_depth(mut self) -> Self {
        self.max_depth = None;
        self
    }
}

/// Restores the previously installed configuration when dropped.
#[must_use = "the configuration is reverted as soon as the scope is dropped"]
pub struct ConfigScope {
    previous: ReactiveConfig,
}

impl Drop for ConfigScope {
    fn drop(&mut self) {
        self.previous.install();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReactiveConfig::default();
        assert_eq!(config.tracking, TrackingMode::Rebuild);
        assert!(config.recursive);
        assert_eq!(config.max_depth, None);
    }

    #[test]
    fn scoped_config_is_restored() {
        assert_eq!(ReactiveConfig::current(), ReactiveConfig::default());

        {
            let _scope = ReactiveConfig::default()
                .with_tracking(TrackingMode::Accumulate)
                .with_max_depth(4)
                .scoped();

            let current = ReactiveConfig::current();
            assert_eq!(current.tracking, TrackingMode::Accumulate);
            assert_eq!(current.max_depth, Some(4));
        }

        assert_eq!(ReactiveConfig::current(), ReactiveConfig::default());
    }

    #[test]
    fn install_returns_previous() {
        let custom = ReactiveConfig::default().with_recursive(false);
        let previous = custom.install();
        assert_eq!(previous, ReactiveConfig::default());
        assert_eq!(ReactiveConfig::default().install(), custom);
    }

    #[test]
    fn parses_partial_json() {
        let config = ReactiveConfig::from_json_str(r#"{ "tracking": "accumulate" }"#).unwrap();
        assert_eq!(config.tracking, TrackingMode::Accumulate);
        assert!(config.recursive);
        assert_eq!(config.max_depth, None);
    }

    #[test]
    fn parses_explicit_depth_limit() {
        let config = ReactiveConfig::from_json_str(r#"{ "max_depth": 16 }"#).unwrap();
        assert_eq!(config.max_depth, Some(16));

        let config = ReactiveConfig::from_json_str(r#"{ "max_depth": null }"#).unwrap();
        assert_eq!(config.max_depth, None);
        assert_eq!(config.with_max_depth(3).without_max_depth(), ReactiveConfig::default());
    }

    #[test]
    fn rejects_unknown_tracking_mode() {
        let err = ReactiveConfig::from_json_str(r#"{ "tracking": "lazy" }"#).unwrap_err();
        assert!(matches!(err, ReactiveError::Config(_)));
    }
}
