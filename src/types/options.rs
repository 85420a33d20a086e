//! Builder-style options for the matcher, the index and the retention sweeper.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{MatcherConfig, RetentionConfig, StoreConfig};

/// Worker-pool sizing for a [`StreamMatcher`](crate::StreamMatcher).
///
/// `max_in_flight` bounds how many index tasks hit the store at once;
/// `queue_capacity` bounds how many matched-but-unstarted tasks may pile up
/// before the reader blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherOptions {
    pub max_in_flight: usize,
    pub queue_capacity: usize,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self::from(&MatcherConfig::default())
    }
}

impl From<&MatcherConfig> for MatcherOptions {
    fn from(config: &MatcherConfig) -> Self {
        Self {
            max_in_flight: config.max_in_flight.max(1),
            queue_capacity: config.effective_queue_capacity(),
        }
    }
}

impl MatcherOptions {
    /// Start a fluent builder for `MatcherOptions`.
    #[must_use]
    pub fn builder() -> MatcherOptionsBuilder {
        MatcherOptionsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatcherOptionsBuilder {
    inner: MatcherOptions,
    queue_set: bool,
}

impl MatcherOptionsBuilder {
    /// Also resizes the queue unless one was set explicitly.
    #[must_use]
    pub fn max_in_flight(mut self, workers: usize) -> Self {
        self.inner.max_in_flight = workers.max(1);
        if !self.queue_set {
            self.inner.queue_capacity = MatcherConfig {
                max_in_flight: self.inner.max_in_flight,
                queue_capacity: None,
            }
            .effective_queue_capacity();
        }
        self
    }

    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.inner.queue_capacity = capacity.max(1);
        self.queue_set = true;
        self
    }

    #[must_use]
    pub fn build(self) -> MatcherOptions {
        self.inner
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Prepended to each keyword to form its collection key.
    #[serde(default)]
    pub key_prefix: String,
}

impl From<&StoreConfig> for IndexOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            key_prefix: config.key_prefix.clone(),
        }
    }
}

/// How long occurrences are kept and how often expired ones are swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub window: Duration,
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&RetentionConfig::default())
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_derives_queue_from_workers() {
        let opts = MatcherOptions::builder().max_in_flight(3).build();
        assert_eq!(opts.max_in_flight, 3);
        assert_eq!(opts.queue_capacity, 6);
    }

    #[test]
    fn explicit_queue_survives_worker_changes() {
        let opts = MatcherOptions::builder()
            .queue_capacity(1)
            .max_in_flight(16)
            .build();
        assert_eq!(opts.max_in_flight, 16);
        assert_eq!(opts.queue_capacity, 1);
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let opts = MatcherOptions::builder()
            .max_in_flight(0)
            .queue_capacity(0)
            .build();
        assert_eq!(opts.max_in_flight, 1);
        assert_eq!(opts.queue_capacity, 1);
    }
}
