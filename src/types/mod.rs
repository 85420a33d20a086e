//! Plain data types shared across the crate.

pub mod options;
pub mod stats;

pub use options::{IndexOptions, MatcherOptions, MatcherOptionsBuilder, RetentionPolicy};
pub use stats::{RunSummary, SweepReport};

pub(crate) use stats::RunCounters;
