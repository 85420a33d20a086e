//! Ordered-set backends the event time index is built on.
//!
//! A backend stores `(score, member)` pairs per key and offers three atomic
//! primitives: add-if-absent, count-by-score-range and remove-by-score-range.

mod memory;
mod pool;
mod redis_store;

pub use memory::MemoryStore;
pub use pool::PoolStats;
pub use redis_store::RedisStore;

use std::fmt;

use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Inclusive end of a score range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    NegInf,
    At(i64),
    PosInf,
}

impl ScoreBound {
    pub(crate) fn includes_from_below(self, score: i64) -> bool {
        match self {
            Self::NegInf => true,
            Self::At(min) => score >= min,
            Self::PosInf => false,
        }
    }

    pub(crate) fn includes_from_above(self, score: i64) -> bool {
        match self {
            Self::NegInf => false,
            Self::At(max) => score <= max,
            Self::PosInf => true,
        }
    }
}

/// Renders the bound the way Redis range commands expect it.
impl fmt::Display for ScoreBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegInf => f.write_str("-inf"),
            Self::At(score) => write!(f, "{score}"),
            Self::PosInf => f.write_str("+inf"),
        }
    }
}

/// Closed score interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRange {
    pub min: ScoreBound,
    pub max: ScoreBound,
}

impl ScoreRange {
    /// Every score `>= min`.
    #[must_use]
    pub fn at_least(min: i64) -> Self {
        Self {
            min: ScoreBound::At(min),
            max: ScoreBound::PosInf,
        }
    }

    /// Every score `<= max`.
    #[must_use]
    pub fn at_most(max: i64) -> Self {
        Self {
            min: ScoreBound::NegInf,
            max: ScoreBound::At(max),
        }
    }

    #[must_use]
    pub fn contains(&self, score: i64) -> bool {
        self.min.includes_from_below(score) && self.max.includes_from_above(score)
    }
}

/// Networked or in-process sorted-set store.
///
/// Every call is atomic at the store; callers never need in-process locking.
pub trait OrderedSetStore: Send + Sync {
    /// Add `member` with `score` unless it is already present. Returns how many
    /// members were added (0 or 1).
    fn add_if_absent(&self, key: &str, score: i64, member: &str) -> StoreResult<u64>;

    fn count_by_score(&self, key: &str, range: ScoreRange) -> StoreResult<u64>;

    /// Returns how many members were removed.
    fn remove_by_score(&self, key: &str, range: ScoreRange) -> StoreResult<u64>;

    fn cardinality(&self, key: &str) -> StoreResult<u64>;

    fn close(&self) -> StoreResult<()>;
}

impl<S: OrderedSetStore + ?Sized> OrderedSetStore for std::sync::Arc<S> {
    fn add_if_absent(&self, key: &str, score: i64, member: &str) -> StoreResult<u64> {
        (**self).add_if_absent(key, score, member)
    }

    fn count_by_score(&self, key: &str, range: ScoreRange) -> StoreResult<u64> {
        (**self).count_by_score(key, range)
    }

    fn remove_by_score(&self, key: &str, range: ScoreRange) -> StoreResult<u64> {
        (**self).remove_by_score(key, range)
    }

    fn cardinality(&self, key: &str) -> StoreResult<u64> {
        (**self).cardinality(key)
    }

    fn close(&self) -> StoreResult<()> {
        (**self).close()
    }
}
