//! Event time index: per-keyword occurrence collections keyed by timestamp.
//!
//! Each keyword owns one sorted set. An occurrence is stored as
//! `(score = epoch micros, member = nonce)`; the nonce makes every occurrence
//! a distinct member, so equal timestamps never collapse. Counting and
//! expiry are pure score-range predicates, which is why no ordering between
//! concurrent writers is required.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::{Clock, score_of};
use crate::error::{Result, StoreOp, TallyError};
use crate::keywords::Keyword;
use crate::store::{OrderedSetStore, ScoreRange};
use crate::telemetry::Telemetry;
use crate::types::IndexOptions;

/// Source of collision-resistant occurrence identifiers.
pub trait NonceGenerator: Send + Sync {
    fn next_nonce(&self) -> String;
}

/// Random 128-bit identifiers, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomNonce;

impl NonceGenerator for RandomNonce {
    fn next_nonce(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// One recorded match of a keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub keyword: String,
    pub timestamp: DateTime<Utc>,
    pub nonce: String,
}

impl Occurrence {
    #[must_use]
    pub fn score(&self) -> i64 {
        score_of(self.timestamp)
    }
}

/// Destination for confirmed matches.
pub trait OccurrenceSink: Send + Sync {
    fn record(&self, keyword: &Keyword, at: DateTime<Utc>) -> Result<()>;
}

impl<T: OccurrenceSink + ?Sized> OccurrenceSink for Arc<T> {
    fn record(&self, keyword: &Keyword, at: DateTime<Utc>) -> Result<()> {
        (**self).record(keyword, at)
    }
}

/// Read side used by the query façade.
pub trait WordCounter: Send + Sync {
    fn count(&self, keyword: &str, since: DateTime<Utc>) -> Result<u64>;
}

impl<T: WordCounter + ?Sized> WordCounter for Arc<T> {
    fn count(&self, keyword: &str, since: DateTime<Utc>) -> Result<u64> {
        (**self).count(keyword, since)
    }
}

pub struct EventTimeIndex<S> {
    store: S,
    clock: Arc<dyn Clock>,
    nonces: Box<dyn NonceGenerator>,
    key_prefix: String,
    telemetry: Telemetry,
}

impl<S: OrderedSetStore> EventTimeIndex<S> {
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        options: IndexOptions,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            store,
            clock,
            nonces: Box::new(RandomNonce),
            key_prefix: options.key_prefix,
            telemetry,
        }
    }

    #[must_use]
    pub fn with_nonce_generator(mut self, nonces: impl NonceGenerator + 'static) -> Self {
        self.nonces = Box::new(nonces);
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn key_for(&self, keyword: &str) -> String {
        format!("{}{keyword}", self.key_prefix)
    }

    /// Store a new occurrence of `keyword` at `at`.
    ///
    /// Fails with [`TallyError::Cardinality`] when the store did not grow by
    /// exactly one member, and with [`TallyError::Store`] when the call itself
    /// failed.
    pub fn insert(&self, keyword: &str, at: DateTime<Utc>) -> Result<Occurrence> {
        self.telemetry.in_scope(|| {
            let occurrence = Occurrence {
                keyword: keyword.to_string(),
                timestamp: at,
                nonce: self.nonces.next_nonce(),
            };
            let added = self
                .store
                .add_if_absent(&self.key_for(keyword), occurrence.score(), &occurrence.nonce)
                .map_err(|source| TallyError::store(StoreOp::Insert, keyword, source))?;
            if added != 1 {
                tracing::warn!(
                    keyword,
                    index.score = occurrence.score(),
                    index.added = added,
                    "occurrence insert did not add exactly one member"
                );
                return Err(TallyError::Cardinality {
                    keyword: keyword.to_string(),
                    added,
                });
            }
            tracing::trace!(keyword, index.score = occurrence.score(), "occurrence indexed");
            Ok(occurrence)
        })
    }

    pub fn insert_now(&self, keyword: &str) -> Result<Occurrence> {
        self.insert(keyword, self.clock.now())
    }

    /// Occurrences with timestamp `>= since`.
    pub fn count(&self, keyword: &str, since: DateTime<Utc>) -> Result<u64> {
        self.telemetry.in_scope(|| {
            let count = self
                .store
                .count_by_score(&self.key_for(keyword), ScoreRange::at_least(score_of(since)))
                .map_err(|source| TallyError::store(StoreOp::Count, keyword, source))?;
            tracing::debug!(
                keyword,
                index.since = %since,
                index.count = count,
                "counted occurrences"
            );
            Ok(count)
        })
    }

    /// Remove occurrences with timestamp `<= before`; returns how many went.
    pub fn cleanup(&self, keyword: &str, before: DateTime<Utc>) -> Result<u64> {
        self.telemetry.in_scope(|| {
            let removed = self
                .store
                .remove_by_score(&self.key_for(keyword), ScoreRange::at_most(score_of(before)))
                .map_err(|source| TallyError::store(StoreOp::Cleanup, keyword, source))?;
            tracing::debug!(
                keyword,
                index.before = %before,
                index.removed = removed,
                "expired occurrences"
            );
            Ok(removed)
        })
    }

    pub fn cardinality(&self, keyword: &str) -> Result<u64> {
        self.store
            .cardinality(&self.key_for(keyword))
            .map_err(|source| TallyError::store(StoreOp::Cardinality, keyword, source))
    }

    /// Release backing connections. Later calls fail.
    pub fn close(&self) -> Result<()> {
        self.telemetry.in_scope(|| {
            tracing::info!("closing event time index");
            self.store
                .close()
                .map_err(|source| TallyError::store(StoreOp::Close, "*", source))
        })
    }
}

impl<S: OrderedSetStore> OccurrenceSink for EventTimeIndex<S> {
    fn record(&self, keyword: &Keyword, at: DateTime<Utc>) -> Result<()> {
        self.insert(keyword.as_str(), at).map(|_| ())
    }
}

impl<S: OrderedSetStore> WordCounter for EventTimeIndex<S> {
    fn count(&self, keyword: &str, since: DateTime<Utc>) -> Result<u64> {
        EventTimeIndex::count(self, keyword, since)
    }
}
