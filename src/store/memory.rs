use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{OrderedSetStore, ScoreBound, ScoreRange, StoreResult};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct SortedSet {
    by_score: BTreeMap<i64, BTreeSet<String>>,
    scores: HashMap<String, i64>,
}

impl SortedSet {
    fn insert(&mut self, score: i64, member: &str) -> bool {
        if self.scores.contains_key(member) {
            return false;
        }
        self.scores.insert(member.to_string(), score);
        self.by_score
            .entry(score)
            .or_default()
            .insert(member.to_string());
        true
    }

    fn count(&self, range: ScoreRange) -> u64 {
        let Some(bounds) = btree_bounds(range) else {
            return 0;
        };
        self.by_score
            .range(bounds)
            .map(|(_, members)| members.len() as u64)
            .sum()
    }

    fn remove(&mut self, range: ScoreRange) -> u64 {
        let Some(bounds) = btree_bounds(range) else {
            return 0;
        };
        let doomed: Vec<i64> = self.by_score.range(bounds).map(|(score, _)| *score).collect();
        let mut removed = 0;
        for score in doomed {
            if let Some(members) = self.by_score.remove(&score) {
                removed += members.len() as u64;
                for member in members {
                    self.scores.remove(&member);
                }
            }
        }
        removed
    }

    fn len(&self) -> u64 {
        self.scores.len() as u64
    }
}

/// `None` when the range is empty; `BTreeMap::range` panics on inverted bounds.
fn btree_bounds(range: ScoreRange) -> Option<(Bound<i64>, Bound<i64>)> {
    let lower = match range.min {
        ScoreBound::NegInf => Bound::Unbounded,
        ScoreBound::At(min) => Bound::Included(min),
        ScoreBound::PosInf => return None,
    };
    let upper = match range.max {
        ScoreBound::NegInf => return None,
        ScoreBound::At(max) => Bound::Included(max),
        ScoreBound::PosInf => Bound::Unbounded,
    };
    if let (Bound::Included(min), Bound::Included(max)) = (lower, upper) {
        if min > max {
            return None;
        }
    }
    Some((lower, upper))
}

/// In-process ordered-set store with the same semantics as the Redis backend.
///
/// Each call takes one lock for its whole duration, so every primitive is atomic.
/// Writes can be made to fail on demand to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sets: Mutex<HashMap<String, SortedSet>>,
    write_fault: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write (`add_if_absent`, `remove_by_score`) fail
    /// with `reason`.
    pub fn fail_writes(&self, reason: impl Into<String>) {
        *self
            .write_fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    pub fn heal(&self) {
        *self
            .write_fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Keys currently holding at least one member.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .sets()
            .iter()
            .filter(|(_, set)| set.len() > 0)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn sets(&self) -> MutexGuard<'_, HashMap<String, SortedSet>> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        self.ensure_open()?;
        let fault = self
            .write_fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match fault {
            Some(reason) => Err(StoreError::Backend { reason }),
            None => Ok(()),
        }
    }
}

impl OrderedSetStore for MemoryStore {
    fn add_if_absent(&self, key: &str, score: i64, member: &str) -> StoreResult<u64> {
        self.ensure_writable()?;
        let added = self
            .sets()
            .entry(key.to_string())
            .or_default()
            .insert(score, member);
        Ok(u64::from(added))
    }

    fn count_by_score(&self, key: &str, range: ScoreRange) -> StoreResult<u64> {
        self.ensure_open()?;
        Ok(self.sets().get(key).map_or(0, |set| set.count(range)))
    }

    fn remove_by_score(&self, key: &str, range: ScoreRange) -> StoreResult<u64> {
        self.ensure_writable()?;
        Ok(self.sets().get_mut(key).map_or(0, |set| set.remove(range)))
    }

    fn cardinality(&self, key: &str) -> StoreResult<u64> {
        self.ensure_open()?;
        Ok(self.sets().get(key).map_or(0, SortedSet::len))
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_members_are_not_added() {
        let store = MemoryStore::new();
        assert_eq!(store.add_if_absent("k", 5, "a").unwrap(), 1);
        assert_eq!(store.add_if_absent("k", 5, "b").unwrap(), 1);
        assert_eq!(store.add_if_absent("k", 9, "a").unwrap(), 0);
        assert_eq!(store.cardinality("k").unwrap(), 2);
    }

    #[test]
    fn count_and_remove_respect_inclusive_bounds() {
        let store = MemoryStore::new();
        for (score, member) in [(1, "a"), (2, "b"), (2, "c"), (3, "d"), (7, "e")] {
            store.add_if_absent("k", score, member).unwrap();
        }
        assert_eq!(store.count_by_score("k", ScoreRange::at_least(2)).unwrap(), 4);
        assert_eq!(store.count_by_score("k", ScoreRange::at_least(8)).unwrap(), 0);

        assert_eq!(store.remove_by_score("k", ScoreRange::at_most(2)).unwrap(), 3);
        assert_eq!(store.cardinality("k").unwrap(), 2);
        assert_eq!(store.count_by_score("k", ScoreRange::at_least(0)).unwrap(), 2);
    }

    #[test]
    fn inverted_ranges_are_empty() {
        let store = MemoryStore::new();
        store.add_if_absent("k", 4, "a").unwrap();
        let inverted = ScoreRange {
            min: ScoreBound::At(10),
            max: ScoreBound::At(1),
        };
        assert_eq!(store.count_by_score("k", inverted).unwrap(), 0);
        assert_eq!(store.remove_by_score("k", inverted).unwrap(), 0);
    }

    #[test]
    fn injected_write_faults_spare_reads() {
        let store = MemoryStore::new();
        store.add_if_absent("k", 1, "a").unwrap();
        store.fail_writes("o no!");
        let err = store.add_if_absent("k", 2, "b").unwrap_err();
        assert_eq!(err.to_string(), "o no!");
        assert_eq!(store.cardinality("k").unwrap(), 1);

        store.heal();
        assert_eq!(store.add_if_absent("k", 2, "b").unwrap(), 1);
    }

    #[test]
    fn closed_store_rejects_calls() {
        let store = MemoryStore::new();
        store.close().unwrap();
        assert!(matches!(
            store.count_by_score("k", ScoreRange::at_least(0)),
            Err(StoreError::Closed)
        ));
    }
}
