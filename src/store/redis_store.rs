use std::sync::{Arc, PoisonError, RwLock};

use redis::{Cmd, FromRedisValue};

use super::pool::{self, PoolCounters, PoolStats, RedisPool};
use super::{OrderedSetStore, ScoreRange, StoreResult};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// Redis sorted sets behind a pooled, deadline-bounded client.
pub struct RedisStore {
    /// `None` once closed.
    pool: RwLock<Option<RedisPool>>,
    counters: Arc<PoolCounters>,
    url: String,
}

impl RedisStore {
    /// Build the pool. No connection is opened until the first call.
    pub fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let url = redis_url(&config.address);
        let client = redis::Client::open(url.as_str())?;
        let pool_size = config.default_pool_size();
        let counters = Arc::new(PoolCounters::default());
        let pool = pool::build(client, config, pool_size, Arc::clone(&counters));
        tracing::info!(
            store.url = %url,
            store.pool_size = pool.max_size(),
            store.idle_timeout_secs = config.idle_timeout_secs,
            "redis store configured"
        );
        Ok(Self {
            pool: RwLock::new(Some(pool)),
            counters,
            url,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        let state = self.pool().ok().map(|pool| pool.state());
        self.counters.stats(state)
    }

    fn pool(&self) -> StoreResult<RedisPool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::Closed)
    }

    /// Broken connections are dropped by the pool when they come back.
    fn run<T: FromRedisValue>(&self, cmd: &Cmd) -> StoreResult<T> {
        let mut conn = self.pool()?.get()?;
        Ok(cmd.query::<T>(&mut *conn)?)
    }
}

impl OrderedSetStore for RedisStore {
    fn add_if_absent(&self, key: &str, score: i64, member: &str) -> StoreResult<u64> {
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(key).arg("NX").arg(score).arg(member);
        self.run(&cmd)
    }

    fn count_by_score(&self, key: &str, range: ScoreRange) -> StoreResult<u64> {
        let mut cmd = redis::cmd("ZCOUNT");
        cmd.arg(key)
            .arg(range.min.to_string())
            .arg(range.max.to_string());
        self.run(&cmd)
    }

    fn remove_by_score(&self, key: &str, range: ScoreRange) -> StoreResult<u64> {
        let mut cmd = redis::cmd("ZREMRANGEBYSCORE");
        cmd.arg(key)
            .arg(range.min.to_string())
            .arg(range.max.to_string());
        self.run(&cmd)
    }

    fn cardinality(&self, key: &str) -> StoreResult<u64> {
        let mut cmd = redis::cmd("ZCARD");
        cmd.arg(key);
        self.run(&cmd)
    }

    /// Idle connections close with the pool; loaned ones when returned.
    fn close(&self) -> StoreResult<()> {
        let pool = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(pool);
        tracing::debug!(store.url = %self.url, "redis store closed");
        Ok(())
    }
}

/// Accepts a bare `host:port` or a full `redis://` / `rediss://` URL.
fn redis_url(address: &str) -> String {
    if address.starts_with("redis://") || address.starts_with("rediss://") {
        address.to_string()
    } else {
        format!("redis://{address}/")
    }
}
