//! r2d2 connection management for the Redis store.
//!
//! r2d2 owns capacity, checkout deadlines and idle reaping. This module only
//! dials connections with bounded connect and call timeouts, routes pool
//! errors into tracing, and counts what it opened and threw away.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use redis::{Client, Connection, ConnectionLike, RedisError};

use crate::config::StoreConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Connections currently open, idle or on loan.
    pub open: usize,
    pub idle: usize,
    pub opened_total: u64,
    /// Connections discarded because they broke while on loan.
    pub broken_total: u64,
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    opened: AtomicU64,
    broken: AtomicU64,
}

impl PoolCounters {
    pub fn stats(&self, state: Option<r2d2::State>) -> PoolStats {
        let (open, idle) = state.map_or((0, 0), |state| {
            (state.connections as usize, state.idle_connections as usize)
        });
        PoolStats {
            open,
            idle,
            opened_total: self.opened.load(Ordering::Relaxed),
            broken_total: self.broken.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub(crate) struct RedisConnectionManager {
    client: Client,
    connect_timeout: Duration,
    call_timeout: Duration,
    counters: Arc<PoolCounters>,
}

impl r2d2::ManageConnection for RedisConnectionManager {
    type Connection = Connection;
    type Error = RedisError;

    fn connect(&self) -> Result<Connection, RedisError> {
        let conn = self.client.get_connection_with_timeout(self.connect_timeout)?;
        conn.set_read_timeout(Some(self.call_timeout))?;
        conn.set_write_timeout(Some(self.call_timeout))?;
        self.counters.opened.fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), RedisError> {
        redis::cmd("PING").query::<String>(conn).map(drop)
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        let broken = !conn.is_open();
        if broken {
            self.counters.broken.fetch_add(1, Ordering::Relaxed);
        }
        broken
    }
}

#[derive(Debug)]
struct TracingErrorHandler;

impl r2d2::HandleError<RedisError> for TracingErrorHandler {
    fn handle_error(&self, error: RedisError) {
        tracing::warn!(error = %error, "store connection attempt failed");
    }
}

pub(crate) type RedisPool = r2d2::Pool<RedisConnectionManager>;

/// r2d2 rejects zero durations and sizes; clamp them to the smallest legal
/// value instead.
fn positive(duration: Duration) -> Duration {
    duration.max(Duration::from_millis(1))
}

/// Build the pool without dialing; connections open on first checkout.
pub(crate) fn build(
    client: Client,
    config: &StoreConfig,
    max_size: usize,
    counters: Arc<PoolCounters>,
) -> RedisPool {
    let manager = RedisConnectionManager {
        client,
        connect_timeout: positive(config.connect_timeout()),
        call_timeout: positive(config.call_timeout()),
        counters,
    };
    // A zero idle timeout keeps idle connections forever.
    let idle_timeout = Some(config.idle_timeout()).filter(|timeout| !timeout.is_zero());
    r2d2::Pool::builder()
        .max_size(u32::try_from(max_size).unwrap_or(u32::MAX).max(1))
        .min_idle(Some(0))
        .idle_timeout(idle_timeout)
        .max_lifetime(None)
        .test_on_check_out(false)
        .connection_timeout(positive(config.checkout_timeout()))
        .error_handler(Box::new(TracingErrorHandler))
        .build_unchecked(manager)
}
