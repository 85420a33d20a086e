//! Defaults shared by configuration, the store pool and the query façade.

use std::time::Duration;

pub const DEFAULT_STORE_ADDRESS: &str = "localhost:6379";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(10);
/// Extra pool slots on top of the matcher fan-out, reserved for query callers.
pub const POOL_HEADROOM: usize = 4;

/// Worker threads per CPU when `max_in_flight` is not configured.
pub const WORKERS_PER_CPU: usize = 4;
/// Queue slots per worker when `queue_capacity` is not configured.
pub const QUEUE_SLOTS_PER_WORKER: usize = 2;

pub const DEFAULT_QUERY_WINDOW_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_RETENTION_WINDOW_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

pub const DEFAULT_STREAM_BASE_URL: &str = "https://stream.twitter.com";
pub const STREAM_FILTER_PATH: &str = "/1.1/statuses/filter.json";
/// Form parameter carrying the comma-joined keyword filter.
pub const TRACK_PARAM: &str = "track";

/// JSON field holding the record's text payload.
pub const TEXT_FIELD: &str = "text";

/// Path prefix of the word count query; the period follows as one segment.
pub const WORDCOUNT_ROUTE: &str = "/wordcount";

/// How often a [`crate::BackgroundSource`] waiting on a quiet stream re-checks
/// its stop handle.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Records a background reader may buffer ahead of the matcher.
pub const BACKGROUND_SOURCE_BUFFER: usize = 64;
