//! Process-start configuration.
//!
//! Everything is optional in the JSON form; missing sections fall back to the
//! defaults in [`crate::constants`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_CHECKOUT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_RETENTION_WINDOW_SECS, DEFAULT_STORE_ADDRESS,
    DEFAULT_STREAM_BASE_URL, DEFAULT_SWEEP_INTERVAL_SECS, POOL_HEADROOM, QUEUE_SLOTS_PER_WORKER,
    WORKERS_PER_CPU,
};
use crate::error::{Result, TallyError};
use crate::keywords::KeywordSet;

fn default_max_in_flight() -> usize {
    (num_cpus::get() * WORKERS_PER_CPU).max(1)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Accept either `["a", "b"]` or `"a,b"`.
fn keywords_list_or_csv<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keywords {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Keywords::deserialize(deserializer)? {
        Keywords::List(list) => list,
        Keywords::Csv(csv) => csv.split(',').map(str::to_string).collect(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default, deserialize_with = "keywords_list_or_csv")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl TallyConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.keyword_set().is_empty() {
            return Err(TallyError::Config {
                reason: "at least one non-empty keyword is required".into(),
            });
        }
        if self.matcher.max_in_flight == 0 {
            return Err(TallyError::Config {
                reason: "matcher.max_in_flight must be non-zero".into(),
            });
        }
        let max_in_flight = self.matcher.max_in_flight;
        if let Some(pool_size) = self.store.pool_size.filter(|&size| size < max_in_flight) {
            return Err(TallyError::Config {
                reason: format!(
                    "store.pool_size ({pool_size}) must be at least matcher.max_in_flight \
                     ({max_in_flight})"
                ),
            });
        }
        if self.matcher.queue_capacity == Some(0) {
            return Err(TallyError::Config {
                reason: "matcher.queue_capacity must be non-zero".into(),
            });
        }
        for (field, value) in [
            ("store.connect_timeout_ms", self.store.connect_timeout_ms),
            ("store.call_timeout_ms", self.store.call_timeout_ms),
            ("store.checkout_timeout_ms", self.store.checkout_timeout_ms),
            ("source.connect_timeout_ms", self.source.connect_timeout_ms),
            ("retention.sweep_interval_secs", self.retention.sweep_interval_secs),
        ] {
            if value == 0 {
                return Err(TallyError::Config {
                    reason: format!("{field} must be non-zero"),
                });
            }
        }
        Ok(())
    }

    /// The store section with the pool size resolved against the matcher.
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            pool_size: Some(self.store.effective_pool_size(self.matcher.max_in_flight)),
            ..self.store.clone()
        }
    }

    #[must_use]
    pub fn keyword_set(&self) -> KeywordSet {
        KeywordSet::new(&self.keywords)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `host:port` or a `redis://` URL.
    pub address: String,
    /// Prepended to every keyword to form the sorted-set key.
    pub key_prefix: String,
    /// `None` sizes the pool from the matcher fan-out plus
    /// [`POOL_HEADROOM`] slots for query callers.
    pub pool_size: Option<usize>,
    pub idle_timeout_secs: u64,
    pub connect_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub checkout_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_STORE_ADDRESS.to_string(),
            key_prefix: String::new(),
            pool_size: None,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            connect_timeout_ms: duration_ms(DEFAULT_CONNECT_TIMEOUT),
            call_timeout_ms: duration_ms(DEFAULT_CALL_TIMEOUT),
            checkout_timeout_ms: duration_ms(DEFAULT_CHECKOUT_TIMEOUT),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn effective_pool_size(&self, max_in_flight: usize) -> usize {
        self.pool_size
            .unwrap_or(max_in_flight + POOL_HEADROOM)
            .max(1)
    }

    /// Pool size when no matcher configuration is at hand.
    #[must_use]
    pub fn default_pool_size(&self) -> usize {
        self.effective_pool_size(default_max_in_flight())
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    #[must_use]
    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Worker threads executing index tasks.
    pub max_in_flight: usize,
    /// Bounded queue between the reader and the workers; `None` derives it from
    /// `max_in_flight`.
    pub queue_capacity: Option<usize>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            queue_capacity: None,
        }
    }
}

impl MatcherConfig {
    #[must_use]
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or(self.max_in_flight * QUEUE_SLOTS_PER_WORKER)
            .max(1)
    }
}

/// Credentials attached to the upstream stream request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthConfig {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: Option<String>,
    },
    /// OAuth 1.0a user context, HMAC-SHA1 signed.
    #[serde(rename = "oauth1")]
    OAuth1 {
        consumer_key: String,
        consumer_secret: String,
        access_token: String,
        access_token_secret: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub auth: AuthConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STREAM_BASE_URL.to_string(),
            connect_timeout_ms: duration_ms(DEFAULT_CONNECT_TIMEOUT) * 5,
            auth: AuthConfig::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub window_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_RETENTION_WINDOW_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}
