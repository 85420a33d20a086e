//! Error types shared by the matcher, the index and the store backends.

use std::fmt;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TallyError>;

/// Store operation that produced a [`TallyError::Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Insert,
    Count,
    Cleanup,
    Cardinality,
    Close,
}

impl StoreOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Count => "count",
            Self::Cleanup => "cleanup",
            Self::Cardinality => "cardinality",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of failures.
///
/// Source failures end an ingestion run, parse failures are absorbed by the
/// matcher, index failures go to the failure sink, query failures go back to
/// whoever asked for a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Source,
    Parse,
    Index,
    Query,
    Config,
}

/// Failures raised by an ordered-set backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    /// No pooled connection could be checked out before the deadline.
    #[error("store pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("store is closed")]
    Closed,

    #[error("{reason}")]
    Backend { reason: String },
}

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("record source failed: {reason}")]
    Source { reason: String },

    #[error("record has no usable text: {reason}")]
    Parse { reason: String },

    #[error("expected to add 1 member to set {keyword}, added {added}")]
    Cardinality { keyword: String, added: u64 },

    #[error("store {op} for {keyword} failed: {source}")]
    Store {
        op: StoreOp,
        keyword: String,
        #[source]
        source: StoreError,
    },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "http_source")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TallyError {
    pub(crate) fn store(op: StoreOp, keyword: &str, source: StoreError) -> Self {
        Self::Store {
            op,
            keyword: keyword.to_string(),
            source,
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Source { .. } => ErrorCategory::Source,
            #[cfg(feature = "http_source")]
            Self::Http(_) => ErrorCategory::Source,
            Self::Parse { .. } => ErrorCategory::Parse,
            Self::Cardinality { .. }
            | Self::Store {
                op: StoreOp::Insert,
                ..
            } => ErrorCategory::Index,
            Self::Store { .. } => ErrorCategory::Query,
            Self::Config { .. } | Self::Io(_) | Self::Json(_) => ErrorCategory::Config,
        }
    }

    #[must_use]
    pub fn is_index_error(&self) -> bool {
        self.category() == ErrorCategory::Index
    }
}
