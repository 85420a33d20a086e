//! Word counts over a trailing window, rendered as a transport-neutral reply
//! for `GET /wordcount/{period}`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::TimeDelta;
use serde::Serialize;

use crate::clock::Clock;
use crate::constants::{DEFAULT_QUERY_WINDOW_SECS, WORDCOUNT_ROUTE};
use crate::error::Result;
use crate::index::WordCounter;
use crate::keywords::KeywordSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Hour,
    Day,
    Week,
}

impl Period {
    /// Unknown periods fall back to [`Period::Day`].
    #[must_use]
    pub fn parse(segment: &str) -> Self {
        match segment.trim().to_ascii_lowercase().as_str() {
            "hour" => Self::Hour,
            "week" => Self::Week,
            _ => Self::Day,
        }
    }

    #[must_use]
    pub fn window(self) -> TimeDelta {
        match self {
            Self::Hour => TimeDelta::hours(1),
            Self::Day => TimeDelta::seconds(DEFAULT_QUERY_WINDOW_SECS),
            Self::Week => TimeDelta::days(7),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl QueryReply {
    fn json(body: String) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body,
        }
    }

    fn text(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct WordCountQuery<C> {
    counter: C,
    keywords: KeywordSet,
    clock: Arc<dyn Clock>,
}

impl<C: WordCounter> WordCountQuery<C> {
    pub fn new(counter: C, keywords: KeywordSet, clock: Arc<dyn Clock>) -> Self {
        Self {
            counter,
            keywords,
            clock,
        }
    }

    /// Count per keyword since `now - period.window()`. The first failing
    /// count aborts the whole query.
    pub fn word_counts(&self, period: Period) -> Result<BTreeMap<String, u64>> {
        let since = self.clock.now() - period.window();
        let mut counts = BTreeMap::new();
        for keyword in &self.keywords {
            let count = self.counter.count(keyword.as_str(), since)?;
            counts.insert(keyword.to_string(), count);
        }
        tracing::debug!(query.period = %period, query.since = %since, "word counts served");
        Ok(counts)
    }

    /// Reply for the `{period}` path segment.
    #[must_use]
    pub fn handle(&self, period: &str) -> QueryReply {
        let period = Period::parse(period);
        let rendered = self
            .word_counts(period)
            .and_then(|counts| Ok(serde_json::to_string(&counts)?));
        match rendered {
            Ok(body) => QueryReply::json(body),
            Err(err) => {
                tracing::warn!(query.period = %period, error = %err, "word count query failed");
                QueryReply::text(500, err.to_string())
            }
        }
    }

    /// Reply for a full request path; anything outside
    /// `/wordcount/{period}` is a 404.
    #[must_use]
    pub fn route(&self, path: &str) -> QueryReply {
        let path = path.split('?').next().unwrap_or_default();
        match path
            .strip_prefix(WORDCOUNT_ROUTE)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(period) if !period.is_empty() && !period.contains('/') => self.handle(period),
            _ => QueryReply::text(404, format!("no route for {path}")),
        }
    }
}
