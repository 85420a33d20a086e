#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions - these are allowed project-wide for pragmatic reasons:
//
// Documentation lints: Many internal/self-documenting functions don't need extensive docs.
// Public APIs should still have proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: casts are bounded by real-world constraints (counts, epoch
// micros, pool sizes).
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style/complexity:
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)]
//
// Pattern matching: These pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::if_same_then_else)]
#![allow(clippy::collapsible_match)]
//
// Performance/ergonomics trade-offs that are acceptable for this codebase:
#![allow(clippy::needless_pass_by_value)] // Many builders take owned values intentionally
#![allow(clippy::return_self_not_must_use)] // Builder patterns don't need must_use on every method
#![allow(clippy::format_push_string)] // Readability over minor perf difference
#![allow(clippy::assigning_clones)] // clone_from() often less readable
//
// Low-value pedantic lints that add noise:
#![allow(clippy::needless_continue)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::field_reassign_with_default)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::manual_clamp)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::ptr_arg)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::incompatible_msrv)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::duplicated_attributes)]
//
// Return value wrapping: Many functions use Result for consistency even when they
// currently can't fail, allowing future error conditions to be added without breaking API.
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::unused_self)]

//! Keyword occurrence tallying over a live record stream.
//!
//! A [`StreamMatcher`] reads records from a [`RecordSource`], matches each
//! record's text against a [`KeywordSet`] and records every hit in an
//! [`EventTimeIndex`]: one sorted set per keyword, scored by timestamp, backed
//! by Redis ([`RedisStore`]) or memory ([`MemoryStore`]). A
//! [`WordCountQuery`] answers "how many since T" and a [`RetentionSweeper`]
//! expires old occurrences.

/// The keyword-tally crate version (matches `Cargo.toml`).
pub const KEYWORD_TALLY_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod index;
pub mod keywords;
pub mod matcher;
pub mod query;
pub mod record;
pub mod retention;
pub mod source;
pub mod store;
pub mod telemetry;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock, score_of};
pub use config::{
    AuthConfig, MatcherConfig, RetentionConfig, SourceConfig, StoreConfig, TallyConfig,
};
pub use error::{ErrorCategory, Result, StoreError, StoreOp, TallyError};
pub use index::{
    EventTimeIndex, NonceGenerator, Occurrence, OccurrenceSink, RandomNonce, WordCounter,
};
pub use keywords::{Keyword, KeywordSet};
pub use matcher::{CollectFailures, DiscardFailures, FailureSink, StopHandle, StreamMatcher};
pub use query::{Period, QueryReply, WordCountQuery};
pub use record::extract_text;
pub use retention::RetentionSweeper;
pub use source::{BackgroundSource, LineSource, RecordSource};
#[cfg(feature = "http_source")]
pub use source::{
    Authenticator, BasicCredentials, BearerToken, FilterRequest, HttpStreamSource, NoAuth,
    OAuth1Credentials,
};
pub use store::{MemoryStore, OrderedSetStore, PoolStats, RedisStore, ScoreBound, ScoreRange};
pub use telemetry::Telemetry;
pub use types::{
    IndexOptions, MatcherOptions, MatcherOptionsBuilder, RetentionPolicy, RunSummary, SweepReport,
};
