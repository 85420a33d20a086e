//! Stream matcher: records in, index tasks out.
//!
//! The reader thread pulls records in delivery order, extracts their text and
//! turns every matching keyword into an [`IndexTask`] on a bounded queue. A
//! fixed pool of workers drains the queue against the [`OccurrenceSink`]. A
//! full queue blocks the reader, so a keyword storm slows ingestion down
//! instead of spawning unbounded work. A run ends only after the queue is
//! closed, drained and every worker has been joined.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::clock::Clock;
use crate::error::{ErrorCategory, Result, TallyError};
use crate::index::OccurrenceSink;
use crate::keywords::{Keyword, KeywordSet};
use crate::record;
use crate::source::RecordSource;
use crate::telemetry::Telemetry;
use crate::types::{MatcherOptions, RunCounters, RunSummary};

/// Receives index task failures. Never allowed to stop ingestion.
pub trait FailureSink: Send + Sync {
    fn report(&self, error: TallyError);
}

/// Non-blocking: a full or disconnected channel drops the error with a warning.
impl FailureSink for Sender<TallyError> {
    fn report(&self, error: TallyError) {
        match self.try_send(error) {
            Ok(()) => {}
            Err(TrySendError::Full(error)) => {
                tracing::warn!(error = %error, "failure channel full; dropping error");
            }
            Err(TrySendError::Disconnected(error)) => {
                tracing::warn!(error = %error, "failure channel closed; dropping error");
            }
        }
    }
}

/// Failures are already logged by the matcher; this sink keeps nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardFailures;

impl FailureSink for DiscardFailures {
    fn report(&self, _error: TallyError) {}
}

/// Keeps every reported failure in memory.
#[derive(Debug, Default)]
pub struct CollectFailures {
    errors: Mutex<Vec<TallyError>>,
}

impl CollectFailures {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn take(&self) -> Vec<TallyError> {
        std::mem::take(&mut *self.errors.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl FailureSink for CollectFailures {
    fn report(&self, error: TallyError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }
}

/// Cooperative stop signal for a running matcher.
///
/// Checked before each pull. A pull already blocked in the source is not
/// interrupted unless the source watches the same handle, as
/// [`crate::BackgroundSource`] does.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone)]
struct IndexTask {
    keyword: Keyword,
    at: DateTime<Utc>,
}

pub struct StreamMatcher<I> {
    sink: I,
    keywords: KeywordSet,
    clock: Arc<dyn Clock>,
    options: MatcherOptions,
    telemetry: Telemetry,
}

impl<I: OccurrenceSink> StreamMatcher<I> {
    pub fn new(
        sink: I,
        keywords: KeywordSet,
        clock: Arc<dyn Clock>,
        options: MatcherOptions,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            sink,
            keywords,
            clock,
            options,
            telemetry,
        }
    }

    #[must_use]
    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    #[must_use]
    pub fn options(&self) -> MatcherOptions {
        self.options
    }

    /// Ingest until the source is exhausted or fails.
    pub fn run(
        &self,
        source: &mut dyn RecordSource,
        failures: &dyn FailureSink,
    ) -> Result<RunSummary> {
        self.run_until(source, failures, &StopHandle::new())
    }

    /// Ingest until the source is exhausted, fails, or `stop` is raised.
    ///
    /// Index failures go to `failures` and never end the run. A source failure
    /// is returned as the error, after every queued task has finished.
    pub fn run_until(
        &self,
        source: &mut dyn RecordSource,
        failures: &dyn FailureSink,
        stop: &StopHandle,
    ) -> Result<RunSummary> {
        let counters = RunCounters::default();
        self.telemetry.in_scope(|| {
            tracing::info!(
                matcher.keywords = %self.keywords.track_param(),
                matcher.workers = self.options.max_in_flight,
                matcher.queue = self.options.queue_capacity,
                "ingestion started"
            );
            let outcome = thread::scope(|scope| -> Result<bool> {
                let (tasks, queue) =
                    crossbeam_channel::bounded::<IndexTask>(self.options.queue_capacity);
                for worker in 0..self.options.max_in_flight {
                    let queue = queue.clone();
                    let counters = &counters;
                    thread::Builder::new()
                        .name(format!("tally-index-{worker}"))
                        .spawn_scoped(scope, move || {
                            self.telemetry
                                .in_scope(|| self.drain(&queue, failures, counters));
                        })?;
                }
                drop(queue);
                // `tasks` drops when this closure returns, which lets the
                // workers finish before the scope joins them.
                self.pump(source, &tasks, stop, &counters)
            });

            match outcome {
                Ok(stopped) => {
                    let summary = counters.summary(stopped);
                    tracing::info!(
                        matcher.records = summary.records_read,
                        matcher.skipped = summary.records_skipped,
                        matcher.matches = summary.matches,
                        matcher.indexed = summary.indexed,
                        matcher.failures = summary.failures,
                        matcher.stopped = summary.stopped,
                        "ingestion finished"
                    );
                    Ok(summary)
                }
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        matcher.records = counters.summary(false).records_read,
                        "ingestion aborted"
                    );
                    Err(err)
                }
            }
        })
    }

    /// Returns `Ok(true)` when stopped, `Ok(false)` when the source ran dry.
    /// A [`TallyError::Parse`] from the source skips that record only.
    fn pump(
        &self,
        source: &mut dyn RecordSource,
        tasks: &Sender<IndexTask>,
        stop: &StopHandle,
        counters: &RunCounters,
    ) -> Result<bool> {
        loop {
            if stop.is_stopped() {
                tracing::info!("stop requested; no further records will be pulled");
                return Ok(true);
            }
            let raw = match source.next_record() {
                Ok(Some(raw)) => raw,
                // A stop-aware source ends early once the flag is raised.
                Ok(None) => return Ok(stop.is_stopped()),
                Err(err) if err.category() == ErrorCategory::Parse => {
                    RunCounters::bump(&counters.records_read);
                    RunCounters::bump(&counters.records_skipped);
                    tracing::debug!(error = %err, "undecodable record skipped");
                    continue;
                }
                Err(err) => return Err(err),
            };
            RunCounters::bump(&counters.records_read);

            let text = match record::extract_text(&raw) {
                Ok(text) => text,
                Err(err) => {
                    RunCounters::bump(&counters.records_skipped);
                    tracing::debug!(error = %err, "record skipped");
                    continue;
                }
            };

            let at = self.clock.now();
            for keyword in self.keywords.matches(&text) {
                RunCounters::bump(&counters.matches);
                let task = IndexTask {
                    keyword: keyword.clone(),
                    at,
                };
                if tasks.send(task).is_err() {
                    tracing::error!("index workers exited early; stopping ingestion");
                    return Ok(true);
                }
            }
        }
    }

    fn drain(
        &self,
        queue: &Receiver<IndexTask>,
        failures: &dyn FailureSink,
        counters: &RunCounters,
    ) {
        for task in queue {
            match self.sink.record(&task.keyword, task.at) {
                Ok(()) => RunCounters::bump(&counters.indexed),
                Err(err) => {
                    RunCounters::bump(&counters.failures);
                    tracing::warn!(keyword = %task.keyword, error = %err, "index task failed");
                    failures.report(err);
                }
            }
        }
    }
}
