//! Background expiry of occurrences older than the retention window.

use std::sync::Arc;
use std::thread;

use chrono::TimeDelta;
use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::clock::Clock;
use crate::error::{Result, TallyError};
use crate::index::EventTimeIndex;
use crate::keywords::KeywordSet;
use crate::store::OrderedSetStore;
use crate::telemetry::Telemetry;
use crate::types::{RetentionPolicy, SweepReport};

struct Sweep<S> {
    index: Arc<EventTimeIndex<S>>,
    keywords: KeywordSet,
    clock: Arc<dyn Clock>,
    window: TimeDelta,
    telemetry: Telemetry,
}

impl<S: OrderedSetStore> Sweep<S> {
    fn pass(&self) -> SweepReport {
        self.telemetry.in_scope(|| {
            let cutoff = self.clock.now() - self.window;
            let mut report = SweepReport::default();
            for keyword in &self.keywords {
                match self.index.cleanup(keyword.as_str(), cutoff) {
                    Ok(removed) => report.removed.push((keyword.to_string(), removed)),
                    Err(err) => {
                        report.failures += 1;
                        tracing::warn!(
                            keyword = %keyword,
                            error = %err,
                            "retention cleanup failed"
                        );
                    }
                }
            }
            tracing::info!(
                retention.cutoff = %cutoff,
                retention.removed = report.total_removed(),
                retention.failures = report.failures,
                "retention pass finished"
            );
            report
        })
    }
}

/// Periodically removes occurrences at or before `now - window` for every
/// keyword. A failed cleanup is logged and retried on the next pass.
pub struct RetentionSweeper<S> {
    sweep: Arc<Sweep<S>>,
    policy: RetentionPolicy,
    shutdown: Option<Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl<S: OrderedSetStore + 'static> RetentionSweeper<S> {
    /// Start the sweeper thread. The first pass runs one `sweep_interval`
    /// after spawning.
    pub fn spawn(
        index: Arc<EventTimeIndex<S>>,
        keywords: KeywordSet,
        clock: Arc<dyn Clock>,
        policy: RetentionPolicy,
        telemetry: Telemetry,
    ) -> Result<Self> {
        let window = TimeDelta::from_std(policy.window).map_err(|err| TallyError::Config {
            reason: format!("retention window {:?} out of range: {err}", policy.window),
        })?;
        let sweep = Arc::new(Sweep {
            index,
            keywords,
            clock,
            window,
            telemetry,
        });

        let (shutdown, signal) = crossbeam_channel::bounded::<()>(0);
        let worker = Arc::clone(&sweep);
        let interval = policy.sweep_interval;
        let join = thread::Builder::new()
            .name("tally-retention".into())
            .spawn(move || {
                worker.telemetry.in_scope(|| {
                    tracing::info!(
                        retention.window_secs = policy.window.as_secs(),
                        retention.interval_secs = interval.as_secs(),
                        "retention sweeper started"
                    );
                });
                loop {
                    match signal.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            worker.pass();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                worker
                    .telemetry
                    .in_scope(|| tracing::info!("retention sweeper stopped"));
            })?;

        Ok(Self {
            sweep,
            policy,
            shutdown: Some(shutdown),
            join: Some(join),
        })
    }

    /// Run one pass on the calling thread.
    pub fn sweep_once(&self) -> SweepReport {
        self.sweep.pass()
    }

    #[must_use]
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Signal the thread and wait for it. A pass in progress finishes first.
    pub fn stop(mut self) {
        self.shutdown();
    }
}

impl<S> RetentionSweeper<S> {
    fn shutdown(&mut self) {
        // Dropping the only sender disconnects the channel and wakes the thread.
        drop(self.shutdown.take());
        if let Some(handle) = self.join.take() {
            if handle.join().is_err() {
                self.sweep
                    .telemetry
                    .in_scope(|| tracing::error!("retention sweeper panicked"));
            }
        }
    }
}

impl<S> Drop for RetentionSweeper<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
