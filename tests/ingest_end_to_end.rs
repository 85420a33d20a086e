//! End-to-end ingestion tests.
//! A recorded stream goes through the matcher into an in-memory event time index.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use crossbeam_channel::TryRecvError;
use keyword_tally::{
    Clock, CollectFailures, DiscardFailures, ErrorCategory, EventTimeIndex, IndexOptions,
    KeywordSet, LineSource, ManualClock, MatcherOptions, MemoryStore, RecordSource, StoreOp,
    StreamMatcher, TallyError, Telemetry, WordCountQuery,
};

type MemoryIndex = EventTimeIndex<Arc<MemoryStore>>;

fn epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn fixture() -> LineSource<BufReader<File>> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/assets/sample_stream.jsonl");
    LineSource::new(BufReader::new(File::open(path).unwrap()))
}

fn memory_index(
    clock: Arc<ManualClock>,
    telemetry: Telemetry,
) -> (Arc<MemoryIndex>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let index = Arc::new(EventTimeIndex::new(
        Arc::clone(&store),
        clock,
        IndexOptions::default(),
        telemetry,
    ));
    (index, store)
}

fn matcher(
    index: &Arc<MemoryIndex>,
    clock: Arc<ManualClock>,
    telemetry: Telemetry,
) -> StreamMatcher<Arc<MemoryIndex>> {
    StreamMatcher::new(
        Arc::clone(index),
        KeywordSet::new(["python", "ruby"]),
        clock,
        MatcherOptions::builder().max_in_flight(4).build(),
        telemetry,
    )
}

#[test]
fn fixture_stream_tallies_each_keyword_once_per_record() {
    let now = epoch(1_700_000_000);
    let clock = Arc::new(ManualClock::new(now));
    let (index, _) = memory_index(clock.clone(), Telemetry::silent());
    let failures = CollectFailures::new();

    let summary = matcher(&index, clock.clone(), Telemetry::silent())
        .run(&mut fixture(), &failures)
        .unwrap();

    assert_eq!(summary.records_read, 17);
    assert_eq!(summary.records_skipped, 3);
    assert_eq!(summary.matches, 17);
    assert_eq!(summary.indexed, 17);
    assert_eq!(summary.failures, 0);
    assert!(failures.is_empty());

    let before_all = now - TimeDelta::seconds(1);
    assert_eq!(index.count("ruby", before_all).unwrap(), 9);
    assert_eq!(index.count("python", before_all).unwrap(), 8);
    assert_eq!(index.cardinality("ruby").unwrap(), 9);
}

#[test]
fn fixture_counts_are_served_by_the_query() {
    let now = epoch(1_700_000_000);
    let clock = Arc::new(ManualClock::new(now));
    let (index, _) = memory_index(clock.clone(), Telemetry::silent());
    matcher(&index, clock.clone(), Telemetry::silent())
        .run(&mut fixture(), &DiscardFailures)
        .unwrap();

    clock.advance(TimeDelta::hours(2));
    let query = WordCountQuery::new(
        Arc::clone(&index),
        KeywordSet::new(["python", "ruby"]),
        clock.clone(),
    );

    let day = query.handle("day");
    assert_eq!(day.status, 200);
    assert_eq!(day.body, r#"{"python":8,"ruby":9}"#);

    let hour = query.handle("hour");
    assert_eq!(hour.body, r#"{"python":0,"ruby":0}"#);
}

#[test]
fn failing_inserts_surface_one_index_error_per_match() {
    let clock = Arc::new(ManualClock::new(epoch(1_700_000_000)));
    let (index, store) = memory_index(clock.clone(), Telemetry::silent());
    store.fail_writes("o no!");
    let (errors, received) = crossbeam_channel::bounded(50);
    let mut source = vec![r#"{"text": "python"}"#].into_iter();

    let summary = matcher(&index, clock, Telemetry::silent())
        .run(&mut source, &errors)
        .unwrap();

    let err = received.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(err.category(), ErrorCategory::Index);
    assert!(matches!(
        err,
        TallyError::Store {
            op: StoreOp::Insert,
            ref keyword,
            ..
        } if keyword == "python"
    ));
    assert_eq!(received.try_recv().unwrap_err(), TryRecvError::Empty);
    assert_eq!(summary.failures, 1);
    assert_eq!(source.next_record().unwrap(), None);
}

#[test]
fn ingestion_resumes_indexing_after_the_store_recovers() {
    let clock = Arc::new(ManualClock::new(epoch(1_700_000_000)));
    let (index, store) = memory_index(clock.clone(), Telemetry::silent());
    let matcher = matcher(&index, clock.clone(), Telemetry::silent());
    let failures = CollectFailures::new();

    store.fail_writes("connection refused");
    matcher.run(&mut fixture(), &failures).unwrap();
    assert_eq!(failures.take().len(), 17);

    store.heal();
    matcher.run(&mut fixture(), &failures).unwrap();
    assert!(failures.is_empty());
    assert_eq!(index.count("ruby", clock.now() - TimeDelta::days(1)).unwrap(), 9);
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn worker_threads_log_to_the_injected_subscriber() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    let telemetry = Telemetry::new(tracing::Dispatch::new(subscriber));

    let clock = Arc::new(ManualClock::new(epoch(1_700_000_000)));
    let (index, store) = memory_index(clock.clone(), telemetry.clone());
    store.fail_writes("o no!");
    matcher(&index, clock, telemetry)
        .run(&mut vec![r#"{"text": "ruby"}"#, "not json"].into_iter(), &DiscardFailures)
        .unwrap();

    let text = logs.text();
    assert!(text.contains("ingestion started"), "{text}");
    assert!(text.contains("index task failed"), "{text}");
    assert!(text.contains("o no!"), "{text}");
    assert!(text.contains("record skipped"), "{text}");
    assert!(text.contains("ingestion finished"), "{text}");
}
