//! Matcher throughput benchmarks.
//!
//! Measures records per second through the matcher into an in-memory index,
//! and the cost of counting over a populated collection.
//!
//! # Benchmarks
//!
//! - `ingest_1k_records`: full pipeline, 1000 records, two keywords
//! - `ingest_1k_records_single_worker`: same stream with one worker
//! - `count_10k_occurrences`: one `count` over 10 000 stored occurrences
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench matcher_throughput
//! ```

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use keyword_tally::{
    DiscardFailures, EventTimeIndex, IndexOptions, KeywordSet, ManualClock, MatcherOptions,
    MemoryStore, StreamMatcher, Telemetry,
};

fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn stream(size: usize) -> Vec<String> {
    let texts = [
        "learning ruby this weekend",
        "python packaging is a maze",
        "ruby or python for scripting?",
        "nothing to see here",
        "RUBY RUBY RUBY",
    ];
    (0..size)
        .map(|i| format!(r#"{{"id":{i},"text":"{}"}}"#, texts[i % texts.len()]))
        .collect()
}

fn ingest(c: &mut Criterion, name: &str, workers: usize) {
    let records = stream(1000);

    c.bench_function(name, |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;
            for _ in 0..iters {
                let clock = Arc::new(ManualClock::new(epoch()));
                let index = Arc::new(EventTimeIndex::new(
                    MemoryStore::new(),
                    clock.clone(),
                    IndexOptions::default(),
                    Telemetry::silent(),
                ));
                let matcher = StreamMatcher::new(
                    index,
                    KeywordSet::new(["python", "ruby"]),
                    clock,
                    MatcherOptions::builder().max_in_flight(workers).build(),
                    Telemetry::silent(),
                );
                let mut source = records.clone().into_iter();
                let start = Instant::now();
                matcher.run(&mut source, &DiscardFailures).unwrap();
                total += start.elapsed();
            }
            total
        });
    });
}

fn bench_ingest(c: &mut Criterion) {
    ingest(c, "ingest_1k_records", 8);
}

fn bench_ingest_single_worker(c: &mut Criterion) {
    ingest(c, "ingest_1k_records_single_worker", 1);
}

fn bench_count(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(epoch()));
    let index = EventTimeIndex::new(
        MemoryStore::new(),
        clock,
        IndexOptions::default(),
        Telemetry::silent(),
    );
    for i in 0..10_000 {
        index.insert("ruby", epoch() - TimeDelta::seconds(i)).unwrap();
    }
    let since = epoch() - TimeDelta::hours(1);

    c.bench_function("count_10k_occurrences", |b| {
        b.iter(|| index.count("ruby", since).unwrap());
    });
}

criterion_group!(
    benches,
    bench_ingest,
    bench_ingest_single_worker,
    bench_count
);
criterion_main!(benches);
