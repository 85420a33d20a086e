//! Integration tests for the word count query over a live index.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta};
use keyword_tally::{
    EventTimeIndex, IndexOptions, KeywordSet, ManualClock, MemoryStore, Period, Telemetry,
    WordCountQuery,
};

fn setup() -> (
    Arc<EventTimeIndex<MemoryStore>>,
    WordCountQuery<Arc<EventTimeIndex<MemoryStore>>>,
) {
    let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let clock = Arc::new(ManualClock::new(now));
    let index = Arc::new(EventTimeIndex::new(
        MemoryStore::new(),
        clock.clone(),
        IndexOptions::default(),
        Telemetry::silent(),
    ));
    for ago in [
        TimeDelta::minutes(30),
        TimeDelta::hours(2),
        TimeDelta::days(3),
        TimeDelta::days(10),
    ] {
        index.insert("bacon", now - ago).unwrap();
    }
    index.insert("eggs", now - TimeDelta::minutes(1)).unwrap();

    let query = WordCountQuery::new(
        Arc::clone(&index),
        KeywordSet::new(["bacon", "eggs", "toast"]),
        clock,
    );
    (index, query)
}

#[test]
fn each_period_widens_the_window() {
    let (_, query) = setup();

    let hour = query.word_counts(Period::Hour).unwrap();
    assert_eq!((hour["bacon"], hour["eggs"], hour["toast"]), (1, 1, 0));

    let day = query.word_counts(Period::Day).unwrap();
    assert_eq!(day["bacon"], 2);

    let week = query.word_counts(Period::Week).unwrap();
    assert_eq!(week["bacon"], 3);
}

#[test]
fn unknown_period_uses_the_daily_window() {
    let (_, query) = setup();
    assert_eq!(query.handle("fortnight"), query.handle("day"));
    assert_eq!(
        query.route("/wordcount/day").body,
        r#"{"bacon":2,"eggs":1,"toast":0}"#
    );
}

#[test]
fn store_failure_is_reported_as_500() {
    let (index, query) = setup();
    index.close().unwrap();

    let reply = query.handle("day");

    assert_eq!(reply.status, 500);
    assert_eq!(reply.content_type, "text/plain");
    assert!(reply.body.contains("store is closed"), "{}", reply.body);
}
