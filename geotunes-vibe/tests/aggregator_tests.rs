//! Aggregator integration tests
//!
//! Covers:
//! - cross-variant dedup (first variant in planned order keeps the id)
//! - completion order independence
//! - per-fetch timeout, failure and panic isolation
//! - "no results" vs "total outage"

mod helpers;

use geotunes_vibe::aggregator::Aggregator;
use geotunes_vibe::planner::QueryPlanner;
use geotunes_vibe::sources::SourceFetcher;
use geotunes_vibe::types::CanonicalVibe;
use helpers::{spec, Script, ScriptedFetcher};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn fetcher(f: ScriptedFetcher) -> Arc<dyn SourceFetcher> {
    Arc::new(f)
}

#[tokio::test]
async fn test_duplicate_kept_under_first_planned_variant() {
    let source = fetcher(
        ScriptedFetcher::new()
            .on("English", Script::Ids(vec!["a", "b"]))
            .on("Hindi", Script::Ids(vec!["b", "c"])),
    );

    let outcome = Aggregator::default()
        .aggregate(&[spec("English"), spec("Hindi")], source)
        .await;

    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.result.ids(), vec!["a", "b", "c"]);

    let english: Vec<_> = outcome.result.group("English").unwrap().iter().map(|r| r.id.as_str()).collect();
    let hindi: Vec<_> = outcome.result.group("Hindi").unwrap().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(english, vec!["a", "b"]);
    assert_eq!(hindi, vec!["c"]);
}

#[tokio::test]
async fn test_planned_beach_scenario() {
    let vibe = CanonicalVibe {
        key: "beach".into(),
        display: "Beach".into(),
    };
    let specs = QueryPlanner::default()
        .plan(&vibe, &["Hindi".to_string(), "English".to_string()], 2)
        .unwrap();
    let source = fetcher(
        ScriptedFetcher::new()
            .on("Hindi", Script::Ids(vec!["a", "b"]))
            .on("English", Script::Ids(vec!["b", "c"])),
    );

    let outcome = Aggregator::default().aggregate(&specs, source).await;

    assert_eq!(outcome.result.ids(), vec!["a", "b", "c"]);
    let hindi: Vec<_> = outcome.result.group("Hindi").unwrap().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(hindi, vec!["a", "b"]);
    assert_eq!(outcome.result.groups[0].variant, "Hindi");
    assert_eq!(outcome.result.records[1].source_query, "beach Hindi music");
}

#[tokio::test]
async fn test_single_variant_preserves_source_order() {
    let source = fetcher(ScriptedFetcher::new().on("Tamil", Script::Ids(vec!["z", "m", "a", "q"])));

    let outcome = Aggregator::default().aggregate(&[spec("Tamil")], source).await;

    assert_eq!(outcome.result.ids(), vec!["z", "m", "a", "q"]);
    assert_eq!(outcome.result.group("Tamil").map(|g| g.len()), Some(4));
}

#[tokio::test]
async fn test_completion_order_does_not_change_output() {
    // English finishes last but was planned first
    let slow_first = fetcher(
        ScriptedFetcher::new()
            .on_after("English", Duration::from_millis(150), Script::Ids(vec!["a", "b"]))
            .on("Hindi", Script::Ids(vec!["b", "c"])),
    );
    let slow_second = fetcher(
        ScriptedFetcher::new()
            .on("English", Script::Ids(vec!["a", "b"]))
            .on_after("Hindi", Duration::from_millis(150), Script::Ids(vec!["b", "c"])),
    );

    let specs = [spec("English"), spec("Hindi")];
    let aggregator = Aggregator::default();
    let first = aggregator.aggregate(&specs, slow_first).await;
    let second = aggregator.aggregate(&specs, slow_second).await;

    assert_eq!(first.result, second.result);
    assert_eq!(first.result.group("English").map(|g| g.len()), Some(2));
}

#[tokio::test]
async fn test_specs_run_concurrently() {
    let source = fetcher(
        ScriptedFetcher::new()
            .on_after("English", Duration::from_millis(200), Script::Ids(vec!["a"]))
            .on_after("Hindi", Duration::from_millis(200), Script::Ids(vec!["b"]))
            .on_after("Tamil", Duration::from_millis(200), Script::Ids(vec!["c"])),
    );

    let started = Instant::now();
    let outcome = Aggregator::default()
        .aggregate(&[spec("English"), spec("Hindi"), spec("Tamil")], source)
        .await;

    assert_eq!(outcome.result.len(), 3);
    assert!(
        started.elapsed() < Duration::from_millis(550),
        "three 200ms fetches should overlap, took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_timeout_becomes_failure_and_others_survive() {
    let source = fetcher(
        ScriptedFetcher::new()
            .on("English", Script::Ids(vec!["a"]))
            .on_after("Hindi", Duration::from_secs(5), Script::Ids(vec!["late"])),
    );

    let outcome = Aggregator::new(Duration::from_millis(100))
        .aggregate(&[spec("English"), spec("Hindi")], source)
        .await;

    assert_eq!(outcome.result.ids(), vec!["a"]);
    assert_eq!(outcome.failed_variants(), vec!["Hindi"]);
    assert!(outcome.failures[0].reason.contains("timed out"));
    assert_eq!(outcome.failures[0].query, "beach Hindi music");
    assert!(!outcome.is_total_outage());
}

#[tokio::test]
async fn test_error_and_panic_isolated_per_variant() {
    let source = fetcher(
        ScriptedFetcher::new()
            .on("English", Script::Fail("401 Unauthorized"))
            .on("Hindi", Script::Panic)
            .on("Tamil", Script::Ids(vec!["t1", "t2"])),
    );

    let outcome = Aggregator::default()
        .aggregate(&[spec("English"), spec("Hindi"), spec("Tamil")], source)
        .await;

    assert_eq!(outcome.failed_variants(), vec!["English", "Hindi"]);
    assert!(outcome.failures[0].reason.contains("401"));
    assert_eq!(outcome.result.ids(), vec!["t1", "t2"]);
    assert_eq!(outcome.result.groups.len(), 1);
    assert_eq!(outcome.result.groups[0].variant, "Tamil");
}

#[tokio::test]
async fn test_all_failed_is_total_outage() {
    let source = fetcher(
        ScriptedFetcher::new()
            .on("English", Script::Fail("connection refused"))
            .on("Hindi", Script::Fail("connection refused")),
    );

    let outcome = Aggregator::default()
        .aggregate(&[spec("English"), spec("Hindi")], source)
        .await;

    assert!(outcome.result.is_empty());
    assert!(outcome.result.groups.is_empty());
    assert_eq!(outcome.attempted, 2);
    assert!(outcome.is_total_outage());
}

#[tokio::test]
async fn test_partial_failure_with_empty_answers_is_not_an_outage() {
    let source = fetcher(
        ScriptedFetcher::new()
            .on("English", Script::Fail("connection refused"))
            .on("Hindi", Script::Ids(vec![])),
    );

    let outcome = Aggregator::default()
        .aggregate(&[spec("English"), spec("Hindi")], source)
        .await;

    assert!(outcome.result.is_empty());
    assert_eq!(outcome.attempted, 2);
    assert_eq!(outcome.failed_variants(), vec!["English"]);
    assert!(!outcome.is_total_outage());
}

#[tokio::test]
async fn test_all_empty_is_not_an_outage() {
    let source = fetcher(ScriptedFetcher::new());

    let outcome = Aggregator::default()
        .aggregate(&[spec("English"), spec("Hindi")], source)
        .await;

    assert!(outcome.result.is_empty());
    assert!(outcome.failures.is_empty());
    assert!(!outcome.is_total_outage());
}

#[tokio::test]
async fn test_no_specs_no_work() {
    let scripted = Arc::new(ScriptedFetcher::new());
    let outcome = Aggregator::default().aggregate(&[], scripted.clone()).await;
    assert!(outcome.result.is_empty());
    assert_eq!(scripted.calls(), 0);
}
