//! End-to-end tests over the derivation pipeline: reconcile, group, filter,
//! play back, and measure, without a backend in the loop.

use chrono::{TimeZone, Utc};
use std::collections::HashMap;

use gavel_core::analytics::{filter_events, window_metrics, Facets, FilterSet};
use gavel_core::config::JudgingConfig;
use gavel_core::demo;
use gavel_core::{
    group_exchanges, EventBuffer, EventPayload, PlaybackController, PromptPayload, ResponsePayload,
    RunMeta, Severity, SubmitOutcome, TimelineEvent, Verdict, VerdictPayload, ViolationDetail,
};

fn run_meta(run_id: &str) -> RunMeta {
    RunMeta {
        run_id: run_id.to_string(),
        scenario_id: Some("s1".to_string()),
        started_at: Utc.timestamp_opt(0, 0).unwrap(),
        tags: HashMap::new(),
    }
}

fn event(run: &str, exchange: &str, turn: u32, secs: i64, payload: EventPayload) -> TimelineEvent {
    TimelineEvent {
        run: run_meta(run),
        exchange_id: exchange.to_string(),
        turn_index: turn,
        created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        payload,
    }
}

fn prompt(run: &str, exchange: &str, turn: u32, secs: i64) -> TimelineEvent {
    event(
        run,
        exchange,
        turn,
        secs,
        EventPayload::UserPrompt(PromptPayload {
            prompt_text: "question".to_string(),
            ..Default::default()
        }),
    )
}

fn response(run: &str, exchange: &str, turn: u32, secs: i64, category: &str) -> TimelineEvent {
    event(
        run,
        exchange,
        turn,
        secs,
        EventPayload::LlmResponse(ResponsePayload {
            question_category: Some(category.to_string()),
            latency_ms: Some(1000),
            context_tokens: Some(2048),
            ..Default::default()
        }),
    )
}

fn verdict(
    run: &str,
    exchange: &str,
    turn: u32,
    secs: i64,
    decision: Verdict,
    violation: Option<&str>,
) -> TimelineEvent {
    event(
        run,
        exchange,
        turn,
        secs,
        EventPayload::JudgeVerdict(VerdictPayload {
            verdict: decision,
            violation: violation.map(|category| ViolationDetail {
                category: category.to_string(),
                severity: Severity::Warn,
                violation_type: None,
                clause_reference: None,
                description: None,
            }),
            ..Default::default()
        }),
    )
}

/// Historical fetch and live push overlap; the pipeline still yields one
/// exchange list, one facet set, and metrics over the chosen window.
#[test]
fn test_pipeline_from_feeds_to_metrics() {
    let historical = vec![
        prompt("run-1", "x1", 0, 10),
        response("run-1", "x1", 0, 12, "dosage"),
        verdict("run-1", "x1", 0, 14, Verdict::Allow, None),
        prompt("run-1", "x2", 1, 20),
        response("run-1", "x2", 1, 23, "storage"),
    ];
    let live = vec![
        // Duplicate of a historical event, arriving again over the channel.
        verdict("run-1", "x1", 0, 14, Verdict::Allow, None),
        verdict("run-1", "x2", 1, 25, Verdict::Warn, Some("labeling")),
        verdict("run-1", "x2", 1, 26, Verdict::Block, Some("labeling")),
        verdict("run-1", "x2", 1, 27, Verdict::Allow, None),
    ];

    let mut buffer = EventBuffer::new();
    buffer.extend_live(live);
    buffer.set_historical(historical);

    // 5 historical + 3 distinct live events.
    assert_eq!(buffer.len(), 8);

    let exchanges = group_exchanges(buffer.events());
    assert_eq!(exchanges.len(), 2);
    assert_eq!(exchanges[1].verdicts.len(), 3);

    let facets = Facets::derive(&exchanges);
    assert_eq!(facets.categories, vec!["dosage", "storage"]);
    assert_eq!(facets.violation_categories, vec!["labeling"]);

    // Full window: {allow, allow, warn, block} -> 60%, 2 flagged.
    let mut playback = PlaybackController::new();
    playback.load_run(buffer.len());
    let window = &buffer.events()[..=playback.index().unwrap()];
    let metrics = window_metrics(window, &JudgingConfig::default());
    assert!((metrics.agreement_pct.unwrap() - 60.0).abs() < 1e-9);
    assert_eq!(metrics.violations_flagged, 2);
    assert_eq!(metrics.mean_latency_ms, Some(1000.0));
    assert_eq!(metrics.max_context_tokens, Some(2048));

    // Scrubbed back before any verdict, agreement is pending again.
    playback.scrub(1);
    let window = &buffer.events()[..=playback.index().unwrap()];
    let metrics = window_metrics(window, &JudgingConfig::default());
    assert_eq!(metrics.agreement_pct, None);
    assert_eq!(metrics.violations_flagged, 0);
}

/// Filters restrict the event sequence and playback re-clamps against the
/// shrunken length.
#[test]
fn test_filters_shrink_sequence_and_playback_clamps() {
    let events = vec![
        prompt("run-1", "x1", 0, 10),
        response("run-1", "x1", 0, 12, "dosage"),
        prompt("run-1", "x2", 1, 20),
        response("run-1", "x2", 1, 22, "storage"),
        verdict("run-1", "x2", 1, 24, Verdict::Warn, Some("labeling")),
    ];

    let mut buffer = EventBuffer::new();
    buffer.set_historical(events);

    let mut playback = PlaybackController::new();
    playback.load_run(buffer.len());
    assert_eq!(playback.index(), Some(4));

    let mut filters = FilterSet::new();
    filters.toggle_category("dosage");
    let visible = filter_events(buffer.events(), &filters);

    // Only x1's two events survive; the prompt rides along with its exchange.
    assert_eq!(visible.len(), 2);
    playback.sync_len(visible.len());
    assert_eq!(playback.index(), Some(1));

    // A filter excluding everything forces idle.
    filters.toggle_violation("labeling");
    let visible = filter_events(buffer.events(), &filters);
    assert!(visible.is_empty());
    playback.sync_len(0);
    assert_eq!(playback.index(), None);
    assert!(!playback.is_playing());
}

/// Console submission: the returned run is prepended to the run list, its
/// events land in the live feed, and playback lands on the last index.
#[test]
fn test_submission_outcome_flows_into_state() {
    let outcome: SubmitOutcome = serde_json::from_value(serde_json::json!({
        "status": "completed",
        "run": {
            "run_id": "run-new",
            "scenario_id": "s1",
            "started_at": "2026-08-23T12:00:00Z",
            "tags": {"live": "true"}
        },
        "events": [
            {
                "run": {"run_id": "run-new", "started_at": "2026-08-23T12:00:00Z"},
                "exchange_id": "x1",
                "turn_index": 0,
                "created_at": "2026-08-23T12:00:01Z",
                "event_type": "user_prompt",
                "payload": {"prompt_text": "q"}
            },
            {
                "run": {"run_id": "run-new", "started_at": "2026-08-23T12:00:00Z"},
                "exchange_id": "x1",
                "turn_index": 0,
                "created_at": "2026-08-23T12:00:04Z",
                "event_type": "llm_response",
                "payload": {"pii_redacted_text": "a"}
            }
        ]
    }))
    .unwrap();

    let mut runs = vec![run_meta("run-old")];
    runs.insert(0, outcome.run.clone());
    assert_eq!(runs[0].run_id, "run-new");
    assert!(runs[0].is_live());

    let mut buffer = EventBuffer::new();
    buffer.extend_live(outcome.events);
    assert_eq!(buffer.len(), 2);

    let mut playback = PlaybackController::new();
    playback.load_run(buffer.len());
    assert_eq!(playback.index(), Some(1));
}

/// The demo fallback flows through the same pipeline as server data.
#[test]
fn test_demo_dataset_through_pipeline() {
    let mut buffer = EventBuffer::new();
    buffer.set_historical(demo::demo_timeline());

    let exchanges = group_exchanges(buffer.events());
    assert_eq!(exchanges.len(), 3);
    assert!(exchanges.iter().all(|x| !x.live));

    let metrics = window_metrics(buffer.events(), &JudgingConfig::default());
    assert_eq!(metrics.verdict_count, 3);
    assert_eq!(metrics.violations_flagged, 2);

    let facets = Facets::derive(&exchanges);
    assert!(facets
        .violation_categories
        .contains(&"controlled-substance".to_string()));
}
