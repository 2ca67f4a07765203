//! Reconciliation of the historical fetch and the live push feed.
//!
//! The two feeds are disjoint in the common case but may overlap (the
//! historical fetch can land after live events already accumulated) and may
//! deliver out of order. [`merge`] folds both into one deduplicated,
//! chronologically ordered sequence; [`EventBuffer`] owns the inputs and is
//! the single source of truth for "what happened" — downstream components
//! read the materialized output and never mutate it.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::types::{EventKind, TimelineEvent};

/// Composite identity of a logical event.
///
/// Two events with the same key are the same logical event, even when their
/// payload bytes differ between feeds. A server-issued unique event id would
/// be stronger; until one exists, a genuinely distinct live verdict sharing a
/// timestamp with a historical one is discarded (known, accepted risk).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub kind: EventKind,
    pub exchange_id: String,
    pub created_at: DateTime<Utc>,
}

impl EventKey {
    pub fn of(event: &TimelineEvent) -> Self {
        Self {
            kind: event.kind(),
            exchange_id: event.exchange_id.clone(),
            created_at: event.created_at,
        }
    }
}

/// Merge historical and live events into one deduplicated, ordered sequence.
///
/// Historical events are inserted first, so when both feeds report the same
/// logical event the historical copy wins (history is the system of record;
/// the live feed only fills in events not yet reflected there). The final
/// sort by `created_at` is stable: identical timestamps keep the insertion
/// order, which already encodes feed precedence.
///
/// Pure function of its inputs; calling it again with unchanged inputs yields
/// identical output.
pub fn merge(historical: &[TimelineEvent], live: &[TimelineEvent]) -> Vec<TimelineEvent> {
    let mut seen: HashSet<EventKey> = HashSet::with_capacity(historical.len() + live.len());
    let mut merged: Vec<TimelineEvent> = Vec::with_capacity(historical.len() + live.len());

    for event in historical.iter().chain(live.iter()) {
        if seen.insert(EventKey::of(event)) {
            merged.push(event.clone());
        }
    }

    merged.sort_by_key(|e| e.created_at);
    merged
}

/// Owns the two feeds and their materialized merge.
///
/// Every mutation recomputes the merge from scratch rather than patching the
/// previous result, so the output is idempotent regardless of the order in
/// which history and live events arrive.
#[derive(Debug, Default)]
pub struct EventBuffer {
    historical: Vec<TimelineEvent>,
    live: Vec<TimelineEvent>,
    merged: Vec<TimelineEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the historical batch (e.g. after the fetch completes).
    pub fn set_historical(&mut self, events: Vec<TimelineEvent>) {
        self.historical = events;
        self.recompute();
    }

    /// Append one live event delivered by the push channel.
    pub fn push_live(&mut self, event: TimelineEvent) {
        self.live.push(event);
        self.recompute();
    }

    /// Append a batch of live events (e.g. a console submission response).
    pub fn extend_live(&mut self, events: Vec<TimelineEvent>) {
        if events.is_empty() {
            return;
        }
        self.live.extend(events);
        self.recompute();
    }

    /// Drop everything; called when a different run is selected.
    pub fn clear(&mut self) {
        self.historical.clear();
        self.live.clear();
        self.merged.clear();
    }

    /// The reconciled sequence. Read-only for all downstream components.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.merged
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    fn recompute(&mut self) {
        self.merged = merge(&self.historical, &self.live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventPayload, PromptPayload, ResponsePayload, RunMeta};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn run() -> RunMeta {
        RunMeta {
            run_id: "run-1".to_string(),
            scenario_id: None,
            started_at: Utc.timestamp_opt(0, 0).unwrap(),
            tags: HashMap::new(),
        }
    }

    fn prompt_event(exchange: &str, secs: i64, text: &str) -> TimelineEvent {
        TimelineEvent {
            run: run(),
            exchange_id: exchange.to_string(),
            turn_index: 0,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            payload: EventPayload::UserPrompt(PromptPayload {
                source: Default::default(),
                prompt_text: text.to_string(),
                prompt_redacted: None,
                question_category: None,
            }),
        }
    }

    fn response_event(exchange: &str, secs: i64, body: &str) -> TimelineEvent {
        TimelineEvent {
            run: run(),
            exchange_id: exchange.to_string(),
            turn_index: 0,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            payload: EventPayload::LlmResponse(ResponsePayload {
                redacted_text: Some(body.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_merge_orders_by_created_at() {
        let historical = vec![response_event("x1", 30, "late"), prompt_event("x1", 10, "p")];
        let live = vec![prompt_event("x2", 20, "mid")];

        let merged = merge(&historical, &live);
        assert_eq!(merged.len(), 3);
        for pair in merged.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn test_merge_idempotent() {
        let historical = vec![prompt_event("x1", 10, "p"), response_event("x1", 12, "r")];
        let live = vec![response_event("x2", 11, "r2")];

        let first = merge(&historical, &live);
        let second = merge(&historical, &live);
        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_historical_copy_wins_on_duplicate_key() {
        // Same (kind, exchange_id, created_at), different payload content.
        let historical = vec![response_event("x1", 10, "from history")];
        let live = vec![response_event("x1", 10, "from stream")];

        let merged = merge(&historical, &live);
        assert_eq!(merged.len(), 1);
        let body = merged[0].as_response().unwrap().redacted_message().unwrap();
        assert_eq!(body, "from history");
    }

    #[test]
    fn test_equal_timestamps_keep_feed_precedence() {
        let historical = vec![prompt_event("a", 10, "h")];
        let live = vec![prompt_event("b", 10, "l")];

        let merged = merge(&historical, &live);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].exchange_id, "a");
        assert_eq!(merged[1].exchange_id, "b");
    }

    #[test]
    fn test_buffer_recomputes_regardless_of_arrival_order() {
        // Live events arrive first, then the historical fetch lands with an
        // overlapping copy. The buffer must not duplicate.
        let mut buffer = EventBuffer::new();
        buffer.push_live(prompt_event("x1", 10, "p"));
        buffer.push_live(response_event("x1", 12, "r"));
        assert_eq!(buffer.len(), 2);

        buffer.set_historical(vec![
            prompt_event("x1", 10, "p"),
            response_event("x1", 12, "r"),
            response_event("x0", 5, "earlier"),
        ]);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.events()[0].exchange_id, "x0");
    }

    #[test]
    fn test_buffer_clear_on_run_change() {
        let mut buffer = EventBuffer::new();
        buffer.set_historical(vec![prompt_event("x1", 10, "p")]);
        buffer.push_live(response_event("x1", 11, "r"));
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());

        // A fresh history after clearing does not resurrect old live events.
        buffer.set_historical(vec![prompt_event("y1", 50, "new run")]);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.events()[0].exchange_id, "y1");
    }
}
