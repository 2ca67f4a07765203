//! Grouping of the flat event sequence into per-interaction exchanges.
//!
//! An [`Exchange`] is derived, never received: it accumulates the prompt, the
//! response, and every reviewer verdict sharing one `exchange_id`. Exchanges
//! are created on first sight of an id, mutated in place as later events for
//! that id arrive, and only superseded when a different run is selected.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::types::{EventPayload, PromptPayload, ResponsePayload, RunMeta, TimelineEvent, VerdictPayload};

/// Category label used when a response carries none.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Progressive-disclosure stage of an exchange in live mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RevealStage {
    /// Only the prompt is visible
    Prompt,
    /// The response has arrived
    Response,
    /// At least one verdict has arrived
    Judged,
}

impl RevealStage {
    fn next(&self) -> Option<RevealStage> {
        match self {
            RevealStage::Prompt => Some(RevealStage::Response),
            RevealStage::Response => Some(RevealStage::Judged),
            RevealStage::Judged => None,
        }
    }
}

/// One grouped interaction: prompt + response + verdicts.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Stable identifier shared by all constituent events
    pub id: String,
    /// Run metadata of the first-seen constituent
    pub run: RunMeta,
    /// Ordinal position within the run; frozen at the first-seen constituent
    pub turn_index: u32,
    /// Latest contributing event timestamp
    pub created_at: DateTime<Utc>,
    /// At most one; a later prompt event for the same id overwrites
    pub prompt: Option<PromptPayload>,
    /// At most one; a later response event for the same id overwrites
    pub response: Option<ResponsePayload>,
    /// Appended, never overwritten: independent reviewers each emit one
    pub verdicts: Vec<VerdictPayload>,
    /// True when any contributing event's run tags mark the run live
    pub live: bool,
}

impl Exchange {
    fn new(event: &TimelineEvent) -> Self {
        Self {
            id: event.exchange_id.clone(),
            run: event.run.clone(),
            turn_index: event.turn_index,
            created_at: event.created_at,
            prompt: None,
            response: None,
            verdicts: Vec::new(),
            live: event.run.is_live(),
        }
    }

    fn absorb(&mut self, event: &TimelineEvent) {
        self.created_at = self.created_at.max(event.created_at);
        self.live |= event.run.is_live();

        match &event.payload {
            EventPayload::UserPrompt(p) => self.prompt = Some(p.clone()),
            EventPayload::LlmResponse(p) => self.response = Some(p.clone()),
            EventPayload::JudgeVerdict(p) => self.verdicts.push(p.clone()),
            // Snapshots and audit records contribute only their timestamp
            EventPayload::MetricSnapshot(_) | EventPayload::AuditRecord(_) => {}
        }
    }

    /// Response category facet value ("Uncategorized" when absent). The
    /// category is a property of the classified response; a category carried
    /// by the prompt event does not contribute.
    pub fn category(&self) -> String {
        self.response
            .as_ref()
            .and_then(|r| r.question_category.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }

    /// Distinct violation categories across all verdicts.
    pub fn violation_categories(&self) -> BTreeSet<String> {
        self.verdicts
            .iter()
            .filter_map(|v| v.violation.as_ref())
            .map(|d| d.category.clone())
            .collect()
    }

    /// Stage implied by the content that has arrived so far.
    pub fn target_stage(&self) -> RevealStage {
        if !self.verdicts.is_empty() {
            RevealStage::Judged
        } else if self.response.is_some() {
            RevealStage::Response
        } else {
            RevealStage::Prompt
        }
    }
}

/// Fold a flat event sequence into exchanges, preserving first-seen id order.
pub fn group_exchanges(events: &[TimelineEvent]) -> Vec<Exchange> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, Exchange> = HashMap::new();

    for event in events {
        match by_id.get_mut(&event.exchange_id) {
            Some(exchange) => exchange.absorb(event),
            None => {
                let mut exchange = Exchange::new(event);
                exchange.absorb(event);
                order.push(event.exchange_id.clone());
                by_id.insert(event.exchange_id.clone(), exchange);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}

#[derive(Debug)]
struct PendingTransition {
    exchange_id: String,
    stage: RevealStage,
    due: Instant,
    generation: u64,
}

/// Paces the stage progression of live exchanges.
///
/// Transitions are deferred tasks, not threads: [`StagePacer::sync`]
/// schedules them and [`StagePacer::tick`] applies those that are due. Each
/// pending transition is keyed by the generation current when it was
/// scheduled, so timers belonging to a deselected run fire as no-ops.
#[derive(Debug)]
pub struct StagePacer {
    base_delay: Duration,
    step: Duration,
    generation: u64,
    visible: HashMap<String, RevealStage>,
    pending: Vec<PendingTransition>,
}

impl StagePacer {
    pub fn new(base_delay: Duration, step: Duration) -> Self {
        Self {
            base_delay,
            step,
            generation: 0,
            visible: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Forget all progress and invalidate outstanding timers. Called whenever
    /// the selected run changes.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.visible.clear();
        self.pending.clear();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reconcile the pacer with the current exchange list.
    ///
    /// Historical (non-live) exchanges surface at their target stage
    /// immediately; live exchanges climb one stage at a time, each transition
    /// due after the base delay plus a per-position offset.
    pub fn sync(&mut self, exchanges: &[Exchange], now: Instant) {
        for (position, exchange) in exchanges.iter().enumerate() {
            let target = exchange.target_stage();

            if !exchange.live {
                self.visible.insert(exchange.id.clone(), RevealStage::Judged);
                continue;
            }

            let current = *self
                .visible
                .entry(exchange.id.clone())
                .or_insert(RevealStage::Prompt);

            if current >= target {
                continue;
            }
            let Some(next) = current.next() else { continue };
            let already_pending = self
                .pending
                .iter()
                .any(|p| p.generation == self.generation && p.exchange_id == exchange.id);
            if already_pending {
                continue;
            }

            self.pending.push(PendingTransition {
                exchange_id: exchange.id.clone(),
                stage: next,
                due: now + self.base_delay + self.step * position as u32,
                generation: self.generation,
            });
        }
    }

    /// Apply due transitions. Returns true when anything changed (the caller
    /// re-renders on change).
    pub fn tick(&mut self, now: Instant) -> bool {
        let generation = self.generation;
        let mut changed = false;

        let mut remaining = Vec::with_capacity(self.pending.len());
        for transition in self.pending.drain(..) {
            if transition.generation != generation {
                continue; // stale timer from a previous run
            }
            if transition.due > now {
                remaining.push(transition);
                continue;
            }
            self.visible
                .insert(transition.exchange_id, transition.stage);
            changed = true;
        }
        self.pending = remaining;
        changed
    }

    /// Currently visible stage for an exchange (defaults to Prompt for live
    /// exchanges not yet synced).
    pub fn stage_of(&self, exchange: &Exchange) -> RevealStage {
        if !exchange.live {
            return RevealStage::Judged;
        }
        self.visible
            .get(&exchange.id)
            .copied()
            .unwrap_or(RevealStage::Prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventPayload, RunMeta, ViolationDetail};
    use chrono::TimeZone;

    fn run(live: bool) -> RunMeta {
        let mut tags = HashMap::new();
        if live {
            tags.insert(crate::types::LIVE_TAG.to_string(), "true".to_string());
        }
        RunMeta {
            run_id: "run-1".to_string(),
            scenario_id: None,
            started_at: Utc.timestamp_opt(0, 0).unwrap(),
            tags,
        }
    }

    fn event(exchange: &str, turn: u32, secs: i64, payload: EventPayload) -> TimelineEvent {
        TimelineEvent {
            run: run(false),
            exchange_id: exchange.to_string(),
            turn_index: turn,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            payload,
        }
    }

    fn prompt(exchange: &str, turn: u32, secs: i64) -> TimelineEvent {
        event(
            exchange,
            turn,
            secs,
            EventPayload::UserPrompt(PromptPayload::default()),
        )
    }

    fn response(exchange: &str, turn: u32, secs: i64, category: Option<&str>) -> TimelineEvent {
        event(
            exchange,
            turn,
            secs,
            EventPayload::LlmResponse(ResponsePayload {
                question_category: category.map(str::to_string),
                ..Default::default()
            }),
        )
    }

    fn verdict(exchange: &str, turn: u32, secs: i64, category: Option<&str>) -> TimelineEvent {
        event(
            exchange,
            turn,
            secs,
            EventPayload::JudgeVerdict(VerdictPayload {
                violation: category.map(|c| ViolationDetail {
                    category: c.to_string(),
                    severity: crate::types::Severity::Warn,
                    violation_type: None,
                    clause_reference: None,
                    description: None,
                }),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_grouping_completeness() {
        let events = vec![
            prompt("x1", 0, 10),
            response("x1", 0, 12, Some("dosage")),
            verdict("x1", 0, 13, Some("contraindication")),
            verdict("x1", 0, 14, Some("off-label")),
            prompt("x2", 1, 20),
        ];

        let exchanges = group_exchanges(&events);
        assert_eq!(exchanges.len(), 2);

        // Every event maps to exactly one exchange with a matching id.
        for e in &events {
            let matching: Vec<_> = exchanges.iter().filter(|x| x.id == e.exchange_id).collect();
            assert_eq!(matching.len(), 1);
        }

        // Verdict list length equals the verdict event count for that id.
        assert_eq!(exchanges[0].verdicts.len(), 2);
        assert_eq!(exchanges[1].verdicts.len(), 0);
    }

    #[test]
    fn test_first_seen_order_and_frozen_turn_index() {
        // x2's first event arrives before x1's, and a later x1 event carries
        // a different turn index that must not win.
        let events = vec![
            prompt("x2", 5, 10),
            prompt("x1", 2, 11),
            response("x1", 9, 12, None),
        ];

        let exchanges = group_exchanges(&events);
        assert_eq!(exchanges[0].id, "x2");
        assert_eq!(exchanges[1].id, "x1");
        assert_eq!(exchanges[1].turn_index, 2);
    }

    #[test]
    fn test_created_at_tracks_latest_constituent() {
        let events = vec![
            prompt("x1", 0, 10),
            verdict("x1", 0, 30, None),
            response("x1", 0, 20, None),
        ];
        let exchanges = group_exchanges(&events);
        assert_eq!(
            exchanges[0].created_at,
            Utc.timestamp_opt(30, 0).unwrap()
        );
    }

    #[test]
    fn test_category_defaults_to_uncategorized() {
        let exchanges = group_exchanges(&[response("x1", 0, 10, None)]);
        assert_eq!(exchanges[0].category(), UNCATEGORIZED);

        let exchanges = group_exchanges(&[response("x2", 0, 10, Some("dosage"))]);
        assert_eq!(exchanges[0].category(), "dosage");
    }

    #[test]
    fn test_category_ignores_prompt_classification() {
        let mut p = prompt("x1", 0, 10);
        if let EventPayload::UserPrompt(payload) = &mut p.payload {
            payload.question_category = Some("dosage".to_string());
        }
        let exchanges = group_exchanges(&[p, response("x1", 0, 12, None)]);
        assert_eq!(exchanges[0].category(), UNCATEGORIZED);
    }

    #[test]
    fn test_violation_categories_distinct() {
        let events = vec![
            verdict("x1", 0, 10, Some("privacy")),
            verdict("x1", 0, 11, Some("privacy")),
            verdict("x1", 0, 12, Some("dosage")),
        ];
        let exchanges = group_exchanges(&events);
        let categories = exchanges[0].violation_categories();
        assert_eq!(categories.len(), 2);
        assert!(categories.contains("privacy"));
        assert!(categories.contains("dosage"));
    }

    #[test]
    fn test_historical_exchanges_fully_revealed() {
        let pacer_now = Instant::now();
        let mut pacer = StagePacer::new(Duration::from_millis(400), Duration::from_millis(150));
        let exchanges = group_exchanges(&[prompt("x1", 0, 10)]);

        pacer.sync(&exchanges, pacer_now);
        assert_eq!(pacer.stage_of(&exchanges[0]), RevealStage::Judged);
    }

    #[test]
    fn test_live_stage_progression_is_paced() {
        let now = Instant::now();
        let mut pacer = StagePacer::new(Duration::from_millis(400), Duration::from_millis(150));

        let mut events = vec![prompt("x1", 0, 10), response("x1", 0, 12, None)];
        for e in &mut events {
            e.run = run(true);
        }
        let exchanges = group_exchanges(&events);
        assert!(exchanges[0].live);

        pacer.sync(&exchanges, now);
        // Not yet due: still at the prompt stage.
        assert_eq!(pacer.stage_of(&exchanges[0]), RevealStage::Prompt);
        assert!(!pacer.tick(now + Duration::from_millis(100)));

        // After the base delay the next stage (and only the next) appears.
        assert!(pacer.tick(now + Duration::from_millis(500)));
        assert_eq!(pacer.stage_of(&exchanges[0]), RevealStage::Response);
    }

    #[test]
    fn test_reset_invalidates_stale_timers() {
        let now = Instant::now();
        let mut pacer = StagePacer::new(Duration::from_millis(400), Duration::from_millis(150));

        let mut events = vec![prompt("x1", 0, 10), response("x1", 0, 12, None)];
        for e in &mut events {
            e.run = run(true);
        }
        let exchanges = group_exchanges(&events);
        pacer.sync(&exchanges, now);

        // Run change: outstanding transitions must never mutate state.
        pacer.reset();
        assert!(!pacer.tick(now + Duration::from_secs(10)));
        assert_eq!(pacer.stage_of(&exchanges[0]), RevealStage::Prompt);
    }
}
