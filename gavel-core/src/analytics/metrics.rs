//! Aggregate KPIs and the violation summary, computed over the visible
//! event window (filtered sequence clamped by the playback index).

use std::collections::HashMap;

use crate::config::JudgingConfig;
use crate::types::{EventPayload, Severity, TimelineEvent, Verdict};

/// KPIs over a window. `None` values render as placeholders, never as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowMetrics {
    /// Mean response latency in ms, `None` when no response recorded one
    pub mean_latency_ms: Option<f64>,
    /// Weighted judge agreement as a percentage, `None` before any verdict
    pub agreement_pct: Option<f64>,
    /// Count of warn and block verdicts
    pub violations_flagged: usize,
    /// Maximum observed context size, `None` when never reported
    pub max_context_tokens: Option<i64>,
    /// Total verdicts observed, for the agreement denominator display
    pub verdict_count: usize,
}

/// Compute KPIs for the given window.
///
/// Agreement weights come from configuration rather than being baked in; the
/// default weighting (allow 1.0, warn 0.4, block 0.0) treats a warn verdict
/// as partial agreement.
pub fn window_metrics(window: &[TimelineEvent], weights: &JudgingConfig) -> WindowMetrics {
    let mut latency_sum = 0.0;
    let mut latency_count = 0usize;
    let mut max_context: Option<i64> = None;

    let mut weighted = 0.0;
    let mut verdict_count = 0usize;
    let mut flagged = 0usize;

    for event in window {
        match &event.payload {
            EventPayload::LlmResponse(r) => {
                if let Some(ms) = r.latency_ms {
                    latency_sum += ms as f64;
                    latency_count += 1;
                }
                if let Some(tokens) = r.context_tokens {
                    max_context = Some(max_context.map_or(tokens, |m| m.max(tokens)));
                }
            }
            EventPayload::JudgeVerdict(v) => {
                verdict_count += 1;
                weighted += match v.verdict {
                    Verdict::Allow => weights.allow_weight,
                    Verdict::Warn => weights.warn_weight,
                    Verdict::Block => weights.block_weight,
                };
                if matches!(v.verdict, Verdict::Warn | Verdict::Block) {
                    flagged += 1;
                }
            }
            _ => {}
        }
    }

    WindowMetrics {
        mean_latency_ms: (latency_count > 0).then(|| latency_sum / latency_count as f64),
        agreement_pct: (verdict_count > 0).then(|| weighted / verdict_count as f64 * 100.0),
        violations_flagged: flagged,
        max_context_tokens: max_context,
        verdict_count,
    }
}

/// One row of the safety summary view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationGroup {
    pub category: String,
    pub severity: Severity,
    pub violation_type: Option<String>,
    pub clause_reference: Option<String>,
    pub description: Option<String>,
    pub count: usize,
}

/// Group verdict violations in the window, counting occurrences.
///
/// Sorted by severity rank (block first) then alphabetically by category so
/// the most serious findings lead the summary.
pub fn summarize_violations(window: &[TimelineEvent]) -> Vec<ViolationGroup> {
    type Key = (
        String,
        Severity,
        Option<String>,
        Option<String>,
        Option<String>,
    );
    let mut counts: HashMap<Key, usize> = HashMap::new();

    for event in window {
        let EventPayload::JudgeVerdict(v) = &event.payload else {
            continue;
        };
        let Some(detail) = &v.violation else { continue };
        let key = (
            detail.category.clone(),
            detail.severity,
            detail.violation_type.clone(),
            detail.clause_reference.clone(),
            detail.description.clone(),
        );
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut groups: Vec<ViolationGroup> = counts
        .into_iter()
        .map(
            |((category, severity, violation_type, clause_reference, description), count)| {
                ViolationGroup {
                    category,
                    severity,
                    violation_type,
                    clause_reference,
                    description,
                    count,
                }
            },
        )
        .collect();

    groups.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then_with(|| a.category.cmp(&b.category))
    });
    groups
}
