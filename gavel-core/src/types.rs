//! Core domain types for gavel
//!
//! These types mirror the timeline event contract emitted by the review
//! pipeline. The console never mutates a received event; everything the UI
//! shows is derived from collections of immutable [`TimelineEvent`]s.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Run** | One pipeline execution that produced a batch of exchanges |
//! | **Exchange** | One grouped interaction: prompt + response + verdicts |
//! | **Verdict** | A reviewer decision (allow/warn/block) for an exchange |
//! | **Violation** | A categorized policy finding attached to a verdict |
//! | **Live run** | A run still receiving events over the push channel |
//!
//! Raw payloads from the wire are defensively normalized: an unknown model id
//! becomes `"unknown-model"`, a missing provider becomes `"pipeline"`, and an
//! unrecognized severity or verdict falls back to `warn`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Tag key that marks a run as still receiving events.
pub const LIVE_TAG: &str = "live";

// ============================================
// Runs
// ============================================

/// Describes a pipeline run shown in the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    /// Unique identifier for this run
    pub run_id: String,
    /// Scenario the run was executed under (if any)
    #[serde(default)]
    pub scenario_id: Option<String>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Free-form string tags (`live = "true"` marks a live run)
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl RunMeta {
    /// True when the run is flagged as still receiving events.
    pub fn is_live(&self) -> bool {
        self.tags.get(LIVE_TAG).map(|v| v == "true").unwrap_or(false)
    }
}

// ============================================
// Event origin
// ============================================

fn default_model_id() -> String {
    "unknown-model".to_string()
}

fn default_provider() -> String {
    "pipeline".to_string()
}

/// Identifies the model/provider that produced an event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOrigin {
    /// Provider's model identifier
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Producing system ("pipeline", "external-judge", "user", ...)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Optional mode hint ("rag", "baseline", "judge", ...)
    #[serde(default)]
    pub mode: Option<String>,
    /// Extensible metadata
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Default for EventOrigin {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            provider: default_provider(),
            mode: None,
            metadata: serde_json::Value::Null,
        }
    }
}

// ============================================
// Severity and verdicts
// ============================================

/// Severity of a violation, ordered for display ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Block,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Block => "block",
        }
    }

    /// Sort rank for the safety summary (block first).
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Block => 0,
            Severity::Warn => 1,
            Severity::Info => 2,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warn" => Ok(Severity::Warn),
            "block" => Ok(Severity::Block),
            // Legacy audit records used "error" for hard failures
            "error" => Ok(Severity::Block),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.to_lowercase().parse().unwrap_or(Severity::Warn))
    }
}

/// Reviewer decision for an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Warn,
    Block,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Warn => "warn",
            Verdict::Block => "block",
        }
    }

    /// True for verdicts counted as flagged violations.
    pub fn is_flagged(&self) -> bool {
        matches!(self, Verdict::Warn | Verdict::Block)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Verdict::Allow),
            "warn" => Ok(Verdict::Warn),
            "block" => Ok(Verdict::Block),
            _ => Err(format!("unknown verdict: {}", s)),
        }
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Verdict::Warn
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.to_lowercase().parse().unwrap_or_default())
    }
}

fn default_severity() -> Severity {
    Severity::Warn
}

/// Categorized policy finding attached to a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationDetail {
    /// Rule or policy category (free-form)
    pub category: String,
    /// Display severity (missing severity defaults to warn)
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Finer-grained violation type
    #[serde(default)]
    pub violation_type: Option<String>,
    /// Clause or regulation reference
    #[serde(default)]
    pub clause_reference: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================
// Event payloads
// ============================================

/// Initial user submission captured before any model response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptPayload {
    /// Who submitted the prompt
    #[serde(default)]
    pub source: EventOrigin,
    /// Prompt text as submitted
    #[serde(default)]
    pub prompt_text: String,
    /// Privacy-safe rendition, when redaction applied
    #[serde(default)]
    pub prompt_redacted: Option<String>,
    /// Category assigned by the pipeline (if any)
    #[serde(default)]
    pub question_category: Option<String>,
}

/// Generated model answer recorded for an exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Producing model/provider
    #[serde(default)]
    pub source: EventOrigin,
    /// Prompt length in characters
    #[serde(default)]
    pub prompt_chars: u64,
    /// Completion length in characters
    #[serde(default)]
    pub completion_chars: u64,
    /// End-to-end generation latency
    #[serde(default)]
    pub latency_ms: Option<i64>,
    /// Token usage breakdown reported by the provider
    #[serde(default)]
    pub token_usage: HashMap<String, i64>,
    /// Response category (facet source; "Uncategorized" when absent)
    #[serde(default)]
    pub question_category: Option<String>,
    /// Context window usage reported by the pipeline
    #[serde(default, alias = "context_length")]
    pub context_tokens: Option<i64>,
    /// Truncated prompt preview for display
    #[serde(default)]
    pub prompt_preview: Option<String>,
    /// Privacy-safe response body
    #[serde(default, alias = "pii_redacted_text")]
    pub redacted_text: Option<String>,
    /// Raw response body, disclosed only through the reveal gate
    #[serde(default, alias = "pii_raw_text")]
    pub raw_text: Option<String>,
    /// Names of fields that were redacted
    #[serde(default, alias = "pii_fields")]
    pub sensitive_fields: Vec<String>,
}

impl ResponsePayload {
    /// Return the privacy-safe body, falling back to raw when nothing was
    /// redacted.
    pub fn redacted_message(&self) -> Option<&str> {
        self.redacted_text.as_deref().or(self.raw_text.as_deref())
    }
}

/// Reviewer assessment for an exchange. Multiple reviewers may each emit one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerdictPayload {
    /// Judging model/provider
    #[serde(default)]
    pub source: EventOrigin,
    /// Decision (missing or unknown values normalize to warn)
    #[serde(default)]
    pub verdict: Verdict,
    /// Numeric compliance score, when the judge provides one
    #[serde(default)]
    pub score: Option<f64>,
    /// Privacy-safe rationale
    #[serde(default, alias = "rationale_redacted")]
    pub rationale: Option<String>,
    /// Raw rationale, disclosed only through the reveal gate
    #[serde(default)]
    pub rationale_raw: Option<String>,
    /// Violation detail backing the decision (if any)
    #[serde(default)]
    pub violation: Option<ViolationDetail>,
    /// Judge latency
    #[serde(default)]
    pub latency_ms: Option<i64>,
    /// Extensible metadata
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Aggregate metrics snapshot emitted by the pipeline for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// Run the snapshot belongs to
    #[serde(default)]
    pub run_id: String,
    /// Metric name/value map as reported
    #[serde(default)]
    pub metrics: serde_json::Value,
    /// Window covered by the snapshot
    #[serde(default)]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub window_end: Option<DateTime<Utc>>,
}

/// Kind of timeline event; the wire tag is the `event_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UserPrompt,
    LlmResponse,
    JudgeVerdict,
    MetricSnapshot,
    AuditRecord,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::UserPrompt => "user_prompt",
            EventKind::LlmResponse => "llm_response",
            EventKind::JudgeVerdict => "judge_verdict",
            EventKind::MetricSnapshot => "metric_snapshot",
            EventKind::AuditRecord => "audit_record",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_prompt" => Ok(EventKind::UserPrompt),
            "llm_response" => Ok(EventKind::LlmResponse),
            "judge_verdict" => Ok(EventKind::JudgeVerdict),
            "metric_snapshot" => Ok(EventKind::MetricSnapshot),
            "audit_record" => Ok(EventKind::AuditRecord),
            _ => Err(format!("unknown event kind: {}", s)),
        }
    }
}

/// Kind-specific payload, adjacently tagged to match the wire shape
/// (`event_type` + `payload`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    UserPrompt(PromptPayload),
    LlmResponse(ResponsePayload),
    JudgeVerdict(VerdictPayload),
    MetricSnapshot(SnapshotPayload),
    AuditRecord(serde_json::Value),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::UserPrompt(_) => EventKind::UserPrompt,
            EventPayload::LlmResponse(_) => EventKind::LlmResponse,
            EventPayload::JudgeVerdict(_) => EventKind::JudgeVerdict,
            EventPayload::MetricSnapshot(_) => EventKind::MetricSnapshot,
            EventPayload::AuditRecord(_) => EventKind::AuditRecord,
        }
    }
}

// ============================================
// Timeline events
// ============================================

/// One observation on a run's timeline (the core unit the console works on).
///
/// Events are immutable once observed; the console derives views over
/// collections of them and never rewrites a received event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Run the event belongs to
    pub run: RunMeta,
    /// Groups events belonging to one interaction
    pub exchange_id: String,
    /// Ordinal position of the interaction within the run
    #[serde(default)]
    pub turn_index: u32,
    /// Timestamp used for ordering
    pub created_at: DateTime<Utc>,
    /// Kind-specific payload
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl TimelineEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn as_response(&self) -> Option<&ResponsePayload> {
        match &self.payload {
            EventPayload::LlmResponse(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_verdict(&self) -> Option<&VerdictPayload> {
        match &self.payload {
            EventPayload::JudgeVerdict(p) => Some(p),
            _ => None,
        }
    }
}

// ============================================
// Console collaborators
// ============================================

/// Scenario choice offered by the submission form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOption {
    pub id: String,
    pub label: String,
    /// Backing model, when the backend reports it
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_available() -> bool {
    true
}

/// Judge choice offered by the submission form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeOption {
    pub id: String,
    pub label: String,
    /// Whether the judge can currently be used
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Response of `GET /console/options`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleOptions {
    #[serde(default)]
    pub scenarios: Vec<ScenarioOption>,
    #[serde(default)]
    pub judges: Vec<JudgeOption>,
}

/// Response of `POST /console`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOutcome {
    #[serde(default)]
    pub status: String,
    pub run: RunMeta,
    #[serde(default)]
    pub events: Vec<TimelineEvent>,
}

/// Request body of `POST /reveal` (audit-only call).
#[derive(Debug, Clone, Serialize)]
pub struct RevealRequest {
    pub run_id: String,
    pub exchange_id: String,
    pub field: String,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
