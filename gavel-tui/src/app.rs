//! Application state for the TUI.
//!
//! The App is a synchronous reducer: key events and async results come in as
//! [`AppMessage`]s, state transitions happen atomically, and any I/O the
//! transition needs goes out as [`Command`]s for the main loop to execute.
//! Async results are tagged with the run generation they were issued under,
//! so a response for a deselected run is discarded instead of clobbering the
//! current state.

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::TableState;

use gavel_core::analytics::{
    filter_events, summarize_violations, window_metrics, Facets, FilterSet, ViolationGroup,
    WindowMetrics,
};
use gavel_core::client::{apply_frame, ConsoleSubmission, Subscription};
use gavel_core::config::{Config, JudgingConfig};
use gavel_core::demo;
use gavel_core::reveal::{RevealTicket, FIELD_RATIONALE_RAW, FIELD_RESPONSE_RAW};
use gavel_core::{
    group_exchanges, ChannelStatus, ConsoleOptions, EventBuffer, Exchange, PlaybackController,
    RevealGate, RunMeta, StagePacer, SubmitOutcome, TimelineEvent,
};

const MIN_SPEED: f64 = 0.25;
const MAX_SPEED: f64 = 8.0;

/// Current view mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Run list view
    #[default]
    Runs,
    /// Timeline view for the selected run
    Timeline,
    /// Safety summary view (violation groups in the window)
    Safety,
    /// Submission form
    Compose,
}

/// Async result delivered back to the reducer.
#[derive(Debug)]
pub enum AppMessage {
    RunsLoaded(gavel_core::Result<Vec<RunMeta>>),
    TimelineLoaded {
        generation: u64,
        result: gavel_core::Result<Vec<TimelineEvent>>,
    },
    OptionsLoaded(gavel_core::Result<ConsoleOptions>),
    Submitted(gavel_core::Result<SubmitOutcome>),
    RevealFinished {
        exchange_id: String,
        field: String,
        result: gavel_core::Result<()>,
    },
}

/// I/O requested by a state transition; executed by the main loop.
#[derive(Debug)]
pub enum Command {
    LoadRuns,
    LoadTimeline { run_id: String, generation: u64 },
    LoadOptions,
    OpenChannel { run_id: String },
    CloseChannel,
    Submit(ConsoleSubmission),
    LogReveal(RevealTicket),
}

/// Which compose-form field has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComposeFocus {
    #[default]
    Prompt,
    Scenario,
    Judge,
}

/// Submission form state.
#[derive(Debug, Default)]
pub struct ComposeForm {
    pub prompt: String,
    pub scenario_idx: usize,
    pub judge_idx: usize,
    pub focus: ComposeFocus,
    pub status: Option<String>,
    pub submitting: bool,
}

/// Main application state.
pub struct App {
    /// Verdict weights for the agreement metric
    judging: JudgingConfig,
    /// Current view mode
    pub view_mode: ViewMode,
    /// Known runs, most recent first
    pub runs: Vec<RunMeta>,
    /// Run table selection state
    pub run_table: TableState,
    /// Scenario/judge choices for the compose form
    pub options: ConsoleOptions,
    /// Currently selected run
    pub selected_run: Option<RunMeta>,
    /// Incremented on every run change; stale async results carry old values
    run_generation: u64,
    /// Reconciled event feeds for the selected run
    buffer: EventBuffer,
    /// Push channel status for the status line
    pub channel_status: ChannelStatus,
    /// Open push channel, if any
    subscription: Option<Subscription>,
    /// Active facet selections
    pub filters: FilterSet,
    /// Facet values derived from the full grouped sequence
    pub facets: Facets,
    /// Playback state over the filtered sequence
    pub playback: PlaybackController,
    last_advance: Instant,
    /// Stage pacing for live exchanges
    pacer: StagePacer,
    /// Disclosure ledger
    pub gate: RevealGate,
    /// Filtered event sequence (full length, not window-clamped)
    visible_events: Vec<TimelineEvent>,
    /// Exchanges grouped from the current window
    pub window_exchanges: Vec<Exchange>,
    /// KPIs over the current window
    pub metrics: WindowMetrics,
    /// Violation groups over the current window
    pub violations: Vec<ViolationGroup>,
    /// Selected exchange in the timeline view
    pub selected_exchange: usize,
    /// Network error banner, if any
    pub banner: Option<String>,
    /// Compose form state
    pub compose: ComposeForm,
    /// True while the historical fetch is in flight
    pub loading_timeline: bool,
    /// Whether the app should exit
    pub should_quit: bool,
}

impl App {
    /// Create a new App from configuration.
    pub fn new(config: &Config) -> Self {
        let playback_cfg = config.playback;
        Self {
            judging: config.judging,
            view_mode: ViewMode::default(),
            runs: Vec::new(),
            run_table: TableState::default(),
            options: ConsoleOptions::default(),
            selected_run: None,
            run_generation: 0,
            buffer: EventBuffer::new(),
            channel_status: ChannelStatus::Idle,
            subscription: None,
            filters: FilterSet::new(),
            facets: Facets::default(),
            playback: PlaybackController::new(),
            last_advance: Instant::now(),
            pacer: StagePacer::new(
                std::time::Duration::from_millis(playback_cfg.stage_base_delay_ms),
                std::time::Duration::from_millis(playback_cfg.stage_step_ms),
            ),
            gate: RevealGate::new(config.console.actor.clone(), true),
            visible_events: Vec::new(),
            window_exchanges: Vec::new(),
            metrics: WindowMetrics::default(),
            violations: Vec::new(),
            selected_exchange: 0,
            banner: None,
            compose: ComposeForm::default(),
            loading_timeline: false,
            should_quit: false,
        }
    }

    /// Initial commands issued on startup.
    pub fn startup(&self) -> Vec<Command> {
        vec![Command::LoadRuns, Command::LoadOptions]
    }

    pub fn visible_events(&self) -> &[TimelineEvent] {
        &self.visible_events
    }

    /// Events in the playback window.
    pub fn window(&self) -> &[TimelineEvent] {
        match self.playback.index() {
            Some(i) => &self.visible_events[..=i],
            None => &[],
        }
    }

    /// Exchanges to render: the whole window, or only the most recent one
    /// when show-all is off.
    pub fn rendered_exchanges(&self) -> &[Exchange] {
        if self.playback.show_all() || self.window_exchanges.len() <= 1 {
            &self.window_exchanges
        } else {
            &self.window_exchanges[self.window_exchanges.len() - 1..]
        }
    }

    pub fn stage_of(&self, exchange: &Exchange) -> gavel_core::RevealStage {
        self.pacer.stage_of(exchange)
    }

    /// Store the subscription for the channel opened by the main loop.
    pub fn set_subscription(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
        self.channel_status = ChannelStatus::Connecting;
    }

    // ------------------------------------------------------------------
    // Reducer
    // ------------------------------------------------------------------

    /// Apply one async result.
    pub fn apply(&mut self, message: AppMessage) -> Vec<Command> {
        match message {
            AppMessage::RunsLoaded(result) => {
                match result {
                    Ok(runs) => {
                        self.banner = None;
                        self.runs = runs;
                        if self.run_table.selected().is_none() && !self.runs.is_empty() {
                            self.run_table.select(Some(0));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Run list fetch failed, using demo data");
                        self.banner = Some(format!("backend unreachable: {}", e));
                        self.runs = vec![demo::demo_run()];
                        self.run_table.select(Some(0));
                    }
                }
                Vec::new()
            }
            AppMessage::TimelineLoaded { generation, result } => {
                if generation != self.run_generation {
                    return Vec::new();
                }
                self.loading_timeline = false;
                match result {
                    Ok(events) => {
                        self.buffer.set_historical(events);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Timeline fetch failed, using demo data");
                        self.banner = Some(format!("timeline unavailable: {}", e));
                        self.buffer.set_historical(demo::demo_timeline());
                    }
                }
                self.recompute();
                self.playback.load_run(self.visible_events.len());
                self.recompute_window();
                Vec::new()
            }
            AppMessage::OptionsLoaded(result) => {
                match result {
                    Ok(options) => self.options = options,
                    Err(e) => {
                        tracing::warn!(error = %e, "Console options fetch failed");
                        self.compose.status = Some(format!("options unavailable: {}", e));
                    }
                }
                Vec::new()
            }
            AppMessage::Submitted(result) => {
                self.compose.submitting = false;
                match result {
                    Ok(outcome) => {
                        self.compose.status = Some(format!("submitted ({})", outcome.status));
                        self.compose.prompt.clear();
                        self.runs.insert(0, outcome.run.clone());
                        self.run_table.select(Some(0));

                        // The historical fetch is still issued; reconciliation
                        // dedups the copies returned with the submission.
                        let commands = self.select_run(outcome.run);
                        self.buffer.extend_live(outcome.events);
                        self.recompute();
                        self.playback.load_run(self.visible_events.len());
                        self.recompute_window();
                        commands
                    }
                    Err(e) => {
                        self.compose.status = Some(format!("submission failed: {}", e));
                        Vec::new()
                    }
                }
            }
            AppMessage::RevealFinished {
                exchange_id,
                field,
                result,
            } => {
                match result {
                    Ok(()) => self.gate.complete(&exchange_id, &field),
                    Err(e) => self.gate.fail(&exchange_id, &field, e.to_string()),
                }
                Vec::new()
            }
        }
    }

    /// Handle a key event; returns commands for the main loop.
    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match self.view_mode {
            ViewMode::Runs => self.handle_runs_key(key),
            ViewMode::Timeline => self.handle_timeline_key(key),
            ViewMode::Safety => self.handle_safety_key(key),
            ViewMode::Compose => self.handle_compose_key(key),
        }
    }

    /// Advance time-based state: drain channel frames, fire stage
    /// transitions, and auto-advance playback.
    pub fn tick(&mut self) {
        let now = Instant::now();

        if let Some(subscription) = &mut self.subscription {
            let mut changed = false;
            while let Some(frame) = subscription.try_recv() {
                changed |= apply_frame(frame, &mut self.buffer, &mut self.channel_status);
            }
            if changed {
                self.recompute();
            }
        }

        self.pacer.tick(now);
        self.pacer.sync(&self.window_exchanges, now);

        if self.playback.is_playing()
            && now.duration_since(self.last_advance) >= self.playback.advance_interval()
        {
            if self.playback.tick() {
                self.recompute_window();
            }
            self.last_advance = now;
        }
    }

    // ------------------------------------------------------------------
    // Run selection
    // ------------------------------------------------------------------

    fn select_run(&mut self, run: RunMeta) -> Vec<Command> {
        // Invalidate in-flight results and outstanding timers first.
        self.run_generation = self.run_generation.wrapping_add(1);
        self.pacer.reset();
        self.gate.reset();
        self.buffer.clear();
        self.filters.clear();
        self.playback = PlaybackController::new();
        self.selected_exchange = 0;
        self.channel_status = ChannelStatus::Idle;
        self.subscription = None;
        self.loading_timeline = true;
        self.recompute();

        let mut commands = vec![
            Command::CloseChannel,
            Command::LoadTimeline {
                run_id: run.run_id.clone(),
                generation: self.run_generation,
            },
        ];
        if run.is_live() {
            commands.push(Command::OpenChannel {
                run_id: run.run_id.clone(),
            });
        }

        tracing::info!(run_id = %run.run_id, live = run.is_live(), "Run selected");
        self.selected_run = Some(run);
        self.view_mode = ViewMode::Timeline;
        commands
    }

    // ------------------------------------------------------------------
    // Per-view key handling
    // ------------------------------------------------------------------

    fn handle_runs_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Vec::new()
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_run_selection(-1);
                Vec::new()
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_run_selection(1);
                Vec::new()
            }
            KeyCode::Char('r') => vec![Command::LoadRuns],
            KeyCode::Char('c') => {
                self.compose.status = None;
                self.view_mode = ViewMode::Compose;
                Vec::new()
            }
            KeyCode::Enter => {
                let Some(idx) = self.run_table.selected() else {
                    return Vec::new();
                };
                let Some(run) = self.runs.get(idx).cloned() else {
                    return Vec::new();
                };
                self.select_run(run)
            }
            _ => Vec::new(),
        }
    }

    fn handle_timeline_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.view_mode = ViewMode::Runs;
                Vec::new()
            }
            KeyCode::Char(' ') => {
                if self.playback.is_playing() {
                    self.playback.pause();
                } else {
                    self.playback.play();
                    self.last_advance = Instant::now();
                }
                self.recompute_window();
                Vec::new()
            }
            KeyCode::Right | KeyCode::Char('n') => {
                self.playback.step_forward();
                self.recompute_window();
                Vec::new()
            }
            KeyCode::Left | KeyCode::Char('p') => {
                self.playback.step_back();
                self.recompute_window();
                Vec::new()
            }
            KeyCode::Char('0') => {
                self.playback.reset();
                self.recompute_window();
                Vec::new()
            }
            KeyCode::Char('g') => {
                self.playback.scrub(0);
                self.recompute_window();
                Vec::new()
            }
            KeyCode::Char('G') => {
                let len = self.visible_events.len();
                if len > 0 {
                    self.playback.scrub(len - 1);
                    self.recompute_window();
                }
                Vec::new()
            }
            KeyCode::Char('a') => {
                self.playback.toggle_show_all();
                self.recompute_window();
                Vec::new()
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let speed = (self.playback.speed() * 2.0).min(MAX_SPEED);
                self.playback.set_speed(speed);
                Vec::new()
            }
            KeyCode::Char('-') => {
                let speed = (self.playback.speed() / 2.0).max(MIN_SPEED);
                self.playback.set_speed(speed);
                Vec::new()
            }
            KeyCode::Char('f') => {
                self.cycle_category_filter();
                Vec::new()
            }
            KeyCode::Char('v') => {
                self.cycle_violation_filter();
                Vec::new()
            }
            KeyCode::Char('x') => {
                self.filters.clear();
                self.recompute();
                Vec::new()
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_exchange = self.selected_exchange.saturating_sub(1);
                Vec::new()
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_exchange + 1 < self.window_exchanges.len() {
                    self.selected_exchange += 1;
                }
                Vec::new()
            }
            KeyCode::Char('s') => {
                self.view_mode = ViewMode::Safety;
                Vec::new()
            }
            KeyCode::Char('R') => self.request_reveal(FIELD_RESPONSE_RAW),
            KeyCode::Char('J') => self.request_reveal(FIELD_RATIONALE_RAW),
            _ => Vec::new(),
        }
    }

    fn handle_safety_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('s') => {
                self.view_mode = ViewMode::Timeline;
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_compose_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if self.compose.submitting {
            return Vec::new();
        }
        match key.code {
            KeyCode::Esc => {
                self.view_mode = ViewMode::Runs;
                Vec::new()
            }
            KeyCode::Tab => {
                self.compose.focus = match self.compose.focus {
                    ComposeFocus::Prompt => ComposeFocus::Scenario,
                    ComposeFocus::Scenario => ComposeFocus::Judge,
                    ComposeFocus::Judge => ComposeFocus::Prompt,
                };
                Vec::new()
            }
            KeyCode::Enter => self.submit_compose(),
            KeyCode::Backspace => {
                if self.compose.focus == ComposeFocus::Prompt {
                    self.compose.prompt.pop();
                }
                Vec::new()
            }
            KeyCode::Left => {
                self.move_compose_selection(-1);
                Vec::new()
            }
            KeyCode::Right => {
                self.move_compose_selection(1);
                Vec::new()
            }
            KeyCode::Char(c) => {
                if self.compose.focus == ComposeFocus::Prompt {
                    self.compose.prompt.push(c);
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn submit_compose(&mut self) -> Vec<Command> {
        let submission = ConsoleSubmission {
            prompt: self.compose.prompt.clone(),
            scenario_id: self
                .options
                .scenarios
                .get(self.compose.scenario_idx)
                .map(|s| s.id.clone())
                .unwrap_or_default(),
            judge_id: self
                .options
                .judges
                .get(self.compose.judge_idx)
                .filter(|j| j.available)
                .map(|j| j.id.clone())
                .unwrap_or_default(),
        };

        // Local validation before any network call.
        if let Err(e) = submission.validate() {
            self.compose.status = Some(e.to_string());
            return Vec::new();
        }

        self.compose.submitting = true;
        self.compose.status = Some("submitting...".to_string());
        vec![Command::Submit(submission)]
    }

    fn move_compose_selection(&mut self, delta: i64) {
        match self.compose.focus {
            ComposeFocus::Prompt => {}
            ComposeFocus::Scenario => {
                let len = self.options.scenarios.len();
                if len > 0 {
                    self.compose.scenario_idx =
                        wrap_index(self.compose.scenario_idx, delta, len);
                }
            }
            ComposeFocus::Judge => {
                let len = self.options.judges.len();
                if len > 0 {
                    self.compose.judge_idx = wrap_index(self.compose.judge_idx, delta, len);
                }
            }
        }
    }

    fn move_run_selection(&mut self, delta: i64) {
        if self.runs.is_empty() {
            return;
        }
        let current = self.run_table.selected().unwrap_or(0);
        self.run_table
            .select(Some(wrap_index(current, delta, self.runs.len())));
    }

    // ------------------------------------------------------------------
    // Filters and reveal
    // ------------------------------------------------------------------

    /// Cycle the single-selection category filter: none -> each value -> none.
    fn cycle_category_filter(&mut self) {
        let values = self.facets.categories.clone();
        let next = next_cycle_value(&values, self.filters.selected_categories().iter().next());
        for current in self.filters.selected_categories().clone() {
            self.filters.toggle_category(&current);
        }
        if let Some(value) = next {
            self.filters.toggle_category(&value);
        }
        self.recompute();
    }

    fn cycle_violation_filter(&mut self) {
        let values = self.facets.violation_categories.clone();
        let next = next_cycle_value(&values, self.filters.selected_violations().iter().next());
        for current in self.filters.selected_violations().clone() {
            self.filters.toggle_violation(&current);
        }
        if let Some(value) = next {
            self.filters.toggle_violation(&value);
        }
        self.recompute();
    }

    fn request_reveal(&mut self, field: &str) -> Vec<Command> {
        let Some(exchange) = self.window_exchanges.get(self.selected_exchange) else {
            return Vec::new();
        };
        match self.gate.request(exchange, field, None) {
            Ok(ticket) => vec![Command::LogReveal(ticket)],
            // The rejection reason is recorded in the gate and rendered
            // inline on the exchange.
            Err(_) => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    /// Recompute everything that depends on the buffer or the filters.
    fn recompute(&mut self) {
        let all_exchanges = group_exchanges(self.buffer.events());
        self.facets = Facets::derive(&all_exchanges);
        self.visible_events = filter_events(self.buffer.events(), &self.filters);
        self.playback.sync_len(self.visible_events.len());
        self.recompute_window();
    }

    /// Recompute everything that depends on the playback index.
    fn recompute_window(&mut self) {
        let window: Vec<TimelineEvent> = self.window().to_vec();
        self.window_exchanges = group_exchanges(&window);
        self.metrics = window_metrics(&window, &self.judging);
        self.violations = summarize_violations(&window);
        if self.selected_exchange >= self.window_exchanges.len() {
            self.selected_exchange = self.window_exchanges.len().saturating_sub(1);
        }
        self.pacer.sync(&self.window_exchanges, Instant::now());
    }
}

fn wrap_index(current: usize, delta: i64, len: usize) -> usize {
    let len = len as i64;
    (((current as i64 + delta) % len + len) % len) as usize
}

/// Next value in a none -> v1 -> v2 -> ... -> none cycle.
fn next_cycle_value(values: &[String], current: Option<&String>) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    match current {
        None => Some(values[0].clone()),
        Some(c) => match values.iter().position(|v| v == c) {
            Some(i) if i + 1 < values.len() => Some(values[i + 1].clone()),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crossterm::event::KeyModifiers;
    use gavel_core::{EventPayload, PromptPayload, ResponsePayload};
    use std::collections::HashMap;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        App::new(&Config::default())
    }

    fn run(run_id: &str) -> RunMeta {
        RunMeta {
            run_id: run_id.to_string(),
            scenario_id: None,
            started_at: Utc.timestamp_opt(0, 0).unwrap(),
            tags: HashMap::new(),
        }
    }

    fn timeline(run_id: &str) -> Vec<TimelineEvent> {
        vec![
            TimelineEvent {
                run: run(run_id),
                exchange_id: "x1".to_string(),
                turn_index: 0,
                created_at: Utc.timestamp_opt(10, 0).unwrap(),
                payload: EventPayload::UserPrompt(PromptPayload::default()),
            },
            TimelineEvent {
                run: run(run_id),
                exchange_id: "x1".to_string(),
                turn_index: 0,
                created_at: Utc.timestamp_opt(12, 0).unwrap(),
                payload: EventPayload::LlmResponse(ResponsePayload {
                    question_category: Some("dosage".to_string()),
                    ..Default::default()
                }),
            },
        ]
    }

    fn select_first_run(app: &mut App) -> Vec<Command> {
        app.apply(AppMessage::RunsLoaded(Ok(vec![run("run-1")])));
        app.handle_key(key(KeyCode::Enter))
    }

    #[test]
    fn test_run_selection_issues_fetch_commands() {
        let mut app = app();
        let commands = select_first_run(&mut app);

        assert_eq!(app.view_mode, ViewMode::Timeline);
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::LoadTimeline { run_id, .. } if run_id == "run-1")));
        assert!(commands.iter().any(|c| matches!(c, Command::CloseChannel)));
        // Not a live run: no channel opened.
        assert!(!commands
            .iter()
            .any(|c| matches!(c, Command::OpenChannel { .. })));
    }

    #[test]
    fn test_live_run_opens_channel() {
        let mut app = app();
        let mut live_run = run("run-live");
        live_run
            .tags
            .insert(gavel_core::LIVE_TAG.to_string(), "true".to_string());
        app.apply(AppMessage::RunsLoaded(Ok(vec![live_run])));

        let commands = app.handle_key(key(KeyCode::Enter));
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::OpenChannel { run_id } if run_id == "run-live")));
    }

    #[test]
    fn test_timeline_load_starts_fully_revealed() {
        let mut app = app();
        select_first_run(&mut app);

        app.apply(AppMessage::TimelineLoaded {
            generation: app.run_generation,
            result: Ok(timeline("run-1")),
        });

        assert_eq!(app.playback.index(), Some(1));
        assert!(!app.playback.is_playing());
        assert_eq!(app.window_exchanges.len(), 1);
    }

    #[test]
    fn test_live_event_extends_the_window() {
        let mut app = app();
        let mut live_run = run("run-live");
        live_run
            .tags
            .insert(gavel_core::LIVE_TAG.to_string(), "true".to_string());
        app.apply(AppMessage::RunsLoaded(Ok(vec![live_run])));
        app.handle_key(key(KeyCode::Enter));

        app.apply(AppMessage::TimelineLoaded {
            generation: app.run_generation,
            result: Ok(timeline("run-live")),
        });
        assert_eq!(app.playback.index(), Some(1));
        assert_eq!(app.window_exchanges.len(), 1);

        // A pushed event for a new exchange lands in the window without a
        // manual scrub, the same path tick() takes when draining frames.
        let mut event = timeline("run-live").remove(0);
        event.exchange_id = "x2".to_string();
        event.created_at = Utc.timestamp_opt(30, 0).unwrap();
        app.buffer.push_live(event);
        app.recompute();

        assert_eq!(app.playback.index(), Some(2));
        assert_eq!(app.window_exchanges.len(), 2);
    }

    #[test]
    fn test_stale_timeline_result_discarded() {
        let mut app = app();
        select_first_run(&mut app);
        let stale = app.run_generation;

        // User switches run before the first fetch lands.
        app.apply(AppMessage::RunsLoaded(Ok(vec![run("run-1"), run("run-2")])));
        app.handle_key(key(KeyCode::Esc));
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));

        app.apply(AppMessage::TimelineLoaded {
            generation: stale,
            result: Ok(timeline("run-1")),
        });
        assert!(app.window_exchanges.is_empty());
    }

    #[test]
    fn test_backend_failure_falls_back_to_demo() {
        let mut app = app();
        app.apply(AppMessage::RunsLoaded(Err(gavel_core::Error::Network(
            "connection refused".to_string(),
        ))));

        assert!(app.banner.is_some());
        assert_eq!(app.runs.len(), 1);
        assert_eq!(app.runs[0].run_id, demo::DEMO_RUN_ID);

        let generation_cmds = app.handle_key(key(KeyCode::Enter));
        assert!(!generation_cmds.is_empty());
        app.apply(AppMessage::TimelineLoaded {
            generation: app.run_generation,
            result: Err(gavel_core::Error::Network("still down".to_string())),
        });

        // The timeline is never blank.
        assert_eq!(app.window_exchanges.len(), 3);
    }

    #[test]
    fn test_compose_validation_blocks_submission() {
        let mut app = app();
        app.apply(AppMessage::OptionsLoaded(Ok(serde_json::from_value(
            serde_json::json!({
                "scenarios": [{"id": "s1", "label": "Scenario 1"}],
                "judges": [{"id": "j1", "label": "Judge 1"}]
            }),
        )
        .unwrap())));
        app.view_mode = ViewMode::Compose;

        // Empty prompt: rejected locally, no command issued.
        let commands = app.handle_key(key(KeyCode::Enter));
        assert!(commands.is_empty());
        assert!(app.compose.status.as_deref().unwrap().contains("prompt"));

        for c in "hello".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        let commands = app.handle_key(key(KeyCode::Enter));
        assert!(matches!(commands.as_slice(), [Command::Submit(_)]));
        assert!(app.compose.submitting);
    }

    #[test]
    fn test_submission_outcome_prepends_run() {
        let mut app = app();
        app.apply(AppMessage::RunsLoaded(Ok(vec![run("run-old")])));

        let outcome: SubmitOutcome = serde_json::from_value(serde_json::json!({
            "status": "completed",
            "run": {"run_id": "run-new", "started_at": "2026-08-23T12:00:00Z"},
            "events": [
                {
                    "run": {"run_id": "run-new", "started_at": "2026-08-23T12:00:00Z"},
                    "exchange_id": "x1",
                    "created_at": "2026-08-23T12:00:01Z",
                    "event_type": "user_prompt",
                    "payload": {"prompt_text": "q"}
                }
            ]
        }))
        .unwrap();

        app.apply(AppMessage::Submitted(Ok(outcome)));
        assert_eq!(app.runs[0].run_id, "run-new");
        assert_eq!(app.view_mode, ViewMode::Timeline);
        assert_eq!(app.playback.index(), Some(0));
    }

    #[test]
    fn test_filter_cycle_reclamps_playback() {
        let mut app = app();
        select_first_run(&mut app);
        let generation = app.run_generation;
        let mut events = timeline("run-1");
        events.extend(timeline("run-1").into_iter().map(|mut e| {
            e.exchange_id = "x2".to_string();
            e.created_at = Utc.timestamp_opt(30, 0).unwrap();
            if let EventPayload::LlmResponse(r) = &mut e.payload {
                r.question_category = Some("storage".to_string());
            }
            e
        }));
        app.apply(AppMessage::TimelineLoaded {
            generation,
            result: Ok(events),
        });
        assert_eq!(app.playback.index(), Some(3));

        // First cycle selects the first category; only its events remain.
        app.handle_key(key(KeyCode::Char('f')));
        assert_eq!(app.visible_events().len(), 2);
        assert_eq!(app.playback.index(), Some(1));

        // Clearing restores the full sequence.
        app.handle_key(key(KeyCode::Char('x')));
        assert_eq!(app.visible_events().len(), 4);
    }

    #[test]
    fn test_reveal_rejected_for_non_live_run() {
        let mut app = app();
        select_first_run(&mut app);
        app.apply(AppMessage::TimelineLoaded {
            generation: app.run_generation,
            result: Ok(timeline("run-1")),
        });

        let commands = app.handle_key(key(KeyCode::Char('R')));
        assert!(commands.is_empty());
        assert!(app.gate.last_error("x1", FIELD_RESPONSE_RAW).is_some());
    }
}
