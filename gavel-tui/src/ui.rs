//! UI rendering for the TUI.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};

use gavel_core::format::{
    format_agreement, format_context_tokens, format_latency, format_relative_time,
    truncate_preview,
};
use gavel_core::reveal::{FIELD_RATIONALE_RAW, FIELD_RESPONSE_RAW};
use gavel_core::{ChannelStatus, Exchange, RevealStage, Severity, Verdict};

use crate::app::{App, ComposeFocus, ViewMode};

/// Label color for metadata attributes
const LABEL_COLOR: Color = Color::Rgb(100, 180, 180);
/// Separator/dim text color
const DIM_COLOR: Color = Color::Rgb(128, 128, 128);
/// Border color for the exchange list
const BORDER_LIST: Color = Color::Rgb(0, 150, 150);
/// Border color for the detail panel
const BORDER_DETAIL: Color = Color::Rgb(80, 160, 80);
/// Border color for the safety summary
const BORDER_SAFETY: Color = Color::Rgb(180, 100, 100);

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    match app.view_mode {
        ViewMode::Runs => render_runs_view(frame, app),
        ViewMode::Timeline => render_timeline_view(frame, app),
        ViewMode::Safety => render_safety_view(frame, app),
        ViewMode::Compose => render_compose_view(frame, app),
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => Color::Gray,
        Severity::Warn => Color::Yellow,
        Severity::Block => Color::Red,
    }
}

fn verdict_span(verdict: Verdict) -> Span<'static> {
    match verdict {
        Verdict::Allow => Span::styled("ALLOW", Style::default().fg(Color::Green).bold()),
        Verdict::Warn => Span::styled("WARN", Style::default().fg(Color::Yellow).bold()),
        Verdict::Block => Span::styled("BLOCK", Style::default().fg(Color::Red).bold()),
    }
}

fn channel_span(status: ChannelStatus) -> Span<'static> {
    let color = match status {
        ChannelStatus::Idle => Color::DarkGray,
        ChannelStatus::Connecting => Color::Yellow,
        ChannelStatus::Connected => Color::Green,
        ChannelStatus::Error => Color::Red,
    };
    Span::styled(status.as_str(), Style::default().fg(color))
}

/// Render the header with title, channel status, and any error banner.
fn render_header(frame: &mut Frame, app: &App, title: &str, area: Rect) {
    let mut spans = vec![
        Span::styled(" gavel ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(title.to_string(), Style::default().fg(Color::White)),
        Span::raw("   channel: "),
        channel_span(app.channel_status),
    ];
    if let Some(banner) = &app.banner {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(
            banner.clone(),
            Style::default().fg(Color::Red).bold(),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, area);
}

fn render_footer(frame: &mut Frame, text: &str, area: Rect) {
    let footer = Paragraph::new(text).style(Style::default().fg(DIM_COLOR));
    frame.render_widget(footer, area);
}

// ==========================================================================
// Runs view
// ==========================================================================

fn render_runs_view(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Min(5),    // Run table
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, app, "runs", chunks[0]);

    let rows: Vec<Row> = app
        .runs
        .iter()
        .map(|run| {
            let live = if run.is_live() {
                Cell::from(Span::styled("LIVE", Style::default().fg(Color::Green).bold()))
            } else {
                Cell::from(Span::styled("closed", Style::default().fg(DIM_COLOR)))
            };
            Row::new(vec![
                Cell::from(run.run_id.clone()),
                Cell::from(run.scenario_id.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(format_relative_time(run.started_at)),
                live,
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(40),
            Constraint::Percentage(25),
            Constraint::Percentage(20),
            Constraint::Percentage(15),
        ],
    )
    .header(
        Row::new(vec!["Run", "Scenario", "Started", "Status"])
            .style(Style::default().fg(LABEL_COLOR).bold()),
    )
    .row_highlight_style(Style::default().bg(Color::Rgb(40, 40, 60)))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BORDER_LIST))
            .title(" Runs "),
    );

    frame.render_stateful_widget(table, chunks[1], &mut app.run_table);
    render_footer(
        frame,
        " ↑/↓ select   Enter open   c compose   r refresh   q quit",
        chunks[2],
    );
}

// ==========================================================================
// Timeline view
// ==========================================================================

fn render_timeline_view(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Length(3), // Metrics bar
        Constraint::Min(5),    // Exchanges
        Constraint::Length(1), // Footer
    ])
    .split(area);

    let title = match &app.selected_run {
        Some(run) => format!("run {}", run.run_id),
        None => "timeline".to_string(),
    };
    render_header(frame, app, &title, chunks[0]);
    render_metrics_bar(frame, app, chunks[1]);

    let body = Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[2]);
    render_exchange_list(frame, app, body[0]);
    render_exchange_detail(frame, app, body[1]);

    render_footer(
        frame,
        " Space play   ←/→ step   g/G scrub   a show-all   f/v/x filters   s safety   R/J reveal   Esc back",
        chunks[3],
    );
}

/// KPI strip: playback position plus the window metrics.
fn render_metrics_bar(frame: &mut Frame, app: &App, area: Rect) {
    let position = match app.playback.index() {
        Some(i) => format!("{}/{}", i + 1, app.visible_events().len()),
        None => format!("-/{}", app.visible_events().len()),
    };
    let state = if app.loading_timeline {
        "loading"
    } else if app.playback.is_playing() {
        "playing"
    } else {
        "paused"
    };

    let mut spans = vec![
        Span::styled("position ", Style::default().fg(LABEL_COLOR)),
        Span::raw(position),
        Span::styled(format!(" {} x{:.2}", state, app.playback.speed()), Style::default().fg(DIM_COLOR)),
        Span::styled("   latency ", Style::default().fg(LABEL_COLOR)),
        Span::raw(format_latency(app.metrics.mean_latency_ms)),
        Span::styled("   agreement ", Style::default().fg(LABEL_COLOR)),
        Span::raw(format_agreement(app.metrics.agreement_pct)),
        Span::styled("   flagged ", Style::default().fg(LABEL_COLOR)),
        Span::raw(app.metrics.violations_flagged.to_string()),
        Span::styled("   context ", Style::default().fg(LABEL_COLOR)),
        Span::raw(format_context_tokens(app.metrics.max_context_tokens)),
    ];

    let filters = &app.filters;
    if !filters.is_empty() {
        let mut active: Vec<String> = filters.selected_categories().iter().cloned().collect();
        active.extend(filters.selected_violations().iter().map(|v| format!("!{}", v)));
        spans.push(Span::styled(
            format!("   filters: {}", active.join(", ")),
            Style::default().fg(Color::Magenta),
        ));
    }

    let bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(DIM_COLOR)),
    );
    frame.render_widget(bar, area);
}

fn render_exchange_list(frame: &mut Frame, app: &App, area: Rect) {
    let rendered = app.rendered_exchanges();
    let offset = app.window_exchanges.len() - rendered.len();

    let mut lines: Vec<Line> = Vec::new();
    for (i, exchange) in rendered.iter().enumerate() {
        let selected = offset + i == app.selected_exchange;
        let marker = if selected { "▶ " } else { "  " };

        let worst = exchange
            .verdicts
            .iter()
            .filter_map(|v| v.violation.as_ref().map(|d| d.severity))
            .max();
        let badge = match worst {
            Some(severity) => Span::styled(
                format!("[{}]", severity),
                Style::default().fg(severity_color(severity)),
            ),
            None => Span::styled("[ok]", Style::default().fg(Color::Green)),
        };

        let style = if selected {
            Style::default().fg(Color::White).bold()
        } else {
            Style::default().fg(Color::Gray)
        };

        lines.push(Line::from(vec![
            Span::styled(marker, style),
            Span::styled(format!("#{} ", exchange.turn_index), Style::default().fg(DIM_COLOR)),
            Span::styled(exchange.category(), style),
            Span::raw(" "),
            badge,
            Span::styled(
                format!("  {}", format_relative_time(exchange.created_at)),
                Style::default().fg(DIM_COLOR),
            ),
        ]));
    }

    if lines.is_empty() {
        let text = if app.loading_timeline {
            "Loading timeline..."
        } else {
            "No events in the current window"
        };
        lines.push(Line::from(Span::styled(text, Style::default().fg(DIM_COLOR))));
    }

    let title = if app.playback.show_all() {
        format!(" Exchanges ({}) ", app.window_exchanges.len())
    } else {
        format!(" Latest of {} ", app.window_exchanges.len())
    };
    let list = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BORDER_LIST))
            .title(title),
    );
    frame.render_widget(list, area);
}

fn render_exchange_detail(frame: &mut Frame, app: &App, area: Rect) {
    let Some(exchange) = app.window_exchanges.get(app.selected_exchange) else {
        let placeholder = Paragraph::new("Select an exchange")
            .style(Style::default().fg(DIM_COLOR))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(placeholder, area);
        return;
    };

    let stage = app.stage_of(exchange);
    let mut lines: Vec<Line> = Vec::new();

    if let Some(prompt) = &exchange.prompt {
        lines.push(Line::from(Span::styled(
            "Prompt",
            Style::default().fg(LABEL_COLOR).bold(),
        )));
        let text = prompt.prompt_redacted.as_deref().unwrap_or(&prompt.prompt_text);
        lines.push(Line::from(text.to_string()));
        lines.push(Line::raw(""));
    }

    if stage >= RevealStage::Response {
        if let Some(response) = &exchange.response {
            lines.push(Line::from(vec![
                Span::styled("Response ", Style::default().fg(LABEL_COLOR).bold()),
                Span::styled(
                    format!("({} / {})", response.source.model_id, response.source.provider),
                    Style::default().fg(DIM_COLOR),
                ),
            ]));
            lines.extend(response_body_lines(app, exchange));
            lines.push(Line::raw(""));
        }
    } else if exchange.response.is_some() {
        lines.push(Line::from(Span::styled(
            "Response pending...",
            Style::default().fg(DIM_COLOR),
        )));
        lines.push(Line::raw(""));
    }

    if stage >= RevealStage::Judged && !exchange.verdicts.is_empty() {
        lines.push(Line::from(Span::styled(
            "Verdicts",
            Style::default().fg(LABEL_COLOR).bold(),
        )));
        for verdict in &exchange.verdicts {
            let mut spans = vec![
                Span::raw("  "),
                verdict_span(verdict.verdict),
                Span::styled(
                    format!(" {} ", verdict.source.model_id),
                    Style::default().fg(DIM_COLOR),
                ),
            ];
            if let Some(score) = verdict.score {
                spans.push(Span::styled(
                    format!("score {:.2} ", score),
                    Style::default().fg(DIM_COLOR),
                ));
            }
            lines.push(Line::from(spans));

            let rationale = rationale_text(app, exchange, verdict);
            if let Some(text) = rationale {
                lines.push(Line::from(Span::styled(
                    format!("    {}", truncate_preview(&text, 120)),
                    Style::default().fg(Color::Gray),
                )));
            }
            if let Some(detail) = &verdict.violation {
                let mut finding = format!("    ⚠ {} ({})", detail.category, detail.severity);
                if let Some(clause) = &detail.clause_reference {
                    finding.push_str(&format!(" [{}]", clause));
                }
                lines.push(Line::from(Span::styled(
                    finding,
                    Style::default().fg(severity_color(detail.severity)),
                )));
            }
        }
    }

    if let Some(error) = app
        .gate
        .last_error(&exchange.id, FIELD_RESPONSE_RAW)
        .or_else(|| app.gate.last_error(&exchange.id, FIELD_RATIONALE_RAW))
    {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            format!("reveal: {}", error),
            Style::default().fg(Color::Red),
        )));
    }

    let detail = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(BORDER_DETAIL))
                .title(format!(" Exchange {} ", exchange.id)),
        );
    frame.render_widget(detail, area);
}

/// Response body respecting the reveal gate: raw only after an audited
/// disclosure.
fn response_body_lines<'a>(app: &App, exchange: &'a Exchange) -> Vec<Line<'a>> {
    let Some(response) = &exchange.response else {
        return Vec::new();
    };

    if app.gate.is_pending(&exchange.id, FIELD_RESPONSE_RAW) {
        return vec![Line::from(Span::styled(
            "(revealing...)",
            Style::default().fg(Color::Yellow),
        ))];
    }

    if app.gate.is_disclosed(&exchange.id, FIELD_RESPONSE_RAW) {
        if let Some(raw) = &response.raw_text {
            return vec![
                Line::from(Span::styled(
                    "UNREDACTED",
                    Style::default().fg(Color::Red).bold(),
                )),
                Line::from(raw.as_str()),
            ];
        }
    }

    let mut lines = vec![Line::from(
        response.redacted_message().unwrap_or("(no body)").to_string(),
    )];
    if !response.sensitive_fields.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("redacted fields: {}", response.sensitive_fields.join(", ")),
            Style::default().fg(DIM_COLOR),
        )));
    }
    lines
}

fn rationale_text(
    app: &App,
    exchange: &Exchange,
    verdict: &gavel_core::VerdictPayload,
) -> Option<String> {
    if app.gate.is_disclosed(&exchange.id, FIELD_RATIONALE_RAW) {
        if let Some(raw) = &verdict.rationale_raw {
            return Some(raw.clone());
        }
    }
    verdict.rationale.clone()
}

// ==========================================================================
// Safety view
// ==========================================================================

fn render_safety_view(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Min(5),    // Summary table
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, app, "safety summary", chunks[0]);

    let rows: Vec<Row> = app
        .violations
        .iter()
        .map(|group| {
            Row::new(vec![
                Cell::from(Span::styled(
                    group.severity.to_string(),
                    Style::default().fg(severity_color(group.severity)).bold(),
                )),
                Cell::from(group.category.clone()),
                Cell::from(group.violation_type.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(group.clause_reference.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(group.count.to_string()),
                Cell::from(group.description.clone().unwrap_or_default()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Percentage(20),
            Constraint::Percentage(18),
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Percentage(40),
        ],
    )
    .header(
        Row::new(vec!["Sev", "Category", "Type", "Clause", "Count", "Description"])
            .style(Style::default().fg(LABEL_COLOR).bold()),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BORDER_SAFETY))
            .title(format!(
                " Violations in window ({} flagged verdicts) ",
                app.metrics.violations_flagged
            )),
    );

    if app.violations.is_empty() {
        let empty = Paragraph::new("No violations in the current window")
            .style(Style::default().fg(DIM_COLOR))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(BORDER_SAFETY)),
            );
        frame.render_widget(empty, chunks[1]);
    } else {
        frame.render_widget(table, chunks[1]);
    }

    render_footer(frame, " s/Esc back to timeline", chunks[2]);
}

// ==========================================================================
// Compose view
// ==========================================================================

fn render_compose_view(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Length(5), // Prompt
        Constraint::Length(3), // Scenario
        Constraint::Length(3), // Judge
        Constraint::Length(2), // Status
        Constraint::Min(0),
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, app, "new interaction", chunks[0]);

    let focus_style = Style::default().fg(Color::Cyan);
    let blur_style = Style::default().fg(DIM_COLOR);

    let prompt = Paragraph::new(app.compose.prompt.as_str())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if app.compose.focus == ComposeFocus::Prompt {
                    focus_style
                } else {
                    blur_style
                })
                .title(" Prompt "),
        );
    frame.render_widget(prompt, chunks[1]);

    let scenario_label = app
        .options
        .scenarios
        .get(app.compose.scenario_idx)
        .map(|s| s.label.clone())
        .unwrap_or_else(|| "(none available)".to_string());
    let scenario = Paragraph::new(format!("◀ {} ▶", scenario_label)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(if app.compose.focus == ComposeFocus::Scenario {
                focus_style
            } else {
                blur_style
            })
            .title(" Scenario "),
    );
    frame.render_widget(scenario, chunks[2]);

    let judge_label = app
        .options
        .judges
        .get(app.compose.judge_idx)
        .map(|j| {
            if j.available {
                j.label.clone()
            } else {
                format!("{} (unavailable)", j.label)
            }
        })
        .unwrap_or_else(|| "(none available)".to_string());
    let judge = Paragraph::new(format!("◀ {} ▶", judge_label)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(if app.compose.focus == ComposeFocus::Judge {
                focus_style
            } else {
                blur_style
            })
            .title(" Judge "),
    );
    frame.render_widget(judge, chunks[3]);

    if let Some(status) = &app.compose.status {
        let style = if status.starts_with("submitted") {
            Style::default().fg(Color::Green)
        } else if status.starts_with("submitting") {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Red)
        };
        frame.render_widget(Paragraph::new(status.as_str()).style(style), chunks[4]);
    }

    render_footer(
        frame,
        " type prompt   Tab switch field   ←/→ choose   Enter submit   Esc cancel",
        chunks[6],
    );
}
