use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Cell, Clear, Paragraph, Row as TableRow, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Table, Wrap,
    },
};

use tailview::flash;
use tailview::record::Row;

use crate::app::{AppState, InputMode, format_timestamp};
use crate::theme::Theme;

pub fn draw(frame: &mut Frame, state: &mut AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(3),    // Records
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Filter / note bar
        ])
        .split(frame.area());

    draw_header(frame, state, chunks[0]);

    if state.show_detail {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);
        draw_table(frame, state, body[0]);
        draw_detail(frame, state, body[1]);
    } else {
        draw_table(frame, state, chunks[1]);
    }

    draw_status_bar(frame, state, chunks[2]);
    draw_bottom_bar(frame, state, chunks[3]);

    if state.show_help {
        draw_help_overlay(frame, &state.theme);
    }
}

/// Draw the header showing the current source
fn draw_header(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " tailview ",
            Style::default()
                .fg(theme.header_title)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
        Span::styled(state.engine.source_name(), Style::default().fg(theme.header_source)),
    ]))
    .style(Style::default().bg(theme.header_bg));

    frame.render_widget(header, area);
}

fn draw_table(frame: &mut Frame, state: &mut AppState, area: Rect) {
    let block = Block::default().borders(Borders::NONE);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // One line goes to the column header
    let height = inner.height.saturating_sub(1) as usize;
    if height == 0 {
        return;
    }
    state.set_viewport_height(height);

    let now = flash::now_ms();
    let start = state.offset.min(state.rows().len());
    let end = (start + height).min(state.rows().len());
    let visible: Vec<Row> = state.rows()[start..end].to_vec();

    let mut table_rows = Vec::with_capacity(visible.len());
    for (i, row) in visible.iter().enumerate() {
        let message = state.rendered_message(row.id, &row.message);
        let style = row_style(state, row, start + i == state.selected, now);
        table_rows.push(table_row(&state.theme, row, message).style(style));
    }

    let header = TableRow::new(vec!["time", "level", "source", "", "message"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let widths = [
        Constraint::Length(12),
        Constraint::Length(5),
        Constraint::Length(14),
        Constraint::Length(1),
        Constraint::Min(10),
    ];
    let table = Table::new(table_rows, widths).header(header).column_spacing(1);
    frame.render_widget(table, inner);

    let total = state.rows().len();
    if total > height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state = ScrollbarState::new(total).position(state.selected);
        frame.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
    }

    let window = state.engine.state();
    let empty = if !window.loaded {
        Some(("Loading...", state.theme.empty_state))
    } else if total == 0 && !state.engine.filters().is_empty() {
        Some(("No records match the current filters", state.theme.warning_message))
    } else if total == 0 {
        Some(("No records yet", state.theme.empty_state))
    } else {
        None
    };
    if let Some((msg, color)) = empty {
        let body = Rect::new(inner.x, inner.y + 1, inner.width, inner.height - 1);
        frame.render_widget(Paragraph::new(msg).style(Style::default().fg(color)), body);
    }
}

fn table_row<'t>(theme: &Theme, row: &Row, message: Text<'t>) -> TableRow<'t> {
    let level = row.level.map(|l| l.name()).unwrap_or("-");
    let marker = match row.marker {
        Some(kind) => Span::styled("●", Style::default().fg(theme.marker_color(kind))),
        None if row.marker_note.is_some() => Span::raw("✎"),
        None => Span::raw(" "),
    };

    TableRow::new(vec![
        Cell::from(Span::styled(
            format_timestamp(row.timestamp_ms),
            Style::default().fg(theme.timestamp),
        )),
        Cell::from(Span::styled(
            level.to_string(),
            Style::default().fg(theme.level_color(row.level)),
        )),
        Cell::from(Span::styled(
            row.source.clone().unwrap_or_default(),
            Style::default().fg(theme.source),
        )),
        Cell::from(marker),
        Cell::from(message),
    ])
}

fn row_style(state: &AppState, row: &Row, selected: bool, now: i64) -> Style {
    if selected {
        return Style::default().bg(state.theme.selected_bg);
    }
    let intensity = flash::flash_intensity(row, now, state.flash_duration_ms);
    if intensity > 0.0 {
        Style::default().bg(fade(state.theme.flash_bg, intensity))
    } else {
        Style::default()
    }
}

/// Scale an RGB color toward black. Named colors cannot fade and stay as is.
fn fade(color: Color, intensity: f32) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let scale = |c: u8| (c as f32 * intensity.clamp(0.0, 1.0)) as u8;
            Color::Rgb(scale(r), scale(g), scale(b))
        }
        other => other,
    }
}

fn draw_detail(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let block = Block::default()
        .title(" Detail ")
        .borders(Borders::LEFT)
        .border_style(Style::default().fg(theme.help_border));

    let Some(row) = state.selected_row() else {
        frame.render_widget(block, area);
        return;
    };

    let mut lines = vec![
        Line::from(format!("id      {}", row.id)),
        Line::from(format!("time    {}", format_timestamp(row.timestamp_ms))),
        Line::from(format!(
            "level   {}",
            row.level.map(|l| l.name()).unwrap_or("-")
        )),
        Line::from(format!("source  {}", row.source.as_deref().unwrap_or("-"))),
    ];
    if let Some(span) = row.span_id {
        lines.push(Line::from(format!("span    {}", span)));
    }
    if let Some(kind) = row.marker {
        lines.push(Line::from(Span::styled(
            format!("marker  {}", kind.label()),
            Style::default().fg(theme.marker_color(kind)),
        )));
    }
    if let Some(note) = &row.marker_note {
        lines.push(Line::from(format!("note    {}", note)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(row.message.clone()));
    lines.push(Line::from(""));
    for field_line in state.detail_fields().unwrap_or_default().lines() {
        lines.push(Line::from(Span::styled(
            field_line.to_string(),
            Style::default().fg(theme.json),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Draw the status bar
fn draw_status_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let window = state.engine.state();

    let mode_str = match state.mode {
        InputMode::Normal => "NORMAL",
        InputMode::NoteEditing => "NOTE",
    };

    let counts = match window.total {
        Some(total) => format!(" {}/{} rows", window.rows.len(), total),
        None => format!(" {} rows", window.rows.len()),
    };

    let mut indicators = Vec::new();
    if window.pending_new > 0 {
        indicators.push(format!("+{} new (g)", window.pending_new));
    }
    if window.loading {
        indicators.push("loading".to_string());
    } else if window.loaded && !window.has_more {
        indicators.push("end".to_string());
    }
    if let Some(e) = &window.error {
        indicators.push(format!("[{}]", e.code()));
    }
    let indicators_str = if indicators.is_empty() {
        String::new()
    } else {
        format!(" | {}", indicators.join(" | "))
    };

    let live = if state.engine.is_live() {
        Span::styled(" LIVE ", Style::default().fg(theme.live).add_modifier(Modifier::BOLD))
    } else {
        Span::raw("")
    };

    let help_text = match state.mode {
        InputMode::NoteEditing => " Enter:save  Esc:cancel ",
        InputMode::Normal => " ?:help  f/s/m:filter  M:mark ",
    };

    let status = Line::from(vec![
        Span::styled(
            format!(" {} ", mode_str),
            Style::default()
                .bg(theme.status_mode_bg)
                .fg(theme.status_mode_fg),
        ),
        live,
        Span::raw(format!("{}{} ", counts, indicators_str)),
        Span::styled(help_text, Style::default().fg(theme.status_help)),
    ]);

    let paragraph = Paragraph::new(status).style(Style::default().bg(theme.status_bg));
    frame.render_widget(paragraph, area);
}

/// Draw the note input while editing, otherwise the status message or active filters
fn draw_bottom_bar(frame: &mut Frame, state: &mut AppState, area: Rect) {
    let theme = state.theme.clone();
    match state.mode {
        InputMode::NoteEditing => {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Length(6), // "note: " prefix
                    Constraint::Min(1),    // textarea
                ])
                .split(area);

            let prefix = Paragraph::new("note: ").style(Style::default().fg(theme.filter_chip));
            frame.render_widget(prefix, chunks[0]);
            frame.render_widget(&state.note_textarea, chunks[1]);
        }
        InputMode::Normal => {
            let line = if let Some(msg) = &state.status_message {
                Line::from(Span::styled(
                    msg.clone(),
                    Style::default().fg(theme.warning_message),
                ))
            } else if state.engine.filters().is_empty() {
                Line::from(Span::styled(
                    "no filters",
                    Style::default().fg(theme.empty_state),
                ))
            } else {
                let mut spans = Vec::new();
                for (i, filter) in state.engine.filters().list().iter().enumerate() {
                    spans.push(Span::styled(
                        format!("[{}] {}", i + 1, filter.label()),
                        Style::default().fg(theme.filter_chip),
                    ));
                    spans.push(Span::raw("  "));
                }
                Line::from(spans)
            };
            frame.render_widget(Paragraph::new(line), area);
        }
    }
}

/// Draw the help overlay
fn draw_help_overlay(frame: &mut Frame, theme: &Theme) {
    let area = frame.area();

    // Center the help box
    let width = 52.min(area.width.saturating_sub(4));
    let height = 26.min(area.height.saturating_sub(4));
    let x = (area.width - width) / 2;
    let y = (area.height - height) / 2;
    let help_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, help_area);

    let help_text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Navigation:"),
        Line::from("  j/k, ↑/↓     Move selection"),
        Line::from("  g/G          Newest / oldest loaded row"),
        Line::from("  PgUp/PgDn    Page up/down"),
        Line::from("  L            Load older rows"),
        Line::from("  r            Reload from the newest row"),
        Line::from(""),
        Line::from("Filtering (from the selected row):"),
        Line::from("  f / s / t    Level / source / span"),
        Line::from("  m            Marker"),
        Line::from("  1-9          Remove filter"),
        Line::from("  X            Clear all filters"),
        Line::from(""),
        Line::from("Rows:"),
        Line::from("  M            Cycle marker"),
        Line::from("  n            Edit note"),
        Line::from("  y            Copy row"),
        Line::from("  Enter        Toggle detail pane"),
        Line::from(""),
        Line::from("  ?            Toggle this help"),
        Line::from("  q            Quit"),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.help_border))
        .style(Style::default().bg(theme.help_bg));

    let paragraph = Paragraph::new(help_text).block(block);
    frame.render_widget(paragraph, help_area);
}
