use std::collections::{HashMap, HashSet};

use ansi_to_tui::IntoText;
use ratatui::style::{Color, Style};
use ratatui::text::Text;
use tui_textarea::TextArea;

use tailview::config::Config;
use tailview::engine::{EngineEvent, Handled, WindowEngine};
use tailview::filter::Filter;
use tailview::record::{MarkerKind, Row};
use tailview::sources::MarkerUpdate;
use tailview::viewport::ViewportReport;
use tailview::window::FetchMode;

use crate::theme::Theme;

/// Input mode for the application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    /// Normal navigation mode
    Normal,
    /// Editing the marker note of the selected row
    NoteEditing,
}

/// Main application state
pub struct AppState<'a> {
    pub engine: WindowEngine,
    /// Index of the selected row in the window
    pub selected: usize,
    /// Index of the first visible row
    pub offset: usize,
    /// Rows that fit in the table, as of the last draw
    pub viewport_height: usize,
    pub mode: InputMode,
    /// Note input widget
    pub note_textarea: TextArea<'a>,
    /// Row whose note is being edited
    pub editing_id: Option<i64>,
    pub status_message: Option<String>,
    pub show_help: bool,
    /// Whether the detail pane for the selected row is open
    pub show_detail: bool,
    pub should_quit: bool,
    pub theme: Theme,
    pub flash_duration_ms: i64,
    /// Messages with ANSI codes converted to styles, by row id
    rendered: HashMap<i64, Text<'static>>,
    last_report: Option<ViewportReport>,
}

impl<'a> AppState<'a> {
    pub fn new(engine: WindowEngine, config: &Config, theme: Theme) -> Self {
        Self {
            engine,
            selected: 0,
            offset: 0,
            viewport_height: 0,
            mode: InputMode::Normal,
            note_textarea: Self::empty_textarea(),
            editing_id: None,
            status_message: None,
            show_help: false,
            show_detail: false,
            should_quit: false,
            theme,
            flash_duration_ms: i64::try_from(config.flash_duration_ms).unwrap_or(i64::MAX),
            rendered: HashMap::new(),
            last_report: None,
        }
    }

    fn empty_textarea() -> TextArea<'a> {
        let mut textarea = TextArea::default();
        textarea.set_cursor_line_style(Style::default());
        textarea.set_placeholder_text("note for this row...");
        textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
        textarea
    }

    pub fn rows(&self) -> &[Row] {
        &self.engine.state().rows
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows().get(self.selected)
    }

    /// Feed an inbox event to the engine, keeping the selection on the same row
    pub fn on_engine_event(&mut self, event: EngineEvent) {
        let anchor = if self.selected > 0 {
            self.selected_row().map(|row| row.id)
        } else {
            None
        };

        match self.engine.handle(event) {
            Handled::Applied(FetchMode::Replace) => {
                self.rendered.clear();
                self.selected = 0;
                self.offset = 0;
            }
            Handled::Failed(mode) => {
                if let Some(e) = &self.engine.state().error {
                    self.status_message = Some(format!("{} failed: {}", mode.name(), e));
                }
            }
            handled => {
                if matches!(handled, Handled::Applied(_)) {
                    self.prune_rendered();
                }
                if let Some(position) = anchor.and_then(|id| self.engine.state().position_of(id)) {
                    self.selected = position;
                }
            }
        }
        self.sync_viewport();
    }

    /// Clamp the selection, scroll it into view and report the visible range
    pub fn sync_viewport(&mut self) {
        let total = self.rows().len();
        self.selected = self.selected.min(total.saturating_sub(1));

        let height = self.viewport_height.max(1);
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + height {
            self.offset = self.selected + 1 - height;
        }
        self.offset = self.offset.min(total.saturating_sub(1));

        let last = (self.offset + height).min(total).saturating_sub(1);
        let report = ViewportReport::new(self.offset, last.max(self.offset), total);
        if self.last_report != Some(report) {
            self.last_report = Some(report);
            self.engine.report_viewport(report);
        }
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        if self.viewport_height != height {
            self.viewport_height = height;
            self.sync_viewport();
        }
    }

    pub fn scroll_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.sync_viewport();
    }

    pub fn scroll_down(&mut self) {
        self.selected += 1;
        self.sync_viewport();
    }

    pub fn scroll_page_up(&mut self, page_size: usize) {
        self.selected = self.selected.saturating_sub(page_size);
        self.sync_viewport();
    }

    pub fn scroll_page_down(&mut self, page_size: usize) {
        self.selected += page_size;
        self.sync_viewport();
    }

    /// Back to the newest row, where the live tail resumes
    pub fn go_to_top(&mut self) {
        self.selected = 0;
        self.sync_viewport();
    }

    /// Jump to the oldest loaded row; reaching it pulls in the next page
    pub fn go_to_bottom(&mut self) {
        self.selected = self.rows().len().saturating_sub(1);
        self.sync_viewport();
    }

    pub fn filter_by_level(&mut self) {
        if let Some(row) = self.selected_row() {
            let filter = Filter::level(row.level);
            self.apply_filter(filter);
        }
    }

    pub fn filter_by_source(&mut self) {
        if let Some(row) = self.selected_row() {
            let filter = Filter::source(row.source.as_deref());
            self.apply_filter(filter);
        }
    }

    pub fn filter_by_marker(&mut self) {
        if let Some(row) = self.selected_row() {
            let filter = Filter::marker(row.marker);
            self.apply_filter(filter);
        }
    }

    pub fn filter_by_span(&mut self) {
        let Some(span) = self.selected_row().and_then(|row| row.span_id) else {
            self.status_message = Some("Row has no span".to_string());
            return;
        };
        self.apply_filter(Filter::span(Some(span)));
    }

    fn apply_filter(&mut self, filter: Filter) {
        let label = filter.label();
        self.engine.apply_filter(filter);
        self.status_message = Some(format!("Filter: {}", label));
    }

    /// Remove the filter shown at 1-based `slot` in the filter bar
    pub fn remove_filter(&mut self, slot: usize) {
        let Some(index) = slot.checked_sub(1) else {
            return;
        };
        if let Some(removed) = self.engine.remove_filter(index) {
            self.status_message = Some(format!("Removed {}", removed.label()));
        }
    }

    pub fn clear_filters(&mut self) {
        if self.engine.clear_filters() {
            self.status_message = Some("Filters cleared".to_string());
        }
    }

    pub fn refresh(&mut self) {
        self.engine.refresh();
        self.status_message = Some("Reloading".to_string());
    }

    pub fn load_more(&mut self) {
        if !self.engine.load_more() && !self.engine.state().has_more {
            self.status_message = Some("No older rows".to_string());
        }
    }

    /// Advance the selected row to the next marker kind, wrapping to none
    pub fn cycle_marker(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let (id, next) = (row.id, MarkerKind::cycle(row.marker));
        self.engine.update_marker(id, MarkerUpdate::kind(next));
        self.status_message = Some(match next {
            Some(kind) => format!("Marked {}", kind.label()),
            None => "Marker removed".to_string(),
        });
    }

    pub fn start_note_edit(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let (id, note) = (row.id, row.marker_note.clone().unwrap_or_default());
        self.note_textarea = Self::empty_textarea();
        self.note_textarea.insert_str(note);
        self.editing_id = Some(id);
        self.mode = InputMode::NoteEditing;
    }

    pub fn submit_note(&mut self) {
        if let Some(id) = self.editing_id.take() {
            let text = self.note_textarea.lines().join("\n");
            let note = Some(text.trim().to_string()).filter(|s| !s.is_empty());
            self.engine.update_marker(id, MarkerUpdate::note(note));
            self.status_message = Some("Note saved".to_string());
        }
        self.mode = InputMode::Normal;
    }

    pub fn cancel_note(&mut self) {
        self.editing_id = None;
        self.mode = InputMode::Normal;
    }

    /// Copy the selected row to the system clipboard
    pub fn yank_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let line = format!(
            "{} {} {} {}",
            format_timestamp(row.timestamp_ms),
            row.level.map(|l| l.name()).unwrap_or("-"),
            row.source.as_deref().unwrap_or("-"),
            row.message
        );
        let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(line));
        self.status_message = Some(match copied {
            Ok(()) => "Copied row".to_string(),
            Err(e) => format!("Clipboard unavailable: {}", e),
        });
    }

    /// The selected row's fields, pretty-printed when they parse as JSON
    pub fn detail_fields(&self) -> Option<String> {
        let row = self.selected_row()?;
        Some(pretty_fields(&row.fields))
    }

    /// Message of `row` with ANSI escapes rendered, cached per row
    pub fn rendered_message(&mut self, row_id: i64, message: &str) -> Text<'static> {
        self.rendered
            .entry(row_id)
            .or_insert_with(|| {
                if message.contains('\x1b') {
                    message
                        .as_bytes()
                        .into_text()
                        .unwrap_or_else(|_| Text::raw(message.to_string()))
                } else {
                    Text::raw(message.to_string())
                }
            })
            .clone()
    }

    /// Forget renders of rows that have left the window
    fn prune_rendered(&mut self) {
        let live: HashSet<i64> = self.rows().iter().map(|row| row.id).collect();
        self.rendered.retain(|id, _| live.contains(id));
    }
}

pub fn pretty_fields(fields: &str) -> String {
    serde_json::from_str::<serde_json::Value>(fields)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| fields.to_string())
}

/// Local wall-clock time with milliseconds
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(timestamp_ms) {
        Some(utc) => utc
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S%.3f")
            .to_string(),
        None => timestamp_ms.to_string(),
    }
}
