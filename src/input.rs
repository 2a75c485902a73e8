use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tui_textarea::Input;

use crate::app::{AppState, InputMode};

/// Handle a mouse event
pub fn handle_mouse(state: &mut AppState, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            for _ in 0..3 {
                state.scroll_up();
            }
        }
        MouseEventKind::ScrollDown => {
            for _ in 0..3 {
                state.scroll_down();
            }
        }
        _ => {}
    }
}

/// Handle a key event and update app state accordingly
pub fn handle_key(state: &mut AppState, key: KeyEvent, page_size: usize) {
    // Help overlay takes priority
    if state.show_help {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            state.show_help = false;
        }
        return;
    }

    match state.mode {
        InputMode::Normal => handle_normal_mode(state, key, page_size),
        InputMode::NoteEditing => handle_note_mode(state, key),
    }
}

fn handle_normal_mode(state: &mut AppState, key: KeyEvent, page_size: usize) {
    match key.code {
        KeyCode::Char('q') => {
            state.should_quit = true;
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.should_quit = true;
        }

        KeyCode::Char('?') => {
            state.show_help = true;
        }

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => state.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => state.scroll_up(),
        KeyCode::PageDown => state.scroll_page_down(page_size),
        KeyCode::PageUp => state.scroll_page_up(page_size),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.scroll_page_down(page_size);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.scroll_page_up(page_size);
        }
        KeyCode::Char('g') | KeyCode::Home => state.go_to_top(),
        KeyCode::Char('G') | KeyCode::End => state.go_to_bottom(),

        // Filters from the selected row
        KeyCode::Char('f') => state.filter_by_level(),
        KeyCode::Char('s') => state.filter_by_source(),
        KeyCode::Char('t') => state.filter_by_span(),
        KeyCode::Char('m') => state.filter_by_marker(),
        KeyCode::Char(c @ '1'..='9') => {
            if let Some(slot) = c.to_digit(10) {
                state.remove_filter(slot as usize);
            }
        }
        KeyCode::Char('X') => state.clear_filters(),

        // Window
        KeyCode::Char('r') => state.refresh(),
        KeyCode::Char('L') => state.load_more(),

        // Markers
        KeyCode::Char('M') => state.cycle_marker(),
        KeyCode::Char('n') => state.start_note_edit(),

        KeyCode::Char('y') => state.yank_selected(),
        KeyCode::Enter => {
            state.show_detail = !state.show_detail;
        }

        KeyCode::Esc => {
            if state.show_detail {
                state.show_detail = false;
            } else {
                state.status_message = None;
            }
        }

        _ => {}
    }
}

fn handle_note_mode(state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => state.submit_note(),
        KeyCode::Esc => state.cancel_note(),
        _ => {
            // Forward all other keys to the textarea
            state.note_textarea.input(Input::from(key));
        }
    }
}
