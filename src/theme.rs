use ratatui::style::Color;

use tailview::record::{Level, MarkerKind};

/// All themeable colors in the application
#[derive(Clone, Debug)]
pub struct Theme {
    pub name: &'static str,

    // Log levels
    pub level_error: Color,
    pub level_warn: Color,
    pub level_info: Color,
    pub level_debug: Color,
    pub level_trace: Color,

    // Header
    pub header_title: Color,
    pub header_source: Color,
    pub header_bg: Color,

    // Status bar
    pub status_mode_bg: Color,
    pub status_mode_fg: Color,
    pub status_help: Color,
    pub status_bg: Color,
    pub live: Color,

    // Table
    pub timestamp: Color,
    pub source: Color,
    pub selected_bg: Color,
    /// Background of freshly tailed rows, blended out as the flash decays
    pub flash_bg: Color,

    // Markers
    pub marker_info: Color,
    pub marker_warning: Color,
    pub marker_error: Color,
    pub marker_success: Color,
    pub marker_note: Color,

    // Detail pane
    pub json: Color,

    // Filters
    pub filter_chip: Color,

    // Empty states / messages
    pub empty_state: Color,
    pub warning_message: Color,

    // Help overlay
    pub help_border: Color,
    pub help_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

impl Theme {
    pub fn default_theme() -> Self {
        Self {
            name: "default",

            level_error: Color::Red,
            level_warn: Color::Yellow,
            level_info: Color::Green,
            level_debug: Color::Blue,
            level_trace: Color::DarkGray,

            header_title: Color::Green,
            header_source: Color::Cyan,
            header_bg: Color::DarkGray,

            status_mode_bg: Color::Blue,
            status_mode_fg: Color::White,
            status_help: Color::DarkGray,
            status_bg: Color::Black,
            live: Color::Green,

            timestamp: Color::DarkGray,
            source: Color::Cyan,
            selected_bg: Color::Rgb(50, 50, 70),
            flash_bg: Color::Rgb(40, 80, 40),

            marker_info: Color::Blue,
            marker_warning: Color::Yellow,
            marker_error: Color::Red,
            marker_success: Color::Green,
            marker_note: Color::Magenta,

            json: Color::Cyan,

            filter_chip: Color::Yellow,

            empty_state: Color::DarkGray,
            warning_message: Color::Yellow,

            help_border: Color::Cyan,
            help_bg: Color::Black,
        }
    }

    /// Dracula theme - popular dark theme
    pub fn dracula() -> Self {
        Self {
            name: "dracula",

            level_error: Color::Rgb(255, 85, 85),   // Red
            level_warn: Color::Rgb(255, 184, 108),  // Orange
            level_info: Color::Rgb(80, 250, 123),   // Green
            level_debug: Color::Rgb(139, 233, 253), // Cyan
            level_trace: Color::Rgb(98, 114, 164),  // Comment gray

            header_title: Color::Rgb(255, 121, 198),  // Pink
            header_source: Color::Rgb(139, 233, 253), // Cyan
            header_bg: Color::Rgb(40, 42, 54),        // Background

            status_mode_bg: Color::Rgb(189, 147, 249), // Purple
            status_mode_fg: Color::Rgb(40, 42, 54),
            status_bg: Color::Rgb(33, 34, 44),
            status_help: Color::Rgb(98, 114, 164),
            live: Color::Rgb(80, 250, 123),

            timestamp: Color::Rgb(98, 114, 164),
            source: Color::Rgb(139, 233, 253),
            selected_bg: Color::Rgb(68, 71, 90), // Current line
            flash_bg: Color::Rgb(55, 90, 70),

            marker_info: Color::Rgb(139, 233, 253),
            marker_warning: Color::Rgb(255, 184, 108),
            marker_error: Color::Rgb(255, 85, 85),
            marker_success: Color::Rgb(80, 250, 123),
            marker_note: Color::Rgb(255, 121, 198),

            json: Color::Rgb(139, 233, 253),

            filter_chip: Color::Rgb(241, 250, 140), // Yellow

            empty_state: Color::Rgb(98, 114, 164),
            warning_message: Color::Rgb(255, 184, 108),

            help_border: Color::Rgb(189, 147, 249),
            help_bg: Color::Rgb(40, 42, 54),
        }
    }

    /// Monochrome theme - grayscale only
    pub fn monochrome() -> Self {
        Self {
            name: "monochrome",

            level_error: Color::Rgb(255, 255, 255), // White (stands out)
            level_warn: Color::Rgb(200, 200, 200),
            level_info: Color::Rgb(170, 170, 170),
            level_debug: Color::Rgb(130, 130, 130),
            level_trace: Color::Rgb(90, 90, 90),

            header_title: Color::Rgb(255, 255, 255),
            header_source: Color::Rgb(180, 180, 180),
            header_bg: Color::Rgb(40, 40, 40),

            status_mode_bg: Color::Rgb(200, 200, 200),
            status_mode_fg: Color::Rgb(0, 0, 0),
            status_help: Color::Rgb(120, 120, 120),
            status_bg: Color::Rgb(20, 20, 20),
            live: Color::Rgb(255, 255, 255),

            timestamp: Color::Rgb(110, 110, 110),
            source: Color::Rgb(180, 180, 180),
            selected_bg: Color::Rgb(60, 60, 60),
            flash_bg: Color::Rgb(45, 45, 45),

            marker_info: Color::Rgb(170, 170, 170),
            marker_warning: Color::Rgb(200, 200, 200),
            marker_error: Color::Rgb(255, 255, 255),
            marker_success: Color::Rgb(150, 150, 150),
            marker_note: Color::Rgb(220, 220, 220),

            json: Color::Rgb(200, 200, 200),

            filter_chip: Color::Rgb(230, 230, 230),

            empty_state: Color::Rgb(100, 100, 100),
            warning_message: Color::Rgb(220, 220, 220),

            help_border: Color::Rgb(200, 200, 200),
            help_bg: Color::Rgb(10, 10, 10),
        }
    }

    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "dracula" => Self::dracula(),
            "monochrome" | "mono" => Self::monochrome(),
            _ => Self::default_theme(),
        }
    }

    pub fn level_color(&self, level: Option<Level>) -> Color {
        match level {
            Some(Level::Error) => self.level_error,
            Some(Level::Warn) => self.level_warn,
            Some(Level::Info) => self.level_info,
            Some(Level::Debug) => self.level_debug,
            Some(Level::Trace) | Some(Level::Off) | None => self.level_trace,
        }
    }

    pub fn marker_color(&self, kind: MarkerKind) -> Color {
        match kind {
            MarkerKind::Info => self.marker_info,
            MarkerKind::Warning => self.marker_warning,
            MarkerKind::Error => self.marker_error,
            MarkerKind::Success => self.marker_success,
            MarkerKind::Note => self.marker_note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(Theme::by_name("Dracula").name, "dracula");
        assert_eq!(Theme::by_name("mono").name, "monochrome");
        assert_eq!(Theme::by_name("unknown").name, "default");
    }
}
