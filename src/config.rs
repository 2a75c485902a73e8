use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Capacity of engine inboxes and tick channels
pub const DEFAULT_CHANNEL_BUFFER: usize = 1024;
/// Rows per page
pub const DEFAULT_PAGE_LIMIT: usize = 100;
/// Rows of slack when deciding whether the viewport touches an edge
pub const DEFAULT_OVERSCAN: usize = 5;
/// How long a freshly tailed row stays highlighted
pub const DEFAULT_FLASH_MS: u64 = 5_000;
/// How often the SQLite tick transport polls for changes
pub const DEFAULT_TICK_MS: u64 = 250;

const APP_DIR: &str = "tailview";

/// Configuration for tailview
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rows fetched per page
    pub page_limit: usize,
    /// Overscan rows for edge detection
    pub overscan: usize,
    /// Highlight duration for newly tailed rows, in milliseconds
    pub flash_duration_ms: u64,
    /// Poll interval of the data-version tick transport, in milliseconds
    pub tick_interval_ms: u64,
    /// Engine inbox capacity
    pub channel_buffer: usize,
    /// Color theme name
    pub theme: String,
    /// Database opened when none is given on the command line
    pub database: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            overscan: DEFAULT_OVERSCAN,
            flash_duration_ms: DEFAULT_FLASH_MS,
            tick_interval_ms: DEFAULT_TICK_MS,
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
            theme: "default".to_string(),
            database: None,
        }
    }
}

impl Config {
    /// Defaults, then the config file if present, then environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let config = match config_dir() {
            Some(dir) => Self::from_file(&dir.join("config.toml"))?,
            None => Self::default(),
        };
        Ok(config.with_env().normalized())
    }

    /// Parse a TOML config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml(&raw).map_err(|details| ConfigError::Parse {
            path: path.to_path_buf(),
            details,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, String> {
        toml::from_str::<Self>(raw)
            .map(Self::normalized)
            .map_err(|e| e.to_string())
    }

    /// Apply `TAILVIEW_*` overrides. Unparseable values are ignored.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
            raw.and_then(|s| s.trim().parse().ok())
        }

        if let Some(limit) = parsed(var("TAILVIEW_PAGE_LIMIT")) {
            self.page_limit = limit;
        }
        if let Some(overscan) = parsed(var("TAILVIEW_OVERSCAN")) {
            self.overscan = overscan;
        }
        if let Some(ms) = parsed(var("TAILVIEW_FLASH_MS")) {
            self.flash_duration_ms = ms;
        }
        if let Some(ms) = parsed(var("TAILVIEW_TICK_MS")) {
            self.tick_interval_ms = ms;
        }
        if let Some(theme) = var("TAILVIEW_THEME").filter(|s| !s.trim().is_empty()) {
            self.theme = theme;
        }
        if let Some(path) = var("TAILVIEW_DB").filter(|s| !s.trim().is_empty()) {
            self.database = Some(PathBuf::from(path));
        }
        self
    }

    fn normalized(mut self) -> Self {
        self.page_limit = self.page_limit.max(1);
        self.tick_interval_ms = self.tick_interval_ms.max(1);
        self.channel_buffer = self.channel_buffer.max(1);
        self
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// `<config_dir>/tailview`
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

/// `<data_dir>/tailview`, home of the log file
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR))
}

/// Where the filter set is persisted between runs
pub fn filters_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("filters.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.page_limit, 100);
        assert_eq!(config.flash_duration(), Duration::from_secs(5));
        assert_eq!(config.theme, "default");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("page_limit = 50\ntheme = \"dracula\"\n").unwrap();
        assert_eq!(config.page_limit, 50);
        assert_eq!(config.theme, "dracula");
        assert_eq!(config.overscan, DEFAULT_OVERSCAN);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let config = Config::from_toml("page_limit = 0").unwrap();
        assert_eq!(config.page_limit, 1);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml("page_limit = \"lots\"").is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "overscan = [").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(
            Config::from_file(&dir.path().join("missing.toml")).unwrap(),
            Config::default()
        );
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().with_vars(|key| match key {
            "TAILVIEW_PAGE_LIMIT" => Some("25".to_string()),
            "TAILVIEW_OVERSCAN" => Some("nope".to_string()),
            "TAILVIEW_THEME" => Some("mono".to_string()),
            _ => None,
        });
        assert_eq!(config.page_limit, 25);
        assert_eq!(config.overscan, DEFAULT_OVERSCAN);
        assert_eq!(config.theme, "mono");
        assert_eq!(config.database, None);
    }
}
