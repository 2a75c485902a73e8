//! Error types for the record window engine and its collaborators.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used by record sources and the paginator.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// A page, count or row fetch that did not produce a result.
///
/// Stored in the window state after a failure, so it is `Clone` and carries
/// rendered details rather than the underlying error values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("[TV-2001] query failed in {context}: {details}")]
    Query {
        context: &'static str,
        details: String,
    },

    #[error("[TV-2002] transport failure: {details}")]
    Transport { details: String },

    #[error("[TV-2003] fetch task failed: {details}")]
    TaskFailed { details: String },
}

impl FetchError {
    /// Stable machine-parseable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Query { .. } => "TV-2001",
            Self::Transport { .. } => "TV-2002",
            Self::TaskFailed { .. } => "TV-2003",
        }
    }

    /// Whether retrying via `refresh` or `load_more` might resolve the failure.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Query { .. } | Self::Transport { .. })
    }

    pub fn transport(details: impl Into<String>) -> Self {
        Self::Transport {
            details: details.into(),
        }
    }
}

impl From<rusqlite::Error> for FetchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Query {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            details: value.to_string(),
        }
    }
}

/// Failures loading configuration or persisted filters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[TV-1001] cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TV-1002] cannot parse {path}: {details}")]
    Parse { path: PathBuf, details: String },

    #[error("[TV-1003] cannot persist {path}: {details}")]
    Persist { path: PathBuf, details: String },
}
