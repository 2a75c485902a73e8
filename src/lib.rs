//! Windowed record synchronization for a log inspector.
//!
//! A [`WindowEngine`] keeps a bounded, newest-first window of rows from a
//! [`RecordSource`] in step with filters, the user's scroll position and live
//! change notifications.

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod flash;
pub mod live;
pub mod paginator;
pub mod query;
pub mod record;
pub mod sources;
pub mod viewport;
pub mod window;

pub use engine::{EngineEvent, Handled, WindowEngine};
pub use error::{ConfigError, FetchError, FetchResult};
pub use filter::{Column, Filter, FilterSet, FilterValue};
pub use record::{Cursor, Level, MarkerKind, Row};
pub use sources::{RecordSource, TickSource};
pub use window::{FetchMode, WindowState};
