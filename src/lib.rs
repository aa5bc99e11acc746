//! State engine behind an interactive tabular/pivot data view.
//!
//! This crate tracks column sort order, column layout (order, visibility,
//! width), derives dynamic columns from semi-structured record payloads,
//! and drives a collapsible hierarchical aggregation ("pivot") tree with
//! an expression-based local filter.
//!
//! Rendering, the network round-trip that replaces table content, and the
//! real key/value store live outside this crate and are reached through
//! traits ([`controller::RefreshSink`], [`storage::SettingsBackend`]).

pub mod config;
pub mod controller;
pub mod layout;
pub mod logging;
pub mod pivot;
pub mod projector;
pub mod sort;
pub mod storage;
pub mod table;

pub use config::EngineConfig;
pub use controller::{ClickModifiers, GridController, PageState, RefreshSink};
pub use layout::{ColumnSettings, GridSettings, LayoutStore};
pub use pivot::tree::{PivotNode, PivotTree};
pub use sort::{SortDirection, SortEngine, SortIndicator, SortKey};
pub use storage::{MemoryBackend, SettingsBackend};
pub use table::{Column, ColumnId, TableRow, TableState};
