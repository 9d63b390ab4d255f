//! # timeline-export
//!
//! Exports an activity tracker's timeline cards and daily journal to one
//! Markdown file per day.
//!
//! ## What it does
//!
//! The tracker stores observed activity ("cards") and an optional journal per
//! day in a local SQLite database. This tool snapshots that database, groups
//! cards by *logical day* (a day that starts at a configurable hour, 04:00 by
//! default, so late nights stay with the evening they belong to) and writes
//! `timeline-YYYY-MM-DD.md` files with YAML frontmatter holding the day's
//! totals, categories, journal status and timestamps.
//!
//! The database is opened **read-only**; your data is never modified.
//!
//! ## Incremental export
//!
//! Re-running is cheap. A day whose window has fully passed and that already
//! has a file is skipped. The current day is rewritten on each run while keeping
//! the file's original `created` timestamp. `--force` regenerates everything in
//! the lookback window with fresh timestamps.
//!
//! ## Usage
//!
//! ```sh
//! # Export the last week into a notes folder
//! timeline-export ~/notes/timeline --days 7
//!
//! # A whole month, days starting at 05:00, tagged for Obsidian
//! timeline-export ~/notes/timeline --days 30 --day-start-hour 5 --tags timeline,daily
//! ```
//!
//! Preferences can be persisted in `~/.config/timeline-export/config.toml`.
pub mod aggregate;
pub mod day;
pub mod decision;
pub mod model;
pub mod render;
pub mod source;
pub mod store;
pub mod sync;
pub mod utils;

pub use day::{DayBoundary, LogicalDay};
pub use sync::{SyncReport, execute};
pub use utils::ExportConfig;
