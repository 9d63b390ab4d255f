//! Row types for the activity tracker's SQLite database.
//!
//! Both tables are read-only from the exporter's point of view.
//!
//! Table schema:
//! ```sql
//! CREATE TABLE timeline_cards (
//!     id                INTEGER PRIMARY KEY AUTOINCREMENT,
//!     batch_id          INTEGER,
//!     start             TEXT NOT NULL,      -- display time, e.g. "9:30 AM"
//!     end               TEXT NOT NULL,
//!     start_ts          INTEGER NOT NULL,   -- unix seconds
//!     end_ts            INTEGER NOT NULL,
//!     day               DATE NOT NULL,      -- logical day, YYYY-MM-DD
//!     title             TEXT NOT NULL,
//!     summary           TEXT,
//!     category          TEXT,
//!     subcategory       TEXT,
//!     detailed_summary  TEXT,
//!     metadata          TEXT,               -- JSON, see `CardMetadata`
//!     video_summary_url TEXT,
//!     created_at        DATETIME DEFAULT CURRENT_TIMESTAMP,
//!     is_deleted        INTEGER DEFAULT 0
//! );
//!
//! CREATE TABLE journal_entries (
//!     id          INTEGER PRIMARY KEY AUTOINCREMENT,
//!     day         TEXT NOT NULL UNIQUE,
//!     intentions  TEXT,
//!     notes       TEXT,
//!     goals       TEXT,
//!     reflections TEXT,
//!     summary     TEXT,
//!     status      TEXT NOT NULL DEFAULT 'draft',
//!     created_at  DATETIME DEFAULT CURRENT_TIMESTAMP,
//!     updated_at  DATETIME DEFAULT CURRENT_TIMESTAMP
//! );
//! ```
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

pub const UNCATEGORIZED: &str = "Uncategorized";

// ---------------------------------------------------------------------------
// Timeline cards
// ---------------------------------------------------------------------------

/// One observed interval of activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityRecord {
    pub id: i64,
    pub batch_id: Option<i64>,
    /// Human readable start, already formatted by the tracker.
    pub start: String,
    pub end: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub day: String,
    pub title: String,
    pub summary: Option<String>,
    pub detailed_summary: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Raw JSON payload; parse with [`ActivityRecord::parse_metadata`].
    pub metadata: Option<String>,
    pub video_summary_url: Option<String>,
    pub created_at: Option<String>,
    pub is_deleted: bool,
}

impl ActivityRecord {
    /// Length in whole minutes, rounded half-up. Inverted intervals count as zero.
    pub fn duration_minutes(&self) -> i64 {
        let secs = (self.end_ts - self.start_ts).max(0);
        (secs + 30) / 60
    }

    /// Category label with blank or missing values normalized to [`UNCATEGORIZED`].
    pub fn category_label(&self) -> &str {
        match self.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => UNCATEGORIZED,
        }
    }

    pub fn parse_metadata(&self) -> Result<CardMetadata> {
        match self.metadata.as_deref().map(str::trim) {
            None | Some("") | Some("null") => Ok(CardMetadata::default()),
            Some(raw) => serde_json::from_str(raw)
                .wrap_err_with(|| format!("Invalid metadata on card {}", self.id)),
        }
    }

    /// Cards the tracker emits when it failed to analyze a recording batch.
    ///
    /// These carry no real activity and are dropped before aggregation.
    pub fn is_failed_processing(&self) -> bool {
        let is_system = self
            .category
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case("system"));
        if !is_system {
            return false;
        }
        let mentions_failure = |s: &str| {
            let s = s.to_ascii_lowercase();
            s.contains("error") || s.contains("fail")
        };
        mentions_failure(self.title.as_str()) || self.subcategory.as_deref().is_some_and(mentions_failure)
    }
}

// ---------------------------------------------------------------------------
// Card metadata payload
// ---------------------------------------------------------------------------

/// Structured contents of `timeline_cards.metadata`.
///
/// Unknown keys are ignored so tracker upgrades that add fields keep parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMetadata {
    #[serde(default)]
    pub distractions: Vec<Distraction>,
    #[serde(default)]
    pub app_sites: Option<AppSites>,
}

/// A short detour recorded inside a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distraction {
    pub start_time: String,
    pub end_time: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// The applications or sites the card was mostly spent in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSites {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub secondary: Option<String>,
}

impl AppSites {
    /// Non-blank application names, primary first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        [self.primary.as_deref(), self.secondary.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// The user's journal for a logical day. At most one per day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalRecord {
    pub id: i64,
    pub day: String,
    pub intentions: Option<String>,
    pub notes: Option<String>,
    pub goals: Option<String>,
    pub reflections: Option<String>,
    pub summary: Option<String>,
    pub status: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}
