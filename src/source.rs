//! Read-only access to the tracker's SQLite database.

use crate::model::{ActivityRecord, JournalRecord};
use chrono::NaiveDate;
use eyre::{Context, Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, backup::Backup};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Query interface the sync loop needs from a data source.
///
/// Records come back ordered by start time and scoped to exactly one logical day.
pub trait DaySource {
    fn records_for_day(&self, day: NaiveDate, include_deleted: bool) -> Result<Vec<ActivityRecord>>;
    fn journal_for_day(&self, day: NaiveDate) -> Result<Option<JournalRecord>>;
}

pub struct Database {
    conn: Connection,
    has_journal: bool,
}

impl Database {
    /// Open a database read-only and verify the tables we depend on.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_read_only(path)?;

        let db = Self {
            has_journal: table_exists(&conn, "journal_entries")?,
            conn,
        };
        db.card_count().wrap_err_with(|| {
            format!(
                "Database at {} does not look like a timeline database (missing or unreadable timeline_cards table)",
                path.display()
            )
        })?;
        Ok(db)
    }

    pub fn card_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM timeline_cards", [], |row| row.get(0))
            .wrap_err("Failed to count timeline cards")?;
        Ok(count as u64)
    }

    pub fn has_journal(&self) -> bool {
        self.has_journal
    }
}

/// Every connection to the tracker's own files goes through here.
fn open_read_only(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .wrap_err_with(|| format!("Failed to open database: {}", path.display()))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .wrap_err("Failed to inspect database schema")
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
    Ok(ActivityRecord {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        start: row.get(2)?,
        end: row.get(3)?,
        start_ts: row.get(4)?,
        end_ts: row.get(5)?,
        day: row.get(6)?,
        title: row.get(7)?,
        summary: row.get(8)?,
        detailed_summary: row.get(9)?,
        category: row.get(10)?,
        subcategory: row.get(11)?,
        metadata: row.get(12)?,
        video_summary_url: row.get(13)?,
        created_at: row.get(14)?,
        is_deleted: row.get::<_, Option<bool>>(15)?.unwrap_or(false),
    })
}

impl DaySource for Database {
    fn records_for_day(&self, day: NaiveDate, include_deleted: bool) -> Result<Vec<ActivityRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT id, batch_id, start, end, start_ts, end_ts, day, title, summary,
                        detailed_summary, category, subcategory, metadata, video_summary_url,
                        created_at, is_deleted
                 FROM timeline_cards
                 WHERE day = ?1 AND (?2 OR COALESCE(is_deleted, 0) = 0)
                 ORDER BY start_ts ASC, id ASC",
            )
            .wrap_err("Failed to prepare card query")?;
        let records = stmt
            .query_map((day_key(day), include_deleted), card_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .wrap_err_with(|| format!("Failed to read cards for {}", day))?;
        Ok(records)
    }

    fn journal_for_day(&self, day: NaiveDate) -> Result<Option<JournalRecord>> {
        if !self.has_journal {
            return Ok(None);
        }
        self.conn
            .query_row(
                "SELECT id, day, intentions, notes, goals, reflections, summary, status,
                        created_at, updated_at
                 FROM journal_entries WHERE day = ?1 LIMIT 1",
                [day_key(day)],
                |row| {
                    Ok(JournalRecord {
                        id: row.get(0)?,
                        day: row.get(1)?,
                        intentions: row.get(2)?,
                        notes: row.get(3)?,
                        goals: row.get(4)?,
                        reflections: row.get(5)?,
                        summary: row.get(6)?,
                        status: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                    })
                },
            )
            .optional()
            .wrap_err_with(|| format!("Failed to read journal for {}", day))
    }
}

/// Copy the live database into a temporary file with the SQLite backup API.
///
/// The tracker keeps writing while we export; working on a snapshot gives a
/// consistent view and never takes a write lock on the original.
pub fn snapshot_database(db_path: &Path, quiet: bool) -> Result<NamedTempFile> {
    let spinner = snapshot_spinner(quiet);
    let src = open_read_only(db_path)?;

    let snapshot = NamedTempFile::new().wrap_err("Failed to create snapshot file")?;
    let mut dst = Connection::open(snapshot.path()).wrap_err("Failed to open snapshot file")?;
    Backup::new(&src, &mut dst)
        .and_then(|backup| backup.run_to_completion(1000, Duration::from_millis(5), None))
        .wrap_err_with(|| format!("Failed to snapshot database: {}", db_path.display()))?;

    spinner.finish_and_clear();
    Ok(snapshot)
}

fn snapshot_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Snapshotting database...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Fail early with remediation steps when the database is not where we expect it.
pub fn ensure_database_present(db_path: &Path) -> Result<()> {
    if db_path.is_file() {
        return Ok(());
    }
    Err(eyre!(
        "Database not found at: {}\n\
         Make sure the tracker has been run at least once, or use --db to point at its database file \
         (or set db_path in config.toml).",
        db_path.display()
    ))
}
