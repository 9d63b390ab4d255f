use crate::aggregate::DaySummary;
use crate::decision::{self, Decision, DecisionInput, SyncAction, Timestamp};
use crate::model::{ActivityRecord, JournalRecord};
use crate::render::{DayDocument, write_day_markdown};
use crate::source::{self, Database, DaySource};
use crate::store::{ArtifactStore, MarkdownStore};
use crate::utils::ExportConfig;
use chrono::{Local, NaiveDate};
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::io::{self, Write};
use tracing::{debug, error, info, warn};

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub considered: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped_complete: usize,
    pub skipped_empty: usize,
    /// Days whose data could not be read; counted as skipped.
    pub failed: usize,
}

impl SyncReport {
    pub fn skipped(&self) -> usize {
        self.skipped_complete + self.skipped_empty + self.failed
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Done. {} created, {} updated, {} skipped ({} days considered).",
            self.created,
            self.updated,
            self.skipped(),
            self.considered
        )?;
        if self.failed > 0 {
            write!(f, " Completed with {} error(s).", self.failed)?;
        }
        Ok(())
    }
}

/// One day's data after fetching and aggregation.
struct DayData {
    records: Vec<ActivityRecord>,
    journal: Option<JournalRecord>,
    summary: DaySummary,
}

/// The main entry point for the export.
/// Snapshots the database, then syncs every day in the lookback window.
pub fn execute(config: ExportConfig) -> Result<SyncReport> {
    source::ensure_database_present(&config.db_path)?;
    let snapshot = source::snapshot_database(&config.db_path, config.quiet)?;
    let db = Database::open(snapshot.path())
        .wrap_err_with(|| format!("Cannot read database at {}", config.db_path.display()))?;
    info!(cards = db.card_count()?, "opened database snapshot");

    let store = MarkdownStore::create(&config.target_dir)?;

    let pb = if config.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(config.days as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} days ({msg})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
        );
        bar
    };

    let now = Local::now().fixed_offset();
    let report = run(&config, &db, &store, now, &pb, &mut io::stderr())?;
    pb.finish_and_clear();

    if !config.quiet {
        eprintln!("{}", report);
    }
    Ok(report)
}

/// Sync the lookback window ending at `now`.
///
/// Per-file status lines (verbose and dry-run output) go to `out`.
/// Read failures for a single day are logged and the day is skipped. A failed
/// write aborts the run: it points at the output location, not at one day.
pub fn run<S: DaySource, A: ArtifactStore, W: Write>(
    config: &ExportConfig,
    source: &S,
    store: &A,
    now: Timestamp,
    pb: &ProgressBar,
    out: &mut W,
) -> Result<SyncReport> {
    let days = config.boundary.list_days(config.days, now.naive_local());
    let mut report = SyncReport {
        considered: days.len(),
        ..Default::default()
    };
    pb.set_length(days.len() as u64);

    for day in days {
        pb.set_message(day.to_string());
        let action = sync_day(config, source, store, day, now, pb, out)?;
        match action {
            Some(SyncAction::Create) => report.created += 1,
            Some(SyncAction::Update) => report.updated += 1,
            Some(SyncAction::SkipComplete) => report.skipped_complete += 1,
            Some(SyncAction::SkipEmpty) => report.skipped_empty += 1,
            None => report.failed += 1,
        }
        pb.inc(1);
    }

    Ok(report)
}

/// Returns `None` when the day's data could not be read.
fn sync_day<S: DaySource, A: ArtifactStore, W: Write>(
    config: &ExportConfig,
    source: &S,
    store: &A,
    day: NaiveDate,
    now: Timestamp,
    pb: &ProgressBar,
    out: &mut W,
) -> Result<Option<SyncAction>> {
    let file_name = MarkdownStore::file_name(day);
    let artifact_exists = store.exists(day);

    if decision::skips_complete(&config.boundary, day, now, artifact_exists, config.force) {
        debug!(%day, "day complete and already exported");
        if config.verbose {
            status(pb, out, format_args!("Skipped:  {} (complete)", file_name))?;
        }
        return Ok(Some(SyncAction::SkipComplete));
    }

    let data = match fetch_day(source, day, config.include_deleted) {
        Ok(data) => data,
        Err(e) => {
            pb.suspend(|| error!(%day, "failed to read day, skipping: {:#}", e));
            return Ok(None);
        }
    };
    for w in &data.summary.warnings {
        pb.suspend(|| {
            warn!(%day, card = w.record_id, "ignoring unreadable card metadata: {}", w.message)
        });
    }

    let existing_created_at = if artifact_exists {
        store.read_created_at(day).unwrap_or_else(|e| {
            pb.suspend(|| warn!(%day, "could not read creation time from existing file: {:#}", e));
            None
        })
    } else {
        None
    };

    let Decision { action, created_at } = decision::decide(
        &DecisionInput {
            day,
            now,
            artifact_exists,
            force: config.force,
            has_any_data: data.summary.has_any_data(),
            existing_created_at,
        },
        &config.boundary,
    );

    let Some(created) = created_at else {
        debug!(%day, ?action, "nothing to write");
        if config.verbose {
            status(pb, out, format_args!("Skipped:  {} (no activity)", file_name))?;
        }
        return Ok(Some(action));
    };

    let logical_day = config.boundary.day(day);
    let label = config.boundary.label();
    let doc = DayDocument {
        day: &logical_day,
        day_start_label: &label,
        summary: &data.summary,
        records: &data.records,
        journal: data.journal.as_ref(),
        created,
        updated: now,
        tags: &config.tags,
    };

    let mut content = Vec::new();
    if let Err(e) = write_day_markdown(&mut content, &doc) {
        pb.suspend(|| error!(%day, "failed to render day, skipping: {:#}", e));
        return Ok(None);
    }

    if config.dry_run {
        status(pb, out, format_args!("Would {}: {}", verb(action), file_name))?;
        return Ok(Some(action));
    }

    store
        .write(day, &content)
        .wrap_err_with(|| format!("Failed to write export for {}", day))?;

    debug!(%day, ?action, cards = data.summary.card_count, "wrote day");
    if config.verbose {
        match action {
            SyncAction::Create => status(pb, out, format_args!("Created:  {}", file_name))?,
            _ => status(pb, out, format_args!("Updated:  {}", file_name))?,
        }
    }
    Ok(Some(action))
}

/// Print one line above the progress bar. Unlike `ProgressBar::println` this
/// still prints when the bar is hidden (`--quiet`, or stderr not a terminal).
fn status<W: Write>(pb: &ProgressBar, out: &mut W, line: fmt::Arguments<'_>) -> Result<()> {
    pb.suspend(|| writeln!(out, "{}", line))
        .wrap_err("Failed to write status line")
}

fn verb(action: SyncAction) -> &'static str {
    match action {
        SyncAction::Create => "create",
        SyncAction::Update => "update",
        SyncAction::SkipComplete | SyncAction::SkipEmpty => "skip",
    }
}

fn fetch_day<S: DaySource>(source: &S, day: NaiveDate, include_deleted: bool) -> Result<DayData> {
    let mut records = source.records_for_day(day, include_deleted)?;
    let before = records.len();
    records.retain(|r| !r.is_failed_processing());
    if records.len() != before {
        debug!(%day, dropped = before - records.len(), "dropped failed-processing cards");
    }
    let journal = source.journal_for_day(day)?;
    let summary = DaySummary::build(&records, journal.as_ref());
    Ok(DayData {
        records,
        journal,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::DayBoundary;
    use chrono::{FixedOffset, TimeZone};
    use eyre::eyre;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;

    #[derive(Default)]
    struct FakeSource {
        records: HashMap<NaiveDate, Vec<ActivityRecord>>,
        journals: HashMap<NaiveDate, JournalRecord>,
        broken: HashSet<NaiveDate>,
    }

    impl DaySource for FakeSource {
        fn records_for_day(&self, day: NaiveDate, include_deleted: bool) -> Result<Vec<ActivityRecord>> {
            if self.broken.contains(&day) {
                return Err(eyre!("database is locked"));
            }
            Ok(self
                .records
                .get(&day)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|r| include_deleted || !r.is_deleted)
                .collect())
        }

        fn journal_for_day(&self, day: NaiveDate) -> Result<Option<JournalRecord>> {
            Ok(self.journals.get(&day).cloned())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        files: RefCell<HashMap<NaiveDate, (Option<Timestamp>, Vec<u8>)>>,
        fail_writes: bool,
    }

    impl ArtifactStore for MemoryStore {
        fn exists(&self, day: NaiveDate) -> bool {
            self.files.borrow().contains_key(&day)
        }

        fn read_created_at(&self, day: NaiveDate) -> Result<Option<Timestamp>> {
            Ok(self.files.borrow().get(&day).and_then(|(ts, _)| *ts))
        }

        fn write(&self, day: NaiveDate, content: &[u8]) -> Result<()> {
            if self.fail_writes {
                return Err(eyre!("disk full"));
            }
            let text = String::from_utf8_lossy(content);
            let block = text.trim_start_matches("---\n").split("\n---\n").next().unwrap_or("");
            let meta: crate::utils::ArtifactMeta = serde_yaml::from_str(block)?;
            self.files
                .borrow_mut()
                .insert(day, (Some(meta.created), content.to_vec()));
            Ok(())
        }
    }

    fn config(days: u32, force: bool) -> ExportConfig {
        ExportConfig {
            target_dir: PathBuf::from("unused"),
            db_path: PathBuf::from("unused"),
            days,
            boundary: DayBoundary::default(),
            tags: vec![],
            include_deleted: false,
            force,
            dry_run: false,
            verbose: false,
            quiet: true,
        }
    }

    fn at(d: u32, h: u32) -> Timestamp {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 3, d, h, 0, 0)
            .unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn card(title: &str, category: &str) -> ActivityRecord {
        ActivityRecord {
            start: "9:00 AM".into(),
            end: "9:30 AM".into(),
            start_ts: 0,
            end_ts: 1800,
            title: title.into(),
            category: Some(category.into()),
            ..Default::default()
        }
    }

    fn source_with(days: &[u32]) -> FakeSource {
        let mut source = FakeSource::default();
        for &d in days {
            source.records.insert(date(d), vec![card("Work block", "Work")]);
        }
        source
    }

    #[test]
    fn first_run_creates_and_skips_empty_days() {
        let source = source_with(&[10, 8]);
        let store = MemoryStore::default();
        let report = run(&config(3, false), &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();
        assert_eq!(
            report,
            SyncReport {
                considered: 3,
                created: 2,
                skipped_empty: 1,
                ..Default::default()
            }
        );
        assert!(store.exists(date(10)));
        assert!(!store.exists(date(9)));
    }

    #[test]
    fn rerun_skips_complete_days_and_updates_today() {
        let source = source_with(&[10, 9]);
        let store = MemoryStore::default();
        let cfg = config(2, false);
        run(&cfg, &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();

        let report = run(&cfg, &source, &store, at(10, 18), &ProgressBar::hidden(), &mut io::sink()).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped_complete, 1);
        // Creation time survives the update of the still-open day.
        assert_eq!(store.read_created_at(date(10)).unwrap(), Some(at(10, 12)));
    }

    #[test]
    fn rerun_at_same_instant_is_byte_identical() {
        let source = source_with(&[10]);
        let store = MemoryStore::default();
        let cfg = config(1, false);
        run(&cfg, &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();
        let first = store.files.borrow()[&date(10)].1.clone();
        run(&cfg, &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();
        assert_eq!(store.files.borrow()[&date(10)].1, first);
    }

    #[test]
    fn force_rewrites_with_fresh_creation_time() {
        let source = source_with(&[9]);
        let store = MemoryStore::default();
        run(&config(2, false), &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();

        let report = run(&config(3, true), &source, &store, at(11, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(store.read_created_at(date(9)).unwrap(), Some(at(11, 12)));
    }

    #[test]
    fn unreadable_day_is_isolated() {
        let mut source = source_with(&[10, 9, 8]);
        source.broken.insert(date(9));
        let store = MemoryStore::default();
        let report = run(&config(3, false), &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped(), 1);
        assert!(store.exists(date(8)));
    }

    #[test]
    fn write_failure_aborts_run() {
        let source = source_with(&[10]);
        let store = MemoryStore {
            fail_writes: true,
            ..Default::default()
        };
        assert!(run(&config(1, false), &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).is_err());
    }

    #[test]
    fn failed_processing_cards_do_not_count_as_data() {
        let mut source = FakeSource::default();
        source
            .records
            .insert(date(10), vec![card("Processing failed", "System")]);
        let store = MemoryStore::default();
        let report = run(&config(1, false), &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();
        assert_eq!(report.skipped_empty, 1);
        assert!(!store.exists(date(10)));
    }

    #[test]
    fn journal_alone_produces_a_file() {
        let mut source = FakeSource::default();
        source.journals.insert(
            date(10),
            JournalRecord {
                status: "draft".into(),
                intentions: Some("Rest".into()),
                ..Default::default()
            },
        );
        let store = MemoryStore::default();
        let report = run(&config(1, false), &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();
        assert_eq!(report.created, 1);
    }

    #[test]
    fn dry_run_writes_nothing_but_reports_each_file() {
        let source = source_with(&[10, 9, 8]);
        let store = MemoryStore::default();
        run(&config(2, false), &source, &store, at(10, 12), &ProgressBar::hidden(), &mut io::sink()).unwrap();
        let before = store.files.borrow()[&date(10)].1.clone();

        let mut cfg = config(3, false);
        cfg.dry_run = true;
        let mut out = Vec::new();
        let report = run(&cfg, &source, &store, at(10, 18), &ProgressBar::hidden(), &mut out).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped_complete, 1);
        assert_eq!(report.created, 1);
        assert_eq!(store.files.borrow()[&date(10)].1, before);
        assert!(!store.exists(date(8)));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Would update: timeline-2025-03-10.md\nWould create: timeline-2025-03-08.md\n"
        );
    }

    #[test]
    fn verbose_lines_reach_the_writer_with_a_hidden_bar() {
        let source = source_with(&[10]);
        let store = MemoryStore::default();
        let mut cfg = config(2, false);
        cfg.verbose = true;
        let mut out = Vec::new();
        run(&cfg, &source, &store, at(10, 12), &ProgressBar::hidden(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Created:  timeline-2025-03-10.md\nSkipped:  timeline-2025-03-09.md (no activity)\n"
        );
    }

    #[test]
    fn report_summary_line() {
        let report = SyncReport {
            considered: 7,
            created: 2,
            updated: 1,
            skipped_complete: 3,
            skipped_empty: 0,
            failed: 1,
        };
        assert_eq!(
            report.to_string(),
            "Done. 2 created, 1 updated, 4 skipped (7 days considered). Completed with 1 error(s)."
        );
    }
}
