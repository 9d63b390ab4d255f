use clap::Parser;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use timeline_export::{DayBoundary, ExportConfig, day::DEFAULT_BOUNDARY_HOUR};
use tracing_subscriber::EnvFilter;

const DEFAULT_DAYS: u32 = 7;
const MAX_DAYS: u32 = 365;

/// Export your activity timeline and journal to one Markdown file per day.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to export markdown files.
    /// Defaults to ./timeline-export if not set in config.
    #[arg(value_name = "TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// Path to the tracker's SQLite database.
    /// Auto-detected if omitted.
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/timeline-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of days to export, counting back from today (1-365).
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=365))]
    days: Option<u32>,

    /// Hour at which a new day starts (0-23). Activity before it counts toward the previous day.
    #[arg(long, value_name = "HOUR", value_parser = clap::value_parser!(u32).range(0..=23))]
    day_start_hour: Option<u32>,

    /// Comma-separated tags to add to frontmatter (e.g. "timeline,daily").
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    tags: Option<Vec<String>>,

    /// Include cards that were deleted in the tracker.
    #[arg(long)]
    include_deleted: bool,

    /// Regenerate every file in range, even finished days, with fresh timestamps.
    #[arg(short, long)]
    force: bool,

    /// Show what would be written without touching any file.
    #[arg(long)]
    dry_run: bool,

    /// Print each file written or skipped.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress standard output (progress bars).
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    target_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    days: Option<u32>,
    day_start_hour: Option<u32>,
    tags: Option<Vec<String>>,
    include_deleted: Option<bool>,
}

fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("Dayflow/chunks.sqlite"))
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        // Search: XDG/OS config dir, then nothing
        dirs::config_dir()
            .map(|d| d.join("timeline-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "timeline_export=error"
    } else if verbose {
        "timeline_export=debug"
    } else {
        "timeline_export=warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Resolve target_dir (CLI > Config > Default)
    let target_dir = cli
        .target_dir
        .or(file_cfg.target_dir)
        .unwrap_or_else(|| PathBuf::from("timeline-export"));

    // 3. Resolve db_path (CLI > Config > Auto-detect)
    let db_path = cli
        .db
        .or(file_cfg.db_path)
        .or_else(default_db_path)
        .ok_or_else(|| {
            eyre!("Could not determine database path.\nUse --db to specify manually, or set db_path in config.toml.")
        })?;

    // 4. Resolve the day window (CLI > Config > Default); clap bounds CLI values, config values are checked here
    let days = cli.days.or(file_cfg.days).unwrap_or(DEFAULT_DAYS);
    if !(1..=MAX_DAYS).contains(&days) {
        return Err(eyre!("days must be between 1 and {}, got {}", MAX_DAYS, days));
    }
    let boundary = DayBoundary::new(
        cli.day_start_hour
            .or(file_cfg.day_start_hour)
            .unwrap_or(DEFAULT_BOUNDARY_HOUR),
    )?;

    // 5. Resolve tags (CLI > Config)
    let tags = cli
        .tags
        .or(file_cfg.tags)
        .unwrap_or_else(|| vec!["timeline".to_string()]);

    // 6. Build the Export Config
    let config = ExportConfig {
        target_dir,
        db_path,
        days,
        boundary,
        tags,
        include_deleted: cli.include_deleted || file_cfg.include_deleted.unwrap_or(false),
        force: cli.force,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    // 7. Run the Business Logic
    timeline_export::execute(config)?;
    Ok(())
}
