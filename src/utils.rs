use crate::day::DayBoundary;
use crate::decision::Timestamp;
use eyre::{Context, Result, eyre};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub target_dir: PathBuf,
    pub db_path: PathBuf,
    /// Number of logical days to look back, including the current one.
    pub days: u32,
    pub boundary: DayBoundary,
    pub tags: Vec<String>,
    pub include_deleted: bool,
    pub force: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub quiet: bool,
}

/// Metadata block written at the top of every day file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub date: String,
    pub day_start: String,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub cards: usize,
    pub total_minutes: i64,
    #[serde(default)]
    pub categories: Vec<String>,
    pub has_journal: bool,
    #[serde(default)]
    pub journal_status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Deserialize the YAML frontmatter at the top of a markdown file.
///
/// Reading stops at the closing `---`; the body is never read. Returns
/// `Ok(None)` when the file has no frontmatter at all.
pub fn read_frontmatter<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file =
        File::open(path).wrap_err_with(|| format!("Failed to open: {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let Some(first) = lines.next() else {
        return Ok(None);
    };
    let first = first.wrap_err_with(|| format!("Failed to read: {}", path.display()))?;
    if first.trim() != "---" {
        return Ok(None);
    }

    let mut block = String::new();
    let mut closed = false;
    for line in lines {
        let line = line.wrap_err_with(|| format!("Failed to read: {}", path.display()))?;
        if line.trim() == "---" {
            closed = true;
            break;
        }
        block.push_str(&line);
        block.push('\n');
    }
    if !closed {
        return Err(eyre!("Unterminated frontmatter in {}", path.display()));
    }

    serde_yaml::from_str(&block)
        .map(Some)
        .wrap_err_with(|| format!("Failed to parse frontmatter: {}", path.display()))
}

/// Cheaply extract the `created` timestamp without deserializing the whole block.
pub fn read_created_timestamp(path: &Path) -> Result<Option<Timestamp>> {
    #[derive(Deserialize)]
    struct Minimal {
        created: Option<Timestamp>,
    }
    Ok(read_frontmatter::<Minimal>(path)?.and_then(|m| m.created))
}
