//! Where day files live on disk.

use crate::decision::Timestamp;
use crate::utils::read_created_timestamp;
use chrono::NaiveDate;
use eyre::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const FILE_PREFIX: &str = "timeline-";
const FILE_EXTENSION: &str = "md";

/// Persistence for per-day artifacts, keyed by logical day.
pub trait ArtifactStore {
    fn exists(&self, day: NaiveDate) -> bool;

    /// Creation timestamp recorded in an existing artifact's metadata block.
    fn read_created_at(&self, day: NaiveDate) -> Result<Option<Timestamp>>;

    /// Replace the artifact for `day` as a whole.
    fn write(&self, day: NaiveDate, content: &[u8]) -> Result<()>;
}

/// One markdown file per day in a flat directory.
pub struct MarkdownStore {
    dir: PathBuf,
}

impl MarkdownStore {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create target directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn file_name(day: NaiveDate) -> String {
        format!("{}{}.{}", FILE_PREFIX, day.format("%Y-%m-%d"), FILE_EXTENSION)
    }

    pub fn path_for(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(Self::file_name(day))
    }
}

impl ArtifactStore for MarkdownStore {
    fn exists(&self, day: NaiveDate) -> bool {
        self.path_for(day).is_file()
    }

    fn read_created_at(&self, day: NaiveDate) -> Result<Option<Timestamp>> {
        read_created_timestamp(&self.path_for(day))
    }

    fn write(&self, day: NaiveDate, content: &[u8]) -> Result<()> {
        let path = self.path_for(day);
        // Write next to the destination so the final rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .wrap_err_with(|| format!("Failed to create temporary file in {}", self.dir.display()))?;
        tmp.write_all(content)
            .wrap_err_with(|| format!("Failed to write: {}", path.display()))?;
        tmp.flush()
            .and_then(|_| tmp.as_file().sync_all())
            .wrap_err_with(|| format!("Failed to flush: {}", path.display()))?;
        tmp.persist(&path)
            .wrap_err_with(|| format!("Failed to replace: {}", path.display()))?;
        Ok(())
    }
}
