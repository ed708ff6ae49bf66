use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::export::Exporter;
use crate::models::ScoredItem;

pub const LEDGER_FILE: &str = "seen_ids.txt";
pub const PAPER_LOG_FILE: &str = "arxiv_papers.csv";
pub const DIGEST_FILE: &str = "weekly_top_picks.md";
pub const RIS_FILE: &str = "weekly_picks.ris";

/// Get the default directory for ledger, paper log and archives
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("weekly-radar"))
        .unwrap_or_else(|| PathBuf::from("arxiv_radar_weekly"))
}

/// Files written by one run, for reporting.
#[derive(Debug, Clone)]
pub struct WrittenOutputs {
    pub digest: PathBuf,
    pub ris: PathBuf,
}

/// Layout of the data directory.
#[derive(Debug, Clone)]
pub struct RadarPaths {
    root: PathBuf,
}

impl RadarPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn paper_log(&self) -> PathBuf {
        self.root.join(PAPER_LOG_FILE)
    }

    pub fn archive_dir(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join("archive")
            .join(date.format("%Y-%m-%d").to_string())
    }

    /// Write the digest and RIS for `date` into its archive folder.
    pub fn save_outputs(&self, digest: &str, ris: &str, date: NaiveDate) -> Result<WrittenOutputs> {
        let dir = self.archive_dir(date);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create archive directory: {}", dir.display()))?;

        let digest_path = dir.join(DIGEST_FILE);
        write_atomic(&digest_path, digest).context("Failed to write digest file")?;

        let ris_path = dir.join(RIS_FILE);
        write_atomic(&ris_path, ris).context("Failed to write RIS file")?;

        tracing::info!(dir = %dir.display(), "Saved digest and RIS");

        Ok(WrittenOutputs {
            digest: digest_path,
            ris: ris_path,
        })
    }

    /// Append every qualifying item of a run to the paper log CSV.
    pub fn append_paper_log(&self, pool: &[ScoredItem]) -> Result<PathBuf> {
        let path = self.paper_log();
        fs::create_dir_all(&self.root).context("Failed to create data directory")?;

        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open paper log: {}", path.display()))?;

        let mut content = String::new();
        if is_new {
            content.push_str(Exporter::PAPER_LOG_HEADER);
            content.push('\n');
        }
        content.push_str(&Exporter::paper_log_rows(pool));

        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to append to paper log: {}", path.display()))?;

        tracing::debug!(rows = pool.len(), path = %path.display(), "Appended paper log");

        Ok(path)
    }
}

/// Replace `path` with `content` through a temp file in the same directory,
/// so readers see either the old file or the new one.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    temp.write_all(content.as_bytes())
        .context("Failed to write temp file")?;
    temp.as_file().sync_all().context("Failed to flush temp file")?;
    temp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}
