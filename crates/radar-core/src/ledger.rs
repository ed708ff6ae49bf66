use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::io::write_atomic;

/// Identifiers already handled by earlier runs.
///
/// Kept sorted so the file on disk diffs cleanly between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenLedger {
    ids: BTreeSet<String>,
}

impl SeenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the ledger file. A missing file is a first run, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No ledger yet, starting empty");
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read ledger: {}", path.display()))
            }
        };

        let ids = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        Ok(Self { ids })
    }

    /// Write every id, sorted, one per line.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.ids.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
        write_atomic(path, &content)
            .with_context(|| format!("Failed to save ledger: {}", path.display()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an id in memory. Returns false if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SeenLedger {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
