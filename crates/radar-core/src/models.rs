use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One paper as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Versionless identifier, e.g. `2401.01234`.
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub published: DateTime<Utc>,
    pub url: String,
    pub summary: String,
}

impl CandidateItem {
    /// Text fed to the classifier: title and abstract on separate lines.
    pub fn classification_text(&self) -> String {
        format!("{}\n{}", self.title, self.summary)
    }
}

/// A candidate that passed classification, with its winning bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: CandidateItem,
    pub bucket: String,
    pub hits: usize,
    pub score: usize,
}

/// Strip an arXiv version suffix (`v2`, `v13`) from an identifier.
///
/// Only a trailing `v` followed by digits is removed, so old-style ids such
/// as `solv-int/9901001v1` keep their archive prefix intact.
pub fn strip_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(pos)
            if pos > 0
                && pos + 1 < id.len()
                && id[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &id[..pos]
        }
        _ => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_version_new_style() {
        assert_eq!(strip_version("2401.01234v3"), "2401.01234");
        assert_eq!(strip_version("2401.01234v12"), "2401.01234");
    }

    #[test]
    fn test_strip_version_without_suffix() {
        assert_eq!(strip_version("2401.01234"), "2401.01234");
    }

    #[test]
    fn test_strip_version_old_style() {
        assert_eq!(strip_version("solv-int/9901001v1"), "solv-int/9901001");
        assert_eq!(strip_version("hep-th/9901001"), "hep-th/9901001");
    }

    #[test]
    fn test_strip_version_bare_v() {
        assert_eq!(strip_version("2401.01234v"), "2401.01234v");
    }
}
