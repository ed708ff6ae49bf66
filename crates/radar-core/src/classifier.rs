use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ConfigError;

/// A named topical bucket and the phrases that vote for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Bucket {
    pub fn new<I, S>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered set of buckets.
///
/// Declaration order is both the selection priority and the tie-break order,
/// which is why this is a `Vec` and never a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTable {
    buckets: Vec<Bucket>,
}

impl BucketTable {
    /// Validate names and normalize keywords (lowercase, single spaces,
    /// duplicates removed with first occurrence kept).
    pub fn new(buckets: Vec<Bucket>) -> Result<Self, ConfigError> {
        if buckets.is_empty() {
            return Err(ConfigError::NoBuckets);
        }

        let mut names = HashSet::new();
        let mut normalized = Vec::with_capacity(buckets.len());

        for (index, bucket) in buckets.into_iter().enumerate() {
            let name = bucket.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::EmptyBucketName { index });
            }
            if !names.insert(name.clone()) {
                return Err(ConfigError::DuplicateBucket { name });
            }

            let mut seen = HashSet::new();
            let keywords = bucket
                .keywords
                .iter()
                .map(|kw| normalize(kw))
                .filter(|kw| !kw.is_empty())
                .filter(|kw| seen.insert(kw.clone()))
                .collect();

            normalized.push(Bucket { name, keywords });
        }

        Ok(Self {
            buckets: normalized,
        })
    }

    /// Parse a JSON array of `{"name": ..., "keywords": [...]}` objects.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let buckets: Vec<Bucket> = serde_json::from_str(json)?;
        Ok(Self::new(buckets)?)
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Winning bucket for one piece of text.
///
/// `hits` and `score` are the same keyword count today. They are kept apart
/// so that selection sorts on `score` while the relevance floor reads `hits`,
/// and weighting keywords later only has to change `score`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketMatch {
    pub bucket: String,
    pub hits: usize,
    pub score: usize,
}

/// Keyword classifier with a relevance floor.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: BucketTable,
    min_hits: usize,
}

impl Classifier {
    pub fn new(table: BucketTable, min_hits: usize) -> Self {
        Self { table, min_hits }
    }

    pub fn table(&self) -> &BucketTable {
        &self.table
    }

    pub fn min_hits(&self) -> usize {
        self.min_hits
    }

    /// Score `text` against every bucket and return the best one.
    ///
    /// A later bucket only wins with a strictly higher score, so ties go to
    /// whichever bucket was declared first. When nothing matches at all the
    /// first bucket is returned with zero hits.
    pub fn classify(&self, text: &str) -> BucketMatch {
        let text = normalize(text);
        let mut best: Option<BucketMatch> = None;

        for bucket in self.table.buckets() {
            let (hits, score) = count_hits(&text, &bucket.keywords);
            let better = match &best {
                Some(current) => score > current.score,
                None => true,
            };
            if better {
                best = Some(BucketMatch {
                    bucket: bucket.name.clone(),
                    hits,
                    score,
                });
            }
        }

        // BucketTable::new rejects empty tables
        best.unwrap_or_else(|| BucketMatch {
            bucket: String::new(),
            hits: 0,
            score: 0,
        })
    }

    /// Whether a match clears the relevance floor. Equal to the floor passes.
    pub fn qualifies(&self, m: &BucketMatch) -> bool {
        m.hits >= self.min_hits
    }
}

/// Collapse whitespace runs, trim, lowercase.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Count keywords that appear as substrings of already-normalized text.
fn count_hits(text: &str, keywords: &[String]) -> (usize, usize) {
    let mut hits = 0;
    let mut score = 0;
    for kw in keywords {
        if text.contains(kw.as_str()) {
            hits += 1;
            score += 1;
        }
    }
    (hits, score)
}
