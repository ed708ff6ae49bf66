use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use crate::models::{strip_version, CandidateItem};

const ARXIV_API_BASE: &str = "http://export.arxiv.org/api/query";

/// A category query sorted by submission date, newest first.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub categories: Vec<String>,
    pub max_results: usize,
    pub page_size: usize,
    pub page_delay: Duration,
}

impl SearchQuery {
    /// `(cat:cs.CV OR cat:cs.LG ...)`
    pub fn search_expression(&self) -> String {
        let cats: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| format!("cat:{}", c))
            .collect();
        format!("({})", cats.join(" OR "))
    }

    pub fn page_url(&self, start: usize, count: usize) -> String {
        format!(
            "{}?search_query={}&start={}&max_results={}&sortBy=submittedDate&sortOrder=descending",
            ARXIV_API_BASE,
            urlencoding::encode(&self.search_expression()),
            start,
            count
        )
    }
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

pub struct ArxivClient {
    client: Client,
}

impl ArxivClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("weekly-radar/0.1 (arXiv paper digest)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Lazily page through the query results.
    ///
    /// A page is only requested once the consumer has drained the previous
    /// one, so dropping the stream early skips the remaining requests.
    pub fn candidates<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> impl Stream<Item = Result<CandidateItem>> + 'a {
        paginate(
            query.max_results,
            query.page_size,
            query.page_delay,
            move |start, count| self.fetch_page(query, start, count),
        )
    }

    async fn fetch_page(
        &self,
        query: &SearchQuery,
        start: usize,
        count: usize,
    ) -> Result<Vec<CandidateItem>> {
        let url = query.page_url(start, count);
        tracing::debug!(%url, "Fetching arXiv page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch results from arXiv")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("arXiv API returned error: {} - {}", status, error_text);
        }

        let body = response
            .text()
            .await
            .context("Failed to read arXiv response")?;

        let items = parse_feed(&body)?;
        tracing::debug!(start, count = items.len(), "Parsed arXiv page");
        Ok(items)
    }
}

/// Drive `fetch_page(start, count)` until `max_results` items have been
/// requested or a page comes back short.
pub fn paginate<F, Fut>(
    max_results: usize,
    page_size: usize,
    page_delay: Duration,
    fetch_page: F,
) -> impl Stream<Item = Result<CandidateItem>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<CandidateItem>>>,
{
    let page_size = page_size.max(1);

    stream::try_unfold(
        (0usize, false, fetch_page),
        move |(start, exhausted, mut fetch_page)| async move {
            if exhausted || start >= max_results {
                return Ok::<_, anyhow::Error>(None);
            }
            if start > 0 && !page_delay.is_zero() {
                tokio::time::sleep(page_delay).await;
            }

            let count = page_size.min(max_results - start);
            let page = fetch_page(start, count).await?;
            let exhausted = page.len() < count;

            Ok(Some((page, (start + count, exhausted, fetch_page))))
        },
    )
    .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, anyhow::Error>)))
    .try_flatten()
}

/// Parse one Atom response body into candidates.
pub fn parse_feed(xml: &str) -> Result<Vec<CandidateItem>> {
    let feed: Feed = from_str(xml).context("Failed to parse arXiv Atom feed")?;

    feed.entries.into_iter().map(parse_entry).collect()
}

fn parse_entry(entry: Entry) -> Result<CandidateItem> {
    let entry_url = entry.id.trim().to_string();

    // arXiv reports query problems as a single entry under /api/errors
    if entry_url.contains("/api/errors") {
        anyhow::bail!("arXiv API error: {}", normalize_whitespace(&entry.summary));
    }

    let raw_id = match entry_url.rfind("/abs/") {
        Some(pos) => &entry_url[pos + 5..],
        None => entry_url.as_str(),
    };
    if raw_id.is_empty() {
        anyhow::bail!("arXiv entry has an empty id: {}", entry_url);
    }
    let id = strip_version(raw_id).to_string();

    let published_raw = entry
        .published
        .with_context(|| format!("arXiv entry {} has no published date", id))?;
    let published = DateTime::parse_from_rfc3339(published_raw.trim())
        .with_context(|| format!("Invalid published date for {}: {}", id, published_raw))?
        .with_timezone(&Utc);

    let authors = entry
        .authors
        .into_iter()
        .map(|a| normalize_whitespace(&a.name))
        .filter(|name| !name.is_empty())
        .collect();

    Ok(CandidateItem {
        id,
        title: normalize_whitespace(&entry.title),
        authors,
        published,
        url: entry_url,
        summary: normalize_whitespace(&entry.summary),
    })
}

/// Atom text is hard-wrapped; fold every whitespace run into one space.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
