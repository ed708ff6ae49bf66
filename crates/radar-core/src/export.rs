use chrono::{NaiveDate, SecondsFormat};

use crate::models::ScoredItem;

/// Default number of abstract characters shown in the digest.
pub const DEFAULT_ABSTRACT_BUDGET: usize = 300;

pub struct Exporter;

impl Exporter {
    pub const PAPER_LOG_HEADER: &'static str =
        "pid,title,authors,published,url,bucket,score,abstract";

    /// Markdown digest: a dated heading, then one list item per pick.
    ///
    /// The abstract is cut to `budget` characters and always followed by
    /// `...`, even when it was short enough to keep whole.
    pub fn generate_digest(items: &[ScoredItem], date: NaiveDate, budget: usize) -> String {
        let mut blocks = Vec::with_capacity(items.len() + 1);
        blocks.push(format!("# Weekly Radar {}\n", date.format("%Y-%m-%d")));

        for scored in items {
            let item = &scored.item;
            blocks.push(format!(
                "- **[{}]({})**  \n  {}  \n  *{}*  \n  _{}..._\n",
                item.id,
                item.url,
                item.title,
                item.authors.join(", "),
                Self::truncate_chars(&item.summary, budget)
            ));
        }

        blocks.join("\n")
    }

    /// RIS records, one `TY`..`ER` block per pick with a blank line between.
    pub fn generate_ris(items: &[ScoredItem]) -> String {
        let mut lines = Vec::new();

        for scored in items {
            let item = &scored.item;
            lines.push("TY  - JOUR".to_string());
            lines.push(format!("TI  - {}", item.title));
            for author in item.authors.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
                lines.push(format!("AU  - {}", author));
            }
            lines.push(format!("UR  - {}", item.url));
            lines.push("ER  - ".to_string());
            lines.push(String::new());
        }

        lines.join("\n")
    }

    /// Paper log rows (no header), one line per item.
    pub fn paper_log_rows(items: &[ScoredItem]) -> String {
        let mut csv = String::new();

        for scored in items {
            let item = &scored.item;
            let fields = [
                Self::escape_csv(&item.id),
                Self::escape_csv(&item.title),
                Self::escape_csv(&item.authors.join(", ")),
                item.published.to_rfc3339_opts(SecondsFormat::Secs, false),
                Self::escape_csv(&item.url),
                Self::escape_csv(&scored.bucket),
                scored.score.to_string(),
                Self::escape_csv(&item.summary),
            ];
            csv.push_str(&fields.join(","));
            csv.push('\n');
        }

        csv
    }

    fn truncate_chars(text: &str, budget: usize) -> &str {
        match text.char_indices().nth(budget) {
            Some((end, _)) => &text[..end],
            None => text,
        }
    }

    fn escape_csv(text: &str) -> String {
        // If the text contains comma, quote, or newline, wrap in quotes and escape quotes
        if text.contains(',') || text.contains('"') || text.contains('\n') {
            format!("\"{}\"", text.replace('"', "\"\""))
        } else {
            text.to_string()
        }
    }
}
