use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use futures::{Stream, TryStreamExt};
use std::path::PathBuf;

use crate::classifier::Classifier;
use crate::config::RadarConfig;
use crate::export::Exporter;
use crate::io::{RadarPaths, WrittenOutputs};
use crate::ledger::SeenLedger;
use crate::models::{CandidateItem, ScoredItem};
use crate::quota::allocate;
use crate::selector::select;

/// What happened to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Published before the lookback cutoff.
    Stale,
    /// Already in the ledger, or repeated within this run.
    Seen,
    BelowThreshold,
}

/// Counts for the end-of-run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub fetched: usize,
    pub stale: usize,
    pub seen: usize,
    pub below_threshold: usize,
    pub accepted: usize,
}

/// Filters candidates into the scored pool.
///
/// Every accepted id is added to the ledger straight away, which also drops
/// duplicates inside one run. Nothing is written to disk here.
pub struct Screener<'a> {
    classifier: &'a Classifier,
    ledger: &'a mut SeenLedger,
    since: DateTime<Utc>,
    pool: Vec<ScoredItem>,
    report: RunReport,
}

impl<'a> Screener<'a> {
    pub fn new(classifier: &'a Classifier, ledger: &'a mut SeenLedger, since: DateTime<Utc>) -> Self {
        Self {
            classifier,
            ledger,
            since,
            pool: Vec::new(),
            report: RunReport::default(),
        }
    }

    pub fn consider(&mut self, item: CandidateItem) -> Verdict {
        self.report.fetched += 1;

        if item.published < self.since {
            self.report.stale += 1;
            return Verdict::Stale;
        }

        if self.ledger.contains(&item.id) {
            tracing::debug!(id = %item.id, "Skipping already seen paper");
            self.report.seen += 1;
            return Verdict::Seen;
        }

        let m = self.classifier.classify(&item.classification_text());
        if !self.classifier.qualifies(&m) {
            tracing::trace!(id = %item.id, bucket = %m.bucket, hits = m.hits, "Below relevance floor");
            self.report.below_threshold += 1;
            return Verdict::BelowThreshold;
        }

        tracing::debug!(id = %item.id, bucket = %m.bucket, score = m.score, "Accepted paper");
        self.ledger.insert(item.id.clone());
        self.pool.push(ScoredItem {
            item,
            bucket: m.bucket,
            hits: m.hits,
            score: m.score,
        });
        self.report.accepted += 1;
        Verdict::Accepted
    }

    /// Consider items in order, stopping at the first stale one.
    ///
    /// Input is expected newest-first, so everything after a stale item is
    /// stale too.
    pub fn screen_all<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = CandidateItem>,
    {
        for item in items {
            if self.consider(item) == Verdict::Stale {
                break;
            }
        }
    }

    /// Async counterpart of [`Screener::screen_all`]. Errors from the stream
    /// abort the pass.
    pub async fn screen_stream<S>(&mut self, stream: S) -> Result<()>
    where
        S: Stream<Item = Result<CandidateItem>>,
    {
        let mut stream = std::pin::pin!(stream);
        while let Some(item) = stream.try_next().await? {
            if self.consider(item) == Verdict::Stale {
                tracing::debug!("Reached lookback cutoff, stopping fetch");
                break;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> (Vec<ScoredItem>, RunReport) {
        (self.pool, self.report)
    }
}

/// Quota and actual fill for one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketFill {
    pub bucket: String,
    pub quota: usize,
    pub picked: usize,
}

#[derive(Debug, Clone)]
pub struct Shortlist {
    pub picks: Vec<ScoredItem>,
    pub fill: Vec<BucketFill>,
}

/// Allocate quotas and select the shortlist from the pool.
pub fn build_shortlist(pool: Vec<ScoredItem>, config: &RadarConfig) -> Result<Shortlist> {
    config.validate()?;
    let quotas = allocate(config.total_picks, &config.ratio)?;
    let picks = select(pool, &config.buckets, &quotas, config.total_picks);

    let fill = config
        .buckets
        .names()
        .zip(&quotas)
        .map(|(name, &quota)| BucketFill {
            bucket: name.to_string(),
            quota,
            picked: picks.iter().filter(|p| p.bucket == name).count(),
        })
        .collect();

    Ok(Shortlist { picks, fill })
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing qualified; no files were touched.
    NoNewPapers { report: RunReport },
    /// Shortlist built and rendered, nothing written.
    DryRun {
        report: RunReport,
        shortlist: Shortlist,
        digest: String,
    },
    Written {
        report: RunReport,
        shortlist: Shortlist,
        outputs: WrittenOutputs,
        paper_log: PathBuf,
        ledger_size: usize,
    },
}

/// One full pass: screen the candidate stream, pick the shortlist and
/// persist it.
///
/// The digest and RIS are written before the ledger, and the paper log is
/// appended last. A fetch error or a failed output write returns before the
/// ledger is saved, so a rerun sees the same papers again.
pub async fn run<S>(
    config: &RadarConfig,
    paths: &RadarPaths,
    candidates: S,
    today: NaiveDate,
    since: DateTime<Utc>,
    dry_run: bool,
) -> Result<Outcome>
where
    S: Stream<Item = Result<CandidateItem>>,
{
    config.validate().context("Invalid configuration")?;

    let mut ledger = SeenLedger::load(&paths.ledger())?;
    tracing::info!(seen = ledger.len(), "Loaded ledger");

    let classifier = config.classifier();
    let mut screener = Screener::new(&classifier, &mut ledger, since);
    screener
        .screen_stream(candidates)
        .await
        .context("Failed to fetch papers from arXiv")?;
    let (pool, report) = screener.finish();

    if pool.is_empty() {
        return Ok(Outcome::NoNewPapers { report });
    }

    let shortlist = build_shortlist(pool.clone(), config)?;
    let digest = Exporter::generate_digest(&shortlist.picks, today, config.abstract_budget);

    if dry_run {
        return Ok(Outcome::DryRun {
            report,
            shortlist,
            digest,
        });
    }

    let ris = Exporter::generate_ris(&shortlist.picks);
    let outputs = paths
        .save_outputs(&digest, &ris, today)
        .context("Failed to save shortlist")?;

    ledger.save(&paths.ledger())?;

    // After the ledger so a rerun never appends the same rows twice
    let paper_log = paths.append_paper_log(&pool)?;

    Ok(Outcome::Written {
        report,
        shortlist,
        outputs,
        paper_log,
        ledger_size: ledger.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Bucket, BucketTable};
    use chrono::{Duration, TimeZone};
    use futures::stream;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap()
    }

    fn item(id: &str, title: &str, summary: &str, days_ago: i64) -> CandidateItem {
        CandidateItem {
            id: id.to_string(),
            title: title.to_string(),
            authors: vec!["Ada Lovelace".to_string()],
            published: now() - Duration::days(days_ago),
            url: format!("http://arxiv.org/abs/{id}v1"),
            summary: summary.to_string(),
        }
    }

    fn config() -> RadarConfig {
        RadarConfig {
            total_picks: 3,
            ratio: vec![2, 1],
            min_hits: 1,
            buckets: BucketTable::new(vec![
                Bucket::new("robots", ["robot", "slam", "embodied"]),
                Bucket::new("generative", ["diffusion", "transformer"]),
            ])
            .unwrap(),
            ..RadarConfig::default()
        }
    }

    fn candidates() -> Vec<CandidateItem> {
        vec![
            item("2402.00005", "Embodied robot SLAM", "", 1),
            item("2402.00004", "Diffusion transformer", "", 1),
            item("2402.00003", "A robot", "", 2),
            item("2402.00002", "Compilers", "nothing to see", 3),
            item("2402.00001", "Diffusion", "", 4),
            item("2401.99999", "Old robot", "", 10),
            item("2401.99998", "Older robot", "", 11),
        ]
    }

    #[test]
    fn test_screen_filters_and_stops_at_cutoff() {
        let config = config();
        let classifier = config.classifier();
        let mut ledger = SeenLedger::new();
        let since = now() - Duration::days(config.lookback_days);

        let mut screener = Screener::new(&classifier, &mut ledger, since);
        screener.screen_all(candidates());
        let (pool, report) = screener.finish();

        assert_eq!(
            report,
            RunReport {
                fetched: 6,
                stale: 1,
                seen: 0,
                below_threshold: 1,
                accepted: 4,
            }
        );
        assert_eq!(pool.len(), 4);
        assert!(ledger.contains("2402.00005"));
        assert!(!ledger.contains("2402.00002"));
        assert!(!ledger.contains("2401.99999"));
    }

    #[test]
    fn test_seen_item_excluded_even_if_best() {
        let config = config();
        let classifier = config.classifier();
        let mut ledger: SeenLedger = ["2402.00005"].into_iter().collect();
        let since = now() - Duration::days(7);

        let mut screener = Screener::new(&classifier, &mut ledger, since);
        assert_eq!(
            screener.consider(item("2402.00005", "Embodied robot SLAM", "", 1)),
            Verdict::Seen
        );
        let (pool, report) = screener.finish();
        assert!(pool.is_empty());
        assert_eq!(report.seen, 1);
    }

    #[test]
    fn test_duplicate_within_run_counted_once() {
        let config = config();
        let classifier = config.classifier();
        let mut ledger = SeenLedger::new();
        let since = now() - Duration::days(7);

        let mut screener = Screener::new(&classifier, &mut ledger, since);
        assert_eq!(screener.consider(item("x", "robot slam", "", 1)), Verdict::Accepted);
        assert_eq!(screener.consider(item("x", "robot slam", "", 1)), Verdict::Seen);
        assert_eq!(screener.finish().0.len(), 1);
    }

    #[test]
    fn test_cutoff_boundary_is_inclusive() {
        let config = config();
        let classifier = config.classifier();
        let mut ledger = SeenLedger::new();
        let since = now() - Duration::days(7);

        let mut screener = Screener::new(&classifier, &mut ledger, since);
        let mut edge = item("edge", "robot", "", 0);
        edge.published = since;
        assert_eq!(screener.consider(edge), Verdict::Accepted);
    }

    #[tokio::test]
    async fn test_screen_stream_stops_pulling_after_cutoff() {
        let config = config();
        let classifier = config.classifier();
        let mut ledger = SeenLedger::new();
        let since = now() - Duration::days(7);

        // the item after the stale one would fail the run if it were pulled
        let items: Vec<Result<CandidateItem>> = vec![
            Ok(item("a", "robot", "", 1)),
            Ok(item("b", "robot", "", 9)),
            Err(anyhow::anyhow!("should not be reached")),
        ];

        let mut screener = Screener::new(&classifier, &mut ledger, since);
        screener.screen_stream(stream::iter(items)).await.unwrap();
        let (pool, report) = screener.finish();

        assert_eq!(pool.len(), 1);
        assert_eq!(report.stale, 1);
    }

    #[tokio::test]
    async fn test_screen_stream_propagates_fetch_error() {
        let config = config();
        let classifier = config.classifier();
        let mut ledger = SeenLedger::new();
        let since = now() - Duration::days(7);

        let items: Vec<Result<CandidateItem>> = vec![
            Ok(item("a", "robot", "", 1)),
            Err(anyhow::anyhow!("connection reset")),
        ];

        let mut screener = Screener::new(&classifier, &mut ledger, since);
        let result = screener.screen_stream(stream::iter(items)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_build_shortlist_respects_quotas() {
        let config = config();
        let classifier = config.classifier();
        let mut ledger = SeenLedger::new();
        let since = now() - Duration::days(7);

        let mut screener = Screener::new(&classifier, &mut ledger, since);
        screener.screen_all(candidates());
        let (pool, _) = screener.finish();

        let shortlist = build_shortlist(pool, &config).unwrap();
        let ids: Vec<&str> = shortlist.picks.iter().map(|p| p.item.id.as_str()).collect();

        // robots: 00005 (score 3) then 00003; generative: 00004 (score 2)
        assert_eq!(ids, vec!["2402.00005", "2402.00003", "2402.00004"]);
        assert_eq!(
            shortlist.fill,
            vec![
                BucketFill {
                    bucket: "robots".to_string(),
                    quota: 2,
                    picked: 2
                },
                BucketFill {
                    bucket: "generative".to_string(),
                    quota: 1,
                    picked: 1
                },
            ]
        );
    }

    #[test]
    fn test_build_shortlist_rejects_short_ratio() {
        let config = RadarConfig {
            ratio: vec![1],
            ..config()
        };
        let pool = vec![];
        assert!(build_shortlist(pool, &config).is_err());
    }

    // ==================== Run Tests ====================

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 8).unwrap()
    }

    fn ok_stream(items: Vec<CandidateItem>) -> impl Stream<Item = Result<CandidateItem>> {
        stream::iter(items.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn test_run_writes_outputs_and_ledger() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = RadarPaths::new(tmp.path());
        let config = config();
        let since = now() - Duration::days(7);

        let outcome = run(&config, &paths, ok_stream(candidates()), run_date(), since, false)
            .await
            .unwrap();

        let (outputs, paper_log, ledger_size) = match outcome {
            Outcome::Written {
                outputs,
                paper_log,
                ledger_size,
                ..
            } => (outputs, paper_log, ledger_size),
            other => panic!("expected written outcome, got {other:?}"),
        };

        let digest = std::fs::read_to_string(&outputs.digest).unwrap();
        assert!(digest.starts_with("# Weekly Radar 2026-02-08\n"));
        assert!(digest.contains("[2402.00005]"));
        assert!(std::fs::read_to_string(&outputs.ris).unwrap().contains("TY  - JOUR"));

        // whole pool goes into the ledger, not only the picks
        assert_eq!(ledger_size, 4);
        assert_eq!(
            std::fs::read_to_string(paths.ledger()).unwrap(),
            "2402.00001\n2402.00003\n2402.00004\n2402.00005"
        );
        assert_eq!(std::fs::read_to_string(paper_log).unwrap().lines().count(), 5);
    }

    #[tokio::test]
    async fn test_run_twice_skips_seen_papers() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = RadarPaths::new(tmp.path());
        let config = config();
        let since = now() - Duration::days(7);

        run(&config, &paths, ok_stream(candidates()), run_date(), since, false)
            .await
            .unwrap();
        let second = run(&config, &paths, ok_stream(candidates()), run_date(), since, false)
            .await
            .unwrap();

        match second {
            Outcome::NoNewPapers { report } => assert_eq!(report.seen, 4),
            other => panic!("expected no new papers, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_fetch_error_leaves_ledger_untouched() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = RadarPaths::new(tmp.path());
        let before: SeenLedger = ["2401.00001"].into_iter().collect();
        before.save(&paths.ledger()).unwrap();

        let items: Vec<Result<CandidateItem>> = vec![
            Ok(item("2402.00005", "Embodied robot SLAM", "", 1)),
            Err(anyhow::anyhow!("connection reset")),
        ];
        let since = now() - Duration::days(7);

        let result = run(&config(), &paths, stream::iter(items), run_date(), since, false).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(paths.ledger()).unwrap(), "2401.00001");
        assert!(!paths.root().join("archive").exists());
        assert!(!paths.paper_log().exists());
    }

    #[tokio::test]
    async fn test_run_without_qualifying_papers_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = RadarPaths::new(tmp.path());
        let items = vec![
            item("2402.00002", "Compilers", "nothing to see", 1),
            item("2402.00006", "Type theory", "", 2),
        ];
        let since = now() - Duration::days(7);

        let outcome = run(&config(), &paths, ok_stream(items), run_date(), since, false)
            .await
            .unwrap();

        match outcome {
            Outcome::NoNewPapers { report } => assert_eq!(report.below_threshold, 2),
            other => panic!("expected no new papers, got {other:?}"),
        }
        assert!(!paths.root().join("archive").exists());
        assert!(!paths.ledger().exists());
        assert!(!paths.paper_log().exists());
    }

    #[tokio::test]
    async fn test_run_output_failure_leaves_ledger_untouched() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = RadarPaths::new(tmp.path());
        // a file where the archive directory should go
        std::fs::write(tmp.path().join("archive"), "").unwrap();
        let since = now() - Duration::days(7);

        let result = run(&config(), &paths, ok_stream(candidates()), run_date(), since, false).await;

        assert!(result.is_err());
        assert!(!paths.ledger().exists());
        assert!(!paths.paper_log().exists());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = RadarPaths::new(tmp.path());
        let since = now() - Duration::days(7);

        let outcome = run(&config(), &paths, ok_stream(candidates()), run_date(), since, true)
            .await
            .unwrap();

        match outcome {
            Outcome::DryRun { shortlist, digest, .. } => {
                assert_eq!(shortlist.picks.len(), 3);
                assert!(digest.contains("[2402.00004]"));
            }
            other => panic!("expected dry run, got {other:?}"),
        }
        assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_identical_runs_give_identical_outputs() {
        let config = config();
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();

        let run = || {
            let classifier = config.classifier();
            let mut ledger: SeenLedger = ["2402.00003"].into_iter().collect();
            let since = now() - Duration::days(7);
            let mut screener = Screener::new(&classifier, &mut ledger, since);
            screener.screen_all(candidates());
            let (pool, _) = screener.finish();
            let shortlist = build_shortlist(pool, &config).unwrap();
            (
                Exporter::generate_digest(&shortlist.picks, date, config.abstract_budget),
                Exporter::generate_ris(&shortlist.picks),
            )
        };

        assert_eq!(run(), run());
    }
}
