use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use radar_core::config::parse_ratio;
use radar_core::pipeline::{self, Outcome, RunReport, Shortlist};
use radar_core::{ArxivClient, RadarConfig, RadarPaths, SearchQuery, SeenLedger};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "weekly-radar")]
#[command(about = "Pick this week's most relevant arXiv papers and archive them as Markdown and RIS")]
struct Args {
    /// Number of days to look back for new papers
    #[arg(short, long)]
    days: Option<i64>,

    /// Size of the shortlist
    #[arg(short, long)]
    picks: Option<usize>,

    /// Relative bucket quotas, one per bucket (e.g. 6,3,1)
    #[arg(short, long)]
    ratio: Option<String>,

    /// arXiv categories to query (comma-separated, e.g. cs.CV,cs.RO)
    #[arg(short, long, value_delimiter = ',')]
    categories: Option<Vec<String>>,

    /// Maximum number of papers to fetch
    #[arg(long)]
    max_results: Option<usize>,

    /// Minimum keyword hits for a paper to be considered
    #[arg(long)]
    min_hits: Option<usize>,

    /// JSON file with an ordered bucket table to use instead of the built-in one
    #[arg(long)]
    buckets: Option<PathBuf>,

    /// Directory holding the ledger, paper log and archives
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print the shortlist without writing any files
    #[arg(long)]
    dry_run: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Apply the flags on top of `base` and validate the result.
    fn into_config(self, base: RadarConfig) -> Result<(RadarConfig, bool)> {
        let mut config = base;

        if let Some(days) = self.days {
            config.lookback_days = days;
        }
        if let Some(picks) = self.picks {
            config.total_picks = picks;
        }
        if let Some(buckets) = &self.buckets {
            config.load_buckets(buckets)?;
        }
        if let Some(ratio) = &self.ratio {
            config.ratio = parse_ratio(ratio)?;
        }
        if let Some(categories) = self.categories {
            config.categories = categories;
        }
        if let Some(max_results) = self.max_results {
            config.max_results = max_results;
        }
        if let Some(min_hits) = self.min_hits {
            config.min_hits = min_hits;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }

        config.validate().context("Invalid configuration")?;
        Ok((config, self.dry_run))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (config, dry_run) = args.into_config(RadarConfig::from_env())?;
    tracing::debug!(?config, dry_run, "Configuration resolved");

    let paths = RadarPaths::new(&config.data_dir);
    let today = Local::now().date_naive();
    let since = config.cutoff(Utc::now()).context("Invalid configuration")?;

    let seen = SeenLedger::load(&paths.ledger())?.len();
    println!("📒 Ledger has {} previously seen papers", seen);

    let query = SearchQuery {
        categories: config.categories.clone(),
        max_results: config.max_results,
        page_size: config.page_size,
        page_delay: config.page_delay,
    };

    println!("\n📚 Fetching papers from arXiv: {}", query.search_expression());
    let client = ArxivClient::new()?;

    let outcome = pipeline::run(
        &config,
        &paths,
        client.candidates(&query),
        today,
        since,
        dry_run,
    )
    .await?;

    match outcome {
        Outcome::NoNewPapers { report } => {
            print_report(&report, &config);
            println!("\nNo new papers.");
        }
        Outcome::DryRun {
            report,
            shortlist,
            digest,
        } => {
            print_report(&report, &config);
            print_fill(&shortlist);
            println!("\n--- dry run, nothing written ---\n");
            println!("{}", digest);
        }
        Outcome::Written {
            report,
            shortlist,
            outputs,
            paper_log,
            ledger_size,
        } => {
            print_report(&report, &config);
            print_fill(&shortlist);
            println!("\n✅ Done.");
            println!("  Digest:    {}", outputs.digest.display());
            println!("  RIS:       {}", outputs.ris.display());
            println!("  Paper log: {}", paper_log.display());
            println!("  Ledger:    {} papers", ledger_size);
        }
    }

    Ok(())
}

fn print_report(report: &RunReport, config: &RadarConfig) {
    println!(
        "✓ Looked at {} papers: {} too old, {} already seen, {} below {} hits, {} qualified",
        report.fetched,
        report.stale,
        report.seen,
        report.below_threshold,
        config.min_hits,
        report.accepted
    );
}

fn print_fill(shortlist: &Shortlist) {
    println!("\n🗂  Shortlist by bucket:");
    for fill in &shortlist.fill {
        println!("  {}: {}/{}", fill.bucket, fill.picked, fill.quota);
    }
}
