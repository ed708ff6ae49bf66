// Public modules
pub mod arxiv;
pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod io;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod quota;
pub mod selector;

// Re-export commonly used types
pub use arxiv::{ArxivClient, SearchQuery};
pub use classifier::{Bucket, BucketMatch, BucketTable, Classifier};
pub use config::RadarConfig;
pub use error::ConfigError;
pub use export::Exporter;
pub use io::{default_data_dir, RadarPaths};
pub use ledger::SeenLedger;
pub use models::{CandidateItem, ScoredItem};
pub use pipeline::{Outcome, RunReport, Screener, Shortlist, Verdict};
pub use quota::allocate;
pub use selector::select;
