use thiserror::Error;

/// Problems with a run configuration or bucket table, caught before any
/// network traffic happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("bucket table is empty")]
    NoBuckets,

    #[error("bucket #{index} has an empty name")]
    EmptyBucketName { index: usize },

    #[error("bucket '{name}' is declared more than once")]
    DuplicateBucket { name: String },

    #[error("ratio has {ratio} components but there are {buckets} buckets")]
    RatioLength { ratio: usize, buckets: usize },

    #[error("ratio components must not all be zero")]
    ZeroRatio,

    #[error("at least one arXiv category is required")]
    NoCategories,

    #[error("page size must be greater than zero")]
    ZeroPageSize,

    #[error("lookback must be between 1 and {max} days, got {days}")]
    InvalidLookback { days: i64, max: i64 },
}
