use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::{Bucket, BucketTable, Classifier};
use crate::error::ConfigError;
use crate::export::DEFAULT_ABSTRACT_BUDGET;
use crate::io::default_data_dir;

/// Longest accepted lookback window, in days.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Everything one run needs, built once and passed down.
#[derive(Debug, Clone)]
pub struct RadarConfig {
    pub data_dir: PathBuf,
    pub lookback_days: i64,
    pub total_picks: usize,
    /// One weight per bucket, in bucket order.
    pub ratio: Vec<u32>,
    pub categories: Vec<String>,
    pub max_results: usize,
    pub page_size: usize,
    pub page_delay: Duration,
    pub min_hits: usize,
    pub abstract_budget: usize,
    pub buckets: BucketTable,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lookback_days: 7,
            total_picks: 10,
            ratio: vec![6, 3, 1],
            categories: ["cs.CV", "cs.LG", "cs.RO", "cs.AI"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_results: 300,
            page_size: 100,
            // arXiv asks for no more than one request every three seconds
            page_delay: Duration::from_secs(3),
            min_hits: 2,
            abstract_budget: DEFAULT_ABSTRACT_BUDGET,
            buckets: default_buckets(),
        }
    }
}

impl RadarConfig {
    /// Defaults plus whatever the environment overrides.
    pub fn from_env() -> Self {
        Self::try_load_dotenv();

        let mut config = Self::default();
        if let Ok(dir) = env::var("RADAR_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        config
    }

    /// Replace the bucket table with one read from a JSON file.
    pub fn load_buckets(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bucket file: {}", path.display()))?;
        self.buckets = BucketTable::from_json(&json)
            .with_context(|| format!("Invalid bucket file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buckets.is_empty() {
            return Err(ConfigError::NoBuckets);
        }
        if self.ratio.len() != self.buckets.len() {
            return Err(ConfigError::RatioLength {
                ratio: self.ratio.len(),
                buckets: self.buckets.len(),
            });
        }
        if self.ratio.iter().all(|&r| r == 0) {
            return Err(ConfigError::ZeroRatio);
        }
        if self.categories.iter().all(|c| c.trim().is_empty()) {
            return Err(ConfigError::NoCategories);
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            return Err(self.invalid_lookback());
        }
        Ok(())
    }

    /// Oldest publication time still inside the lookback window.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            return Err(self.invalid_lookback());
        }
        TimeDelta::try_days(self.lookback_days)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| self.invalid_lookback())
    }

    fn invalid_lookback(&self) -> ConfigError {
        ConfigError::InvalidLookback {
            days: self.lookback_days,
            max: MAX_LOOKBACK_DAYS,
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.buckets.clone(), self.min_hits)
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/weekly-radar/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("weekly-radar").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() && dotenvy::from_path(&home_path).is_ok() {
                return;
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

/// Parse a comma-separated ratio such as `6,3,1`.
pub fn parse_ratio(s: &str) -> Result<Vec<u32>> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid ratio component '{}'", part.trim()))
        })
        .collect()
}

/// The shipped three-bucket table, highest priority first.
pub fn default_buckets() -> BucketTable {
    let buckets = vec![
        Bucket::new(
            "P1_world_model_vla_3d",
            [
                "world model",
                "embodied",
                "vla",
                "vision-language-action",
                "visuomotor",
                "policy learning",
                "sim2real",
                "3d reconstruction",
                "multi-view",
                "structure from motion",
                "slam",
                "nerf",
                "gaussian splatting",
                "robot",
                "robotics",
            ],
        ),
        Bucket::new(
            "P2_generative_ai",
            [
                "diffusion",
                "generative model",
                "foundation model",
                "video generation",
                "multimodal",
                "transformer",
            ],
        ),
        Bucket::new(
            "P3_2d_cv",
            [
                "object detection",
                "segmentation",
                "multi-object tracking",
                "mot",
                "reid",
                "association",
                "id switch",
            ],
        ),
    ];

    BucketTable::new(buckets).unwrap_or_else(|e| unreachable!("built-in bucket table: {e}"))
}
