use crate::models::{DateRangeConfig, TimeRange};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Symbols used as market proxies by the fear-greed score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentSymbols {
    pub benchmark: String,
    pub volatility: String,
    pub bonds: String,
    pub high_yield: String,
    pub treasuries: String,
}

impl Default for SentimentSymbols {
    fn default() -> Self {
        Self {
            benchmark: "SPY".to_string(),
            volatility: "^VIX".to_string(),
            bonds: "TLT".to_string(),
            high_yield: "HYG".to_string(),
            treasuries: "IEF".to_string(),
        }
    }
}

/// Settings shared by every analysis job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub benchmark: String,
    pub lookback_days: usize,
    pub recent_window: usize,
    pub rolling_window: usize,
    pub vol_window: usize,
    pub z_threshold: f64,
    pub correlation_drop_threshold: f64,
    pub range: TimeRange,
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub output_dir: PathBuf,
    pub rate_limit_per_minute: u32,
    pub sentiment: SentimentSymbols,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            benchmark: "SPY".to_string(),
            lookback_days: 252,
            recent_window: 20,
            rolling_window: 60,
            vol_window: 20,
            z_threshold: 2.0,
            correlation_drop_threshold: 0.3,
            range: TimeRange::TwoYears,
            cache_dir: env::temp_dir().join("stockcorr_cache"),
            cache_ttl_secs: 3600,
            output_dir: PathBuf::from("reports"),
            rate_limit_per_minute: 60,
            sentiment: SentimentSymbols::default(),
        }
    }
}

impl AnalysisSettings {
    /// Defaults overridden by environment variables (a `.env` file is honoured)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut settings = Self::default();
        settings.apply_env();
        settings
    }

    /// Apply `STOCKCORR_*` environment overrides in place
    pub fn apply_env(&mut self) {
        if let Ok(benchmark) = env::var("STOCKCORR_BENCHMARK") {
            if !benchmark.trim().is_empty() {
                self.benchmark = benchmark.trim().to_uppercase();
            }
        }

        if let Some(days) = env::var("STOCKCORR_LOOKBACK_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.lookback_days = days;
        }

        if let Ok(dir) = env::var("STOCKCORR_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = env::var("STOCKCORR_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }

        if let Some(limit) = env::var("STOCKCORR_RATE_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.rate_limit_per_minute = limit;
        }
    }

    pub fn date_range(&self) -> DateRangeConfig {
        DateRangeConfig::new(self.range)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
