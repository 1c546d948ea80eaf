//! Builder pattern for configuring stock analysis operations

use crate::api::analyzer::StockAnalyzer;
use crate::models::{AnalysisSettings, TimeRange};
use crate::services::MarketDataProvider;
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for configuring stock analysis operations
///
/// Starts from the environment-aware defaults and lets callers override
/// individual settings.
///
/// # Example
/// ```rust,no_run
/// use stockcorr::api::AnalysisBuilder;
///
/// let analyzer = AnalysisBuilder::new()
///     .with_benchmark("QQQ")
///     .with_lookback_days(126)
///     .build()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct AnalysisBuilder {
    settings: AnalysisSettings,
}

impl AnalysisBuilder {
    /// Builder over [`AnalysisSettings::from_env`]
    pub fn new() -> Self {
        Self::with_settings(AnalysisSettings::from_env())
    }

    pub fn with_settings(settings: AnalysisSettings) -> Self {
        Self { settings }
    }

    pub fn with_benchmark(mut self, benchmark: impl Into<String>) -> Self {
        self.settings.benchmark = benchmark.into().trim().to_uppercase();
        self
    }

    /// Trading days in the estimation window
    pub fn with_lookback_days(mut self, days: usize) -> Self {
        self.settings.lookback_days = days;
        self
    }

    /// Trading days compared against the expected path
    pub fn with_recent_window(mut self, days: usize) -> Self {
        self.settings.recent_window = days;
        self
    }

    pub fn with_rolling_window(mut self, days: usize) -> Self {
        self.settings.rolling_window = days;
        self
    }

    pub fn with_z_threshold(mut self, threshold: f64) -> Self {
        self.settings.z_threshold = threshold;
        self
    }

    /// History requested from the provider
    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.settings.range = range;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.output_dir = dir.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.cache_dir = dir.into();
        self
    }

    pub fn with_rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.settings.rate_limit_per_minute = requests_per_minute;
        self
    }

    /// The settings as configured so far
    pub fn build_settings(self) -> AnalysisSettings {
        self.settings
    }

    /// Build a StockAnalyzer backed by Yahoo Finance and the history cache
    pub fn build(self) -> anyhow::Result<StockAnalyzer> {
        StockAnalyzer::new(self.settings)
    }

    /// Build a StockAnalyzer over a caller-supplied provider
    pub fn build_with_provider(self, provider: Arc<dyn MarketDataProvider>) -> StockAnalyzer {
        StockAnalyzer::with_provider(self.settings, provider)
    }
}

impl Default for AnalysisBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Quick builder functions for common configurations
impl AnalysisBuilder {
    /// Quarter-long estimation window, two-week divergence window
    pub fn short_term(self) -> Self {
        self.with_range(TimeRange::OneYear)
            .with_lookback_days(63)
            .with_recent_window(10)
            .with_rolling_window(20)
    }

    /// Half-year estimation window
    pub fn medium_term(self) -> Self {
        self.with_range(TimeRange::TwoYears)
            .with_lookback_days(126)
            .with_recent_window(20)
            .with_rolling_window(40)
    }

    /// Two-year estimation window, two-month divergence window
    pub fn long_term(self) -> Self {
        self.with_range(TimeRange::FiveYears)
            .with_lookback_days(504)
            .with_recent_window(40)
            .with_rolling_window(120)
    }
}
