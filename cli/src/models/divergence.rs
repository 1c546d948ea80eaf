use crate::models::AnalysisSettings;
use serde::{Deserialize, Serialize};

/// Direction of a ticker's move relative to its beta-implied return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceSignal {
    Outperforming,
    Underperforming,
    InLine,
}

impl DivergenceSignal {
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            DivergenceSignal::Outperforming
        } else if score <= -threshold {
            DivergenceSignal::Underperforming
        } else {
            DivergenceSignal::InLine
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DivergenceSignal::Outperforming => "Outperforming",
            DivergenceSignal::Underperforming => "Underperforming",
            DivergenceSignal::InLine => "In line",
        }
    }
}

/// Parameters of a divergence scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceConfig {
    pub lookback_days: usize,
    pub recent_window: usize,
    pub rolling_window: usize,
    pub z_threshold: f64,
    pub correlation_drop_threshold: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self::from(&AnalysisSettings::default())
    }
}

impl From<&AnalysisSettings> for DivergenceConfig {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            lookback_days: settings.lookback_days,
            recent_window: settings.recent_window,
            rolling_window: settings.rolling_window,
            z_threshold: settings.z_threshold,
            correlation_drop_threshold: settings.correlation_drop_threshold,
        }
    }
}

/// Cumulative log returns on one day of the recent window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergencePoint {
    pub date: String,
    pub actual: f64,
    pub expected: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceReport {
    pub ticker: String,
    pub benchmark: String,
    pub as_of: String,
    pub observations: usize,
    // Estimation window
    pub beta: f64,
    pub alpha: f64,
    pub correlation: f64,
    pub residual_std: f64,
    // Recent window
    pub actual_return: f64,
    pub expected_return: f64,
    pub divergence: f64,
    pub divergence_score: f64,
    pub recent_correlation: Option<f64>,
    pub correlation_change: Option<f64>,
    pub signal: DivergenceSignal,
    pub correlation_breakdown: bool,
    // Chart inputs
    pub path: Vec<DivergencePoint>,
    pub rolling_correlation: Vec<(String, f64)>,
}

impl DivergenceReport {
    pub fn is_flagged(&self) -> bool {
        self.signal != DivergenceSignal::InLine || self.correlation_breakdown
    }
}

/// Flat row written to CSV exports
#[derive(Debug, Clone, Serialize)]
pub struct DivergenceCsvRow {
    pub ticker: String,
    pub benchmark: String,
    pub as_of: String,
    pub beta: f64,
    pub correlation: f64,
    pub recent_correlation: Option<f64>,
    pub actual_return: f64,
    pub expected_return: f64,
    pub divergence: f64,
    pub divergence_score: f64,
    pub signal: String,
    pub correlation_breakdown: bool,
}

impl From<&DivergenceReport> for DivergenceCsvRow {
    fn from(report: &DivergenceReport) -> Self {
        Self {
            ticker: report.ticker.clone(),
            benchmark: report.benchmark.clone(),
            as_of: report.as_of.clone(),
            beta: report.beta,
            correlation: report.correlation,
            recent_correlation: report.recent_correlation,
            actual_return: report.actual_return,
            expected_return: report.expected_return,
            divergence: report.divergence,
            divergence_score: report.divergence_score,
            signal: report.signal.as_str().to_string(),
            correlation_breakdown: report.correlation_breakdown,
        }
    }
}
