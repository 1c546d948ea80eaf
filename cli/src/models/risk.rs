use crate::models::AnalysisSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn classify(beta: f64, annualized_volatility: f64) -> Self {
        if beta >= 1.3 || annualized_volatility >= 0.45 {
            RiskLevel::High
        } else if beta < 0.8 && annualized_volatility < 0.25 {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub lookback_days: usize,
    pub vol_window: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self::from(&AnalysisSettings::default())
    }
}

impl From<&AnalysisSettings> for RiskConfig {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            lookback_days: settings.lookback_days,
            vol_window: settings.vol_window,
        }
    }
}

/// One ticker's row of the risk matrix, measured against the benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMatrixRow {
    pub ticker: String,
    pub benchmark: String,
    pub observations: usize,
    pub correlation: f64,
    pub beta: f64,
    pub alpha: f64,
    pub annualized_volatility: f64,
    pub tracking_error: f64,
    pub expected_return: f64,
    pub actual_return: f64,
    pub excess_return: f64,
    pub up_market_correlation: Option<f64>,
    pub down_market_correlation: Option<f64>,
    pub downside_beta: Option<f64>,
    pub high_vol_correlation: Option<f64>,
    pub low_vol_correlation: Option<f64>,
    pub risk_level: RiskLevel,
}

/// Pairwise correlation of log returns, row-major `[n, n]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub tickers: Vec<String>,
    pub values: Vec<f64>,
    pub observations: usize,
}

impl CorrelationMatrix {
    pub fn size(&self) -> usize {
        self.tickers.len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.size() + col]
    }

    pub fn get_by_ticker(&self, a: &str, b: &str) -> Option<f64> {
        let index: HashMap<&str, usize> = self
            .tickers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();
        Some(self.get(*index.get(a)?, *index.get(b)?))
    }

    /// Off-diagonal pairs sorted by correlation, highest first
    pub fn ranked_pairs(&self) -> Vec<(String, String, f64)> {
        let n = self.size();
        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                pairs.push((self.tickers[i].clone(), self.tickers[j].clone(), self.get(i, j)));
            }
        }
        pairs.sort_by(|a, b| b.2.total_cmp(&a.2));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_classification() {
        assert_eq!(RiskLevel::classify(1.5, 0.2), RiskLevel::High);
        assert_eq!(RiskLevel::classify(1.0, 0.5), RiskLevel::High);
        assert_eq!(RiskLevel::classify(0.6, 0.15), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(0.6, 0.3), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(1.1, 0.3), RiskLevel::Medium);
    }

    #[test]
    fn test_ranked_pairs() {
        let matrix = CorrelationMatrix {
            tickers: vec!["A".into(), "B".into(), "C".into()],
            values: vec![1.0, 0.2, 0.9, 0.2, 1.0, -0.4, 0.9, -0.4, 1.0],
            observations: 100,
        };
        let pairs = matrix.ranked_pairs();
        assert_eq!(pairs[0], ("A".to_string(), "C".to_string(), 0.9));
        assert_eq!(pairs[2].2, -0.4);
        assert_eq!(matrix.get_by_ticker("B", "C"), Some(-0.4));
        assert_eq!(matrix.get_by_ticker("B", "Z"), None);
    }
}
