//! Benchmark divergence: how far a ticker's recent return strays from what its
//! beta to the benchmark implies, measured in units of residual volatility.

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{
    align_series, DivergenceConfig, DivergencePoint, DivergenceReport, DivergenceSignal,
    PriceSeries,
};
use crate::utils::{stats, Logger};
use std::collections::HashMap;

/// Minimum estimation-window length on top of the recent window
pub const MIN_ESTIMATION_RETURNS: usize = 10;

/// Residual volatility below this is treated as a perfect fit
const RESIDUAL_TOLERANCE: f64 = 1e-10;

/// Compare one ticker against one benchmark
pub fn detect_divergence(
    ticker: &PriceSeries,
    benchmark: &PriceSeries,
    config: &DivergenceConfig,
) -> AnalysisResult<DivergenceReport> {
    if benchmark.is_empty() {
        return Err(AnalysisError::MissingSeries(benchmark.ticker.clone()));
    }
    if ticker.is_empty() {
        return Err(AnalysisError::MissingSeries(ticker.ticker.clone()));
    }

    let pair = align_series(ticker, benchmark).tail(config.lookback_days + 1);
    let asset_returns = stats::log_returns(&pair.left);
    let bench_returns = stats::log_returns(&pair.right);
    let return_dates = &pair.dates[pair.dates.len().saturating_sub(asset_returns.len())..];

    let needed = config.recent_window + MIN_ESTIMATION_RETURNS;
    let n = asset_returns.len();
    if n < needed || config.recent_window == 0 {
        return Err(AnalysisError::InsufficientData {
            ticker: ticker.ticker.clone(),
            needed,
            got: n,
        });
    }

    let split = n - config.recent_window;
    let (est_asset, recent_asset) = asset_returns.split_at(split);
    let (est_bench, recent_bench) = bench_returns.split_at(split);

    let degenerate = || {
        AnalysisError::Degenerate(format!(
            "{} has no return variance over the estimation window",
            benchmark.ticker
        ))
    };
    let beta = stats::beta(est_asset, est_bench).ok_or_else(degenerate)?;
    let alpha = stats::alpha(est_asset, est_bench).ok_or_else(degenerate)?;
    let correlation = stats::correlation(est_asset, est_bench).unwrap_or(0.0);

    let residuals: Vec<f64> = est_asset
        .iter()
        .zip(est_bench)
        .map(|(a, b)| a - (alpha + beta * b))
        .collect();
    let residual_std = stats::std_dev(&residuals).unwrap_or(0.0);

    let actual_return = stats::cumulative_log_return(recent_asset);
    let expected_return = beta * stats::cumulative_log_return(recent_bench);
    let divergence = actual_return - expected_return;

    let divergence_score = if residual_std > RESIDUAL_TOLERANCE {
        divergence / (residual_std * (config.recent_window as f64).sqrt())
    } else {
        0.0
    };

    let recent_correlation = stats::correlation(recent_asset, recent_bench);
    let correlation_change = recent_correlation.map(|recent| recent - correlation);
    let correlation_breakdown = correlation_change
        .map(|change| change <= -config.correlation_drop_threshold)
        .unwrap_or(false);

    let signal = DivergenceSignal::from_score(divergence_score, config.z_threshold);

    let mut path = Vec::with_capacity(config.recent_window);
    let (mut cum_actual, mut cum_expected) = (0.0, 0.0);
    for (i, (a, b)) in recent_asset.iter().zip(recent_bench).enumerate() {
        cum_actual += a;
        cum_expected += beta * b;
        path.push(DivergencePoint {
            date: return_dates[split + i].clone(),
            actual: cum_actual,
            expected: cum_expected,
        });
    }

    let window = config.rolling_window.min(n);
    let rolling_correlation = stats::rolling_correlation(&asset_returns, &bench_returns, window)
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| value.map(|v| (return_dates[i + window - 1].clone(), v)))
        .collect();

    Ok(DivergenceReport {
        ticker: ticker.ticker.clone(),
        benchmark: benchmark.ticker.clone(),
        as_of: pair.dates.last().cloned().unwrap_or_default(),
        observations: n,
        beta,
        alpha,
        correlation,
        residual_std,
        actual_return,
        expected_return,
        divergence,
        divergence_score,
        recent_correlation,
        correlation_change,
        signal,
        correlation_breakdown,
        path,
        rolling_correlation,
    })
}

/// Runs divergence detection for a set of tickers against the market benchmark
/// and, where known, each ticker's sector ETF
#[derive(Debug, Clone)]
pub struct DivergenceScanner {
    config: DivergenceConfig,
    logger: Logger,
}

impl DivergenceScanner {
    pub fn new(config: DivergenceConfig) -> Self {
        Self {
            config,
            logger: Logger::new("DIVERGENCE"),
        }
    }

    pub fn config(&self) -> &DivergenceConfig {
        &self.config
    }

    /// `sector_etfs` maps ticker to ETF symbol; `etf_series` holds the ETF prices.
    /// Failed comparisons are logged and left out. Results are sorted by |score|, largest first.
    pub fn scan(
        &self,
        tickers: &[PriceSeries],
        benchmark: &PriceSeries,
        sector_etfs: &HashMap<String, String>,
        etf_series: &HashMap<String, PriceSeries>,
    ) -> Vec<DivergenceReport> {
        let mut reports = Vec::new();

        for series in tickers {
            if series.ticker == benchmark.ticker {
                continue;
            }

            match detect_divergence(series, benchmark, &self.config) {
                Ok(report) => reports.push(report),
                Err(e) => self.logger.warn_with_error(
                    &format!("{} vs {} skipped", series.ticker, benchmark.ticker),
                    &e,
                ),
            }

            let Some(etf) = sector_etfs.get(&series.ticker) else {
                continue;
            };
            if etf == &benchmark.ticker || etf == &series.ticker {
                continue;
            }
            let Some(etf_prices) = etf_series.get(etf) else {
                self.logger
                    .debug(&format!("no prices for sector ETF {} of {}", etf, series.ticker));
                continue;
            };

            match detect_divergence(series, etf_prices, &self.config) {
                Ok(report) => reports.push(report),
                Err(e) => self.logger.warn_with_error(
                    &format!("{} vs {} skipped", series.ticker, etf),
                    &e,
                ),
            }
        }

        sort_by_score(&mut reports);
        reports
    }
}

pub fn sort_by_score(reports: &mut [DivergenceReport]) {
    reports.sort_by(|a, b| b.divergence_score.abs().total_cmp(&a.divergence_score.abs()));
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn config() -> DivergenceConfig {
        DivergenceConfig {
            lookback_days: 252,
            recent_window: 20,
            rolling_window: 60,
            z_threshold: 2.0,
            correlation_drop_threshold: 0.3,
        }
    }

    #[test]
    fn test_tracking_ticker_is_in_line() {
        let bench = noise(1, 300);
        let idio = noise(2, 300);
        let asset: Vec<f64> = bench.iter().zip(&idio).map(|(b, e)| 1.2 * b + 0.1 * e).collect();

        let report = detect_divergence(
            &series_from_returns("AAA", &asset),
            &series_from_returns("SPY", &bench),
            &config(),
        )
        .unwrap();

        assert_eq!(report.observations, 252);
        assert!((report.beta - 1.2).abs() < 0.05);
        assert!(report.correlation > 0.95);
        assert_eq!(report.path.len(), 20);
        assert_eq!(report.as_of, report.path.last().unwrap().date);
        assert!(!report.rolling_correlation.is_empty());
        assert!(!report.correlation_breakdown);
    }

    #[test]
    fn test_recent_jump_outperforms() {
        let bench = noise(3, 300);
        let idio = noise(4, 300);
        let mut asset: Vec<f64> = bench.iter().zip(&idio).map(|(b, e)| b + 0.2 * e).collect();
        // +3% a day above the beta-implied path over the last 20 days
        for r in asset.iter_mut().skip(280) {
            *r += 0.03;
        }

        let report = detect_divergence(
            &series_from_returns("AAA", &asset),
            &series_from_returns("SPY", &bench),
            &config(),
        )
        .unwrap();

        assert_eq!(report.signal, DivergenceSignal::Outperforming);
        assert!(report.divergence > 0.5);
        assert!(report.divergence_score >= 2.0);
    }

    #[test]
    fn test_recent_slump_underperforms() {
        let bench = noise(11, 300);
        let idio = noise(12, 300);
        let mut asset: Vec<f64> = bench.iter().zip(&idio).map(|(b, e)| b + 0.2 * e).collect();
        for r in asset.iter_mut().skip(280) {
            *r -= 0.03;
        }

        let report = detect_divergence(
            &series_from_returns("AAA", &asset),
            &series_from_returns("SPY", &bench),
            &config(),
        )
        .unwrap();

        assert_eq!(report.signal, DivergenceSignal::Underperforming);
        assert!(report.divergence < -0.5);
        assert!(report.divergence_score <= -2.0);
        assert!(report.path.last().unwrap().actual < report.path.last().unwrap().expected);
        assert!(!report.correlation_breakdown);
    }

    #[test]
    fn test_decoupled_recent_window_flags_breakdown() {
        let bench = noise(13, 300);
        let idio = noise(14, 300);
        // tracks the benchmark, then moves against it for the last 20 days
        let asset: Vec<f64> = bench
            .iter()
            .zip(&idio)
            .enumerate()
            .map(|(i, (b, e))| if i < 280 { b + 0.2 * e } else { -b + 0.2 * e })
            .collect();

        let report = detect_divergence(
            &series_from_returns("AAA", &asset),
            &series_from_returns("SPY", &bench),
            &config(),
        )
        .unwrap();

        assert!(report.correlation > 0.9);
        assert!(report.recent_correlation.unwrap() < 0.0);
        assert!(report.correlation_change.unwrap() <= -0.3);
        assert!(report.correlation_breakdown);
    }

    #[test]
    fn test_exact_multiple_has_zero_score() {
        let bench = noise(5, 100);
        let asset: Vec<f64> = bench.iter().map(|b| 2.0 * b).collect();
        let report = detect_divergence(
            &series_from_returns("AAA", &asset),
            &series_from_returns("SPY", &bench),
            &config(),
        )
        .unwrap();
        assert_eq!(report.divergence_score, 0.0);
        assert_eq!(report.signal, DivergenceSignal::InLine);
    }

    #[test]
    fn test_short_history_is_insufficient() {
        let bench = noise(6, 25);
        let err = detect_divergence(
            &series_from_returns("AAA", &bench),
            &series_from_returns("SPY", &bench),
            &config(),
        )
        .unwrap_err();
        match err {
            AnalysisError::InsufficientData { ticker, needed, got } => {
                assert_eq!(ticker, "AAA");
                assert_eq!(needed, 30);
                assert_eq!(got, 25);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_benchmark_is_named() {
        let asset = series_from_returns("AAA", &noise(7, 50));
        let empty = PriceSeries::new("QQQ", Vec::new(), Vec::new());
        let err = detect_divergence(&asset, &empty, &config()).unwrap_err();
        assert!(err.to_string().contains("QQQ"));
    }

    #[test]
    fn test_scanner_adds_sector_comparison_and_sorts() {
        let bench = noise(8, 120);
        let sector = noise(9, 120);
        let calm: Vec<f64> = bench.iter().zip(noise(10, 120)).map(|(b, e)| b + 0.2 * e).collect();
        let mut wild = calm.clone();
        for r in wild.iter_mut().skip(100) {
            *r -= 0.04;
        }

        let tickers = vec![
            series_from_returns("CALM", &calm),
            series_from_returns("WILD", &wild),
        ];
        let sector_etfs = HashMap::from([("WILD".to_string(), "XLK".to_string())]);
        let etf_series = HashMap::from([("XLK".to_string(), series_from_returns("XLK", &sector))]);

        let reports = DivergenceScanner::new(config()).scan(
            &tickers,
            &series_from_returns("SPY", &bench),
            &sector_etfs,
            &etf_series,
        );

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().any(|r| r.ticker == "WILD" && r.benchmark == "XLK"));
        assert_eq!(reports[0].ticker, "WILD");
        assert_eq!(reports[0].benchmark, "SPY");
        for pair in reports.windows(2) {
            assert!(pair[0].divergence_score.abs() >= pair[1].divergence_score.abs());
        }
    }
}
