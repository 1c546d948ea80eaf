use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{align_series, PriceSeries, RiskConfig, RiskLevel, RiskMatrixRow};
use crate::utils::{stats, Logger, Timer};
use rayon::prelude::*;

/// Conditional statistics computed from fewer observations are reported as missing
pub const MIN_CONDITIONAL_OBSERVATIONS: usize = 10;

fn conditional<F>(asset: &[f64], bench: &[f64], keep: impl Fn(usize) -> bool, f: F) -> Option<f64>
where
    F: Fn(&[f64], &[f64]) -> Option<f64>,
{
    let (a, b): (Vec<f64>, Vec<f64>) = asset
        .iter()
        .zip(bench)
        .enumerate()
        .filter(|(i, _)| keep(*i))
        .map(|(_, (a, b))| (*a, *b))
        .unzip();

    if a.len() < MIN_CONDITIONAL_OBSERVATIONS {
        return None;
    }
    f(&a, &b)
}

/// One row of the risk matrix: the ticker measured against the benchmark
pub fn calculate_risk_row(
    ticker: &PriceSeries,
    benchmark: &PriceSeries,
    config: &RiskConfig,
) -> AnalysisResult<RiskMatrixRow> {
    if benchmark.is_empty() {
        return Err(AnalysisError::MissingSeries(benchmark.ticker.clone()));
    }

    let pair = align_series(ticker, benchmark).tail(config.lookback_days + 1);
    let asset = stats::log_returns(&pair.left);
    let bench = stats::log_returns(&pair.right);

    let needed = config.vol_window.max(2) + MIN_CONDITIONAL_OBSERVATIONS;
    if asset.len() < needed {
        return Err(AnalysisError::InsufficientData {
            ticker: ticker.ticker.clone(),
            needed,
            got: asset.len(),
        });
    }

    let beta = stats::beta(&asset, &bench).ok_or_else(|| {
        AnalysisError::Degenerate(format!("{} returns have no variance", benchmark.ticker))
    })?;
    let alpha = stats::alpha(&asset, &bench).unwrap_or(0.0);
    let correlation = stats::correlation(&asset, &bench).unwrap_or(0.0);
    let annualized_volatility = stats::annualized_volatility(&asset).unwrap_or(0.0);

    let active: Vec<f64> = asset.iter().zip(&bench).map(|(a, b)| a - b).collect();
    let tracking_error = stats::annualized_volatility(&active).unwrap_or(0.0);

    let actual_return = stats::cumulative_log_return(&asset);
    let expected_return = beta * stats::cumulative_log_return(&bench);

    // Market regime
    let up_market_correlation = conditional(&asset, &bench, |i| bench[i] > 0.0, stats::correlation);
    let down_market_correlation =
        conditional(&asset, &bench, |i| bench[i] < 0.0, stats::correlation);
    let downside_beta = conditional(&asset, &bench, |i| bench[i] < 0.0, stats::beta);

    // Volatility regime: benchmark rolling std, split at its median
    let window = config.vol_window.max(2);
    let vols: Vec<Option<f64>> = stats::rolling_std(&bench, window);
    let known: Vec<f64> = vols.iter().flatten().copied().collect();
    let (high_vol_correlation, low_vol_correlation) = match stats::median(&known) {
        Some(median) => {
            let regime = |i: usize| -> Option<bool> {
                // Return i is the last day of rolling window i - (window - 1)
                let idx = i.checked_sub(window - 1)?;
                vols.get(idx).copied().flatten().map(|v| v > median)
            };
            (
                conditional(&asset, &bench, |i| regime(i) == Some(true), stats::correlation),
                conditional(&asset, &bench, |i| regime(i) == Some(false), stats::correlation),
            )
        }
        None => (None, None),
    };

    Ok(RiskMatrixRow {
        ticker: ticker.ticker.clone(),
        benchmark: benchmark.ticker.clone(),
        observations: asset.len(),
        correlation,
        beta,
        alpha,
        annualized_volatility,
        tracking_error,
        expected_return,
        actual_return,
        excess_return: actual_return - expected_return,
        up_market_correlation,
        down_market_correlation,
        downside_beta,
        high_vol_correlation,
        low_vol_correlation,
        risk_level: RiskLevel::classify(beta, annualized_volatility),
    })
}

/// Risk rows for every ticker, computed in parallel and kept in input order.
/// Tickers that cannot be measured are logged and left out.
pub fn calculate_risk_matrix(
    tickers: &[PriceSeries],
    benchmark: &PriceSeries,
    config: &RiskConfig,
) -> Vec<RiskMatrixRow> {
    let logger = Logger::new("RISK_MATRIX");
    let timer = Timer::start("risk matrix");

    let results: Vec<(String, AnalysisResult<RiskMatrixRow>)> = tickers
        .par_iter()
        .filter(|series| series.ticker != benchmark.ticker)
        .map(|series| {
            (
                series.ticker.clone(),
                calculate_risk_row(series, benchmark, config),
            )
        })
        .collect();

    let mut rows = Vec::with_capacity(results.len());
    for (ticker, result) in results {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => logger.warn_with_error(&format!("{} skipped", ticker), &e),
        }
    }

    logger.info(&format!(
        "{} of {} tickers measured against {}",
        rows.len(),
        tickers.len(),
        benchmark.ticker
    ));
    timer.log_elapsed("RISK_MATRIX");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::divergence::fixtures::{noise, series_from_returns};

    fn config() -> RiskConfig {
        RiskConfig {
            lookback_days: 252,
            vol_window: 20,
        }
    }

    #[test]
    fn test_high_beta_row() {
        let bench = noise(11, 300);
        let asset: Vec<f64> = bench
            .iter()
            .zip(noise(12, 300))
            .map(|(b, e)| 1.8 * b + 0.3 * e)
            .collect();

        let row = calculate_risk_row(
            &series_from_returns("HIGH", &asset),
            &series_from_returns("SPY", &bench),
            &config(),
        )
        .unwrap();

        assert_eq!(row.observations, 252);
        assert!((row.beta - 1.8).abs() < 0.1);
        assert_eq!(row.risk_level, RiskLevel::High);
        assert!((row.excess_return - (row.actual_return - row.expected_return)).abs() < 1e-12);
        assert!(row.tracking_error > 0.0);
        assert!(row.up_market_correlation.is_some());
        assert!(row.down_market_correlation.is_some());
        assert!(row.downside_beta.is_some());
        assert!(row.high_vol_correlation.is_some());
        assert!(row.low_vol_correlation.is_some());
    }

    #[test]
    fn test_low_risk_row() {
        let bench = noise(13, 300);
        let asset: Vec<f64> = bench.iter().map(|b| 0.5 * b).collect();
        let row = calculate_risk_row(
            &series_from_returns("LOW", &asset),
            &series_from_returns("SPY", &bench),
            &config(),
        )
        .unwrap();
        assert!((row.beta - 0.5).abs() < 1e-6);
        assert_eq!(row.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_conditional_needs_ten_observations() {
        let a: Vec<f64> = (0..9).map(|i| i as f64).collect();
        assert_eq!(conditional(&a, &a, |_| true, stats::correlation), None);

        let b: Vec<f64> = (0..12).map(|i| i as f64).collect();
        assert!(conditional(&b, &b, |_| true, stats::correlation).is_some());
    }

    #[test]
    fn test_matrix_skips_short_series_and_benchmark() {
        let bench = noise(14, 200);
        let tickers = vec![
            series_from_returns("AAA", &noise(15, 200)),
            series_from_returns("SHORT", &noise(16, 5)),
            series_from_returns("SPY", &bench),
        ];
        let rows = calculate_risk_matrix(&tickers, &series_from_returns("SPY", &bench), &config());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ticker, "AAA");
    }
}
