//! Statistical primitives over daily price and return series.
//!
//! Every function returns `None` for input that is too short or degenerate
//! (fewer than two points, zero variance) instead of producing NaN.

/// Trading days per year used for annualization
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n-1 denominator)
pub fn variance(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let mean_val = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - mean_val).powi(2)).sum();
    Some(sum_sq / (n - 1) as f64)
}

/// Sample standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(|v| v.sqrt())
}

/// Sample covariance of two equally long series
pub fn covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let mean_x = mean(x)?;
    let mean_y = mean(y)?;

    let sum: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();

    Some(sum / (x.len() - 1) as f64)
}

/// Pearson correlation coefficient
pub fn correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    let cov = covariance(x, y)?;
    let std_x = std_dev(x)?;
    let std_y = std_dev(y)?;

    if std_x == 0.0 || std_y == 0.0 {
        return None;
    }

    Some((cov / (std_x * std_y)).clamp(-1.0, 1.0))
}

/// OLS slope of `asset` on `benchmark`: cov(asset, benchmark) / var(benchmark)
pub fn beta(asset: &[f64], benchmark: &[f64]) -> Option<f64> {
    let cov = covariance(asset, benchmark)?;
    let var_b = variance(benchmark)?;

    if var_b == 0.0 {
        return None;
    }

    Some(cov / var_b)
}

/// OLS intercept of `asset` on `benchmark`
pub fn alpha(asset: &[f64], benchmark: &[f64]) -> Option<f64> {
    let b = beta(asset, benchmark)?;
    Some(mean(asset)? - b * mean(benchmark)?)
}

/// (p[i] - p[i-1]) / p[i-1] for each consecutive pair
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter_map(|w| {
            if w[0] > 0.0 {
                Some((w[1] - w[0]) / w[0])
            } else {
                None
            }
        })
        .collect()
}

/// ln(p[i] / p[i-1]) for each consecutive pair; pairs with a non-positive price are skipped
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter_map(|w| {
            if w[0] > 0.0 && w[1] > 0.0 {
                Some((w[1] / w[0]).ln())
            } else {
                None
            }
        })
        .collect()
}

pub fn cumulative_log_return(log_returns: &[f64]) -> f64 {
    log_returns.iter().sum()
}

/// Daily standard deviation scaled by sqrt(252)
pub fn annualized_volatility(log_returns: &[f64]) -> Option<f64> {
    std_dev(log_returns).map(|s| s * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Correlation over each trailing window. Element `i` covers `[i, i + window)`.
pub fn rolling_correlation(x: &[f64], y: &[f64], window: usize) -> Vec<Option<f64>> {
    if window < 2 || x.len() != y.len() || x.len() < window {
        return Vec::new();
    }

    (0..=x.len() - window)
        .map(|i| correlation(&x[i..i + window], &y[i..i + window]))
        .collect()
}

/// Standard deviation over each trailing window. Element `i` covers `[i, i + window)`.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window < 2 || values.len() < window {
        return Vec::new();
    }

    values.windows(window).map(std_dev).collect()
}

/// Simple moving average. Element `i` covers `[i, i + window)`.
pub fn sma(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out.push(sum / window as f64);
    }
    out
}

/// Share of `history` strictly below `value` plus half the ties, in `[0, 100]`
pub fn percentile_rank(history: &[f64], value: f64) -> Option<f64> {
    if history.is_empty() || !value.is_finite() {
        return None;
    }

    let below = history.iter().filter(|v| **v < value).count() as f64;
    let equal = history.iter().filter(|v| **v == value).count() as f64;
    Some((below + 0.5 * equal) / history.len() as f64 * 100.0)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
