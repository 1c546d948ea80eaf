//! Fear-greed composite built from market proxies and portfolio breadth.

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{
    align_series, PriceSeries, SentimentComponent, SentimentComponentKind, SentimentHistoryPoint,
    SentimentLabel, SentimentReport,
};
use crate::utils::{stats, Logger};

pub const MOMENTUM_WINDOW: usize = 125;
pub const VOLATILITY_WINDOW: usize = 50;
pub const SPREAD_WINDOW: usize = 20;
pub const BREADTH_WINDOW: usize = 50;
/// Trailing values a raw indicator is ranked against
pub const RANK_HISTORY: usize = 252;
/// Fewer ranked values than this make a percentile meaningless
pub const MIN_RANK_HISTORY: usize = 20;

/// Price series feeding the score. Missing proxies skip their component.
#[derive(Debug, Clone, Default)]
pub struct SentimentInputs {
    pub benchmark: Option<PriceSeries>,
    pub volatility: Option<PriceSeries>,
    pub bonds: Option<PriceSeries>,
    pub high_yield: Option<PriceSeries>,
    pub treasuries: Option<PriceSeries>,
    pub portfolio: Vec<PriceSeries>,
}

impl SentimentInputs {
    /// Every series cut to observations on or before `date`
    pub fn as_of(&self, date: &str) -> SentimentInputs {
        let cut = |s: &Option<PriceSeries>| s.as_ref().map(|s| s.truncate_to(date));
        SentimentInputs {
            benchmark: cut(&self.benchmark),
            volatility: cut(&self.volatility),
            bonds: cut(&self.bonds),
            high_yield: cut(&self.high_yield),
            treasuries: cut(&self.treasuries),
            portfolio: self.portfolio.iter().map(|s| s.truncate_to(date)).collect(),
        }
    }

    /// Dates of the series that drives the history timeline
    fn timeline(&self) -> Option<&[String]> {
        self.benchmark
            .as_ref()
            .or(self.volatility.as_ref())
            .map(|s| s.dates.as_slice())
    }

    fn latest_date(&self) -> Option<String> {
        [
            &self.benchmark,
            &self.volatility,
            &self.bonds,
            &self.high_yield,
            &self.treasuries,
        ]
        .into_iter()
        .flatten()
        .chain(self.portfolio.iter())
        .filter_map(|s| s.last_date())
        .max()
        .map(str::to_string)
    }
}

/// Rank today's raw value within its trailing history
fn ranked(raw: &[f64]) -> Option<(f64, f64)> {
    let today = *raw.last()?;
    let history = &raw[raw.len().saturating_sub(RANK_HISTORY)..];
    if history.len() < MIN_RANK_HISTORY {
        return None;
    }
    Some((today, stats::percentile_rank(history, today)?))
}

/// value / SMA(window) - 1 for every day the average is defined
fn distance_from_average(closes: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || closes.len() < window {
        return Vec::new();
    }
    stats::sma(closes, window)
        .iter()
        .zip(&closes[window.saturating_sub(1)..])
        .filter(|(avg, _)| **avg > 0.0)
        .map(|(avg, close)| close / avg - 1.0)
        .collect()
}

/// N-day return of `left` minus N-day return of `right` on shared dates
fn return_spread(left: &PriceSeries, right: &PriceSeries, window: usize) -> Vec<f64> {
    let pair = align_series(left, right);
    (window..pair.len())
        .map(|i| {
            let l = pair.left[i] / pair.left[i - window] - 1.0;
            let r = pair.right[i] / pair.right[i - window] - 1.0;
            l - r
        })
        .collect()
}

fn momentum(benchmark: &PriceSeries) -> Option<SentimentComponent> {
    let (raw, score) = ranked(&distance_from_average(&benchmark.closes, MOMENTUM_WINDOW))?;
    Some(SentimentComponent {
        kind: SentimentComponentKind::MarketMomentum,
        raw,
        score,
    })
}

fn volatility(vix: &PriceSeries) -> Option<SentimentComponent> {
    let (raw, rank) = ranked(&distance_from_average(&vix.closes, VOLATILITY_WINDOW))?;
    Some(SentimentComponent {
        kind: SentimentComponentKind::Volatility,
        raw,
        score: 100.0 - rank,
    })
}

fn spread(
    kind: SentimentComponentKind,
    left: &PriceSeries,
    right: &PriceSeries,
) -> Option<SentimentComponent> {
    let (raw, score) = ranked(&return_spread(left, right, SPREAD_WINDOW))?;
    Some(SentimentComponent { kind, raw, score })
}

fn breadth(portfolio: &[PriceSeries]) -> Option<SentimentComponent> {
    let flags: Vec<bool> = portfolio
        .iter()
        .filter_map(|s| {
            let avg = *stats::sma(&s.closes, BREADTH_WINDOW).last()?;
            let close = *s.closes.last()?;
            Some(close > avg)
        })
        .collect();

    if flags.is_empty() {
        return None;
    }

    let share = flags.iter().filter(|above| **above).count() as f64 / flags.len() as f64;
    Some(SentimentComponent {
        kind: SentimentComponentKind::PortfolioBreadth,
        raw: share,
        score: share * 100.0,
    })
}

/// Composite score as of the latest date in `inputs`
pub fn calculate_sentiment(inputs: &SentimentInputs) -> AnalysisResult<SentimentReport> {
    let logger = Logger::new("SENTIMENT");

    let candidates = [
        (
            SentimentComponentKind::MarketMomentum,
            inputs.benchmark.as_ref().and_then(momentum),
        ),
        (
            SentimentComponentKind::Volatility,
            inputs.volatility.as_ref().and_then(volatility),
        ),
        (
            SentimentComponentKind::SafeHavenDemand,
            match (&inputs.benchmark, &inputs.bonds) {
                (Some(stocks), Some(bonds)) => {
                    spread(SentimentComponentKind::SafeHavenDemand, stocks, bonds)
                }
                _ => None,
            },
        ),
        (
            SentimentComponentKind::JunkBondDemand,
            match (&inputs.high_yield, &inputs.treasuries) {
                (Some(junk), Some(safe)) => {
                    spread(SentimentComponentKind::JunkBondDemand, junk, safe)
                }
                _ => None,
            },
        ),
        (
            SentimentComponentKind::PortfolioBreadth,
            breadth(&inputs.portfolio),
        ),
    ];

    let mut components = Vec::with_capacity(candidates.len());
    for (kind, component) in candidates {
        match component {
            Some(c) => components.push(c),
            None => logger.debug(&format!("{} skipped: not enough data", kind.label())),
        }
    }

    if components.is_empty() {
        return Err(AnalysisError::InsufficientData {
            ticker: "sentiment".to_string(),
            needed: MOMENTUM_WINDOW + MIN_RANK_HISTORY,
            got: inputs.benchmark.as_ref().map(|s| s.len()).unwrap_or(0),
        });
    }

    let scores: Vec<f64> = components.iter().map(|c| c.score).collect();
    let score = stats::mean(&scores).unwrap_or(50.0);

    Ok(SentimentReport {
        as_of: inputs.latest_date().unwrap_or_default(),
        score,
        label: SentimentLabel::from_score(score),
        components,
    })
}

/// Composite score for each of the last `days` trading days, oldest first.
/// Days on which no component can be computed are left out.
pub fn sentiment_history(inputs: &SentimentInputs, days: usize) -> Vec<SentimentHistoryPoint> {
    let Some(dates) = inputs.timeline() else {
        return Vec::new();
    };

    dates[dates.len().saturating_sub(days)..]
        .iter()
        .filter_map(|date| {
            calculate_sentiment(&inputs.as_of(date))
                .ok()
                .map(|report| SentimentHistoryPoint {
                    date: date.clone(),
                    score: report.score,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::divergence::fixtures::{noise, series_from_returns};

    fn trending(ticker: &str, seed: u64, n: usize, drift: f64) -> PriceSeries {
        let returns: Vec<f64> = noise(seed, n).iter().map(|r| r * 0.5 + drift).collect();
        series_from_returns(ticker, &returns)
    }

    #[test]
    fn test_strong_rally_reads_as_greed() {
        // Flat for a year, then a steep two-month rally
        let mut returns: Vec<f64> = noise(21, 300).iter().map(|r| r * 0.2).collect();
        returns.extend(std::iter::repeat(0.01).take(40));
        let inputs = SentimentInputs {
            benchmark: Some(series_from_returns("SPY", &returns)),
            ..Default::default()
        };

        let report = calculate_sentiment(&inputs).unwrap();
        assert_eq!(report.components.len(), 1);
        assert_eq!(report.components[0].kind, SentimentComponentKind::MarketMomentum);
        assert!(report.score > 90.0);
        assert_eq!(report.label, SentimentLabel::ExtremeGreed);
    }

    #[test]
    fn test_volatility_spike_reads_as_fear() {
        let mut returns: Vec<f64> = noise(22, 200).iter().map(|r| r * 0.2).collect();
        returns.extend(std::iter::repeat(0.05).take(10));
        let inputs = SentimentInputs {
            volatility: Some(series_from_returns("^VIX", &returns)),
            ..Default::default()
        };

        let report = calculate_sentiment(&inputs).unwrap();
        assert!(report.score < 10.0);
        assert_eq!(report.label, SentimentLabel::ExtremeFear);
    }

    #[test]
    fn test_breadth_counts_tickers_above_average() {
        let inputs = SentimentInputs {
            portfolio: vec![
                trending("UP1", 23, 80, 0.01),
                trending("UP2", 24, 80, 0.01),
                trending("DOWN", 25, 80, -0.01),
                trending("NEW", 26, 10, 0.01),
            ],
            ..Default::default()
        };
        let report = calculate_sentiment(&inputs).unwrap();
        let component = &report.components[0];
        assert_eq!(component.kind, SentimentComponentKind::PortfolioBreadth);
        assert!((component.score - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_composite_is_mean_of_components() {
        let inputs = SentimentInputs {
            benchmark: Some(trending("SPY", 27, 400, 0.0005)),
            volatility: Some(trending("^VIX", 28, 400, 0.0)),
            bonds: Some(trending("TLT", 29, 400, 0.0)),
            high_yield: Some(trending("HYG", 30, 400, 0.0)),
            treasuries: Some(trending("IEF", 31, 400, 0.0)),
            portfolio: vec![trending("AAA", 32, 400, 0.001)],
        };
        let report = calculate_sentiment(&inputs).unwrap();
        assert_eq!(report.components.len(), 5);
        let mean = report.components.iter().map(|c| c.score).sum::<f64>() / 5.0;
        assert!((report.score - mean).abs() < 1e-9);
        assert!(report.components.iter().all(|c| (0.0..=100.0).contains(&c.score)));
        assert_eq!(report.as_of, inputs.benchmark.as_ref().unwrap().last_date().unwrap());
    }

    #[test]
    fn test_no_inputs_is_insufficient() {
        let err = calculate_sentiment(&SentimentInputs::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[test]
    fn test_history_covers_requested_days() {
        let inputs = SentimentInputs {
            benchmark: Some(trending("SPY", 33, 300, 0.0)),
            ..Default::default()
        };
        let history = sentiment_history(&inputs, 30);
        assert_eq!(history.len(), 30);
        assert_eq!(
            history.last().map(|p| p.date.as_str()),
            inputs.benchmark.as_ref().unwrap().last_date()
        );
        assert!(history.windows(2).all(|w| w[0].date < w[1].date));
    }
}
