use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{AlignedFrame, CorrelationMatrix};
use crate::utils::{stats, Logger, Timer};
use rayon::prelude::*;
use std::collections::HashMap;

/// Log returns of many tickers on shared dates, stored row-major as `[tickers, dates]`
#[derive(Debug, Clone)]
pub struct ReturnsMatrix {
    pub data: Vec<f64>,
    pub shape: (usize, usize),
    pub ticker_index: HashMap<String, usize>,
    pub tickers: Vec<String>,
    /// Date of each return (the later price of the pair)
    pub dates: Vec<String>,
}

impl ReturnsMatrix {
    pub fn row(&self, ticker: usize) -> &[f64] {
        let (_, num_dates) = self.shape;
        &self.data[ticker * num_dates..(ticker + 1) * num_dates]
    }

    pub fn row_by_ticker(&self, ticker: &str) -> Option<&[f64]> {
        self.ticker_index.get(ticker).map(|&i| self.row(i))
    }

    pub fn num_dates(&self) -> usize {
        self.shape.1
    }
}

/// Convert aligned closes to a contiguous log-return matrix.
/// Aligned frames only hold positive prices, so every row has the same length.
pub fn vectorize_returns(frame: &AlignedFrame) -> ReturnsMatrix {
    let num_tickers = frame.tickers.len();
    let num_dates = frame.dates.len().saturating_sub(1);

    let mut data = vec![0.0; num_tickers * num_dates];
    for (t, closes) in frame.closes.iter().enumerate() {
        for d in 0..num_dates {
            let (prev, next) = (closes[d], closes[d + 1]);
            data[t * num_dates + d] = if prev > 0.0 && next > 0.0 {
                (next / prev).ln()
            } else {
                0.0
            };
        }
    }

    let ticker_index = frame
        .tickers
        .iter()
        .enumerate()
        .map(|(i, t)| (t.clone(), i))
        .collect();

    ReturnsMatrix {
        data,
        shape: (num_tickers, num_dates),
        ticker_index,
        tickers: frame.tickers.clone(),
        dates: frame.dates.iter().skip(1).cloned().collect(),
    }
}

/// Pairwise Pearson correlation of every row, computed in parallel over the upper triangle
pub fn calculate_correlation_matrix(matrix: &ReturnsMatrix) -> AnalysisResult<CorrelationMatrix> {
    let logger = Logger::new("CORRELATION_MATRIX");
    let timer = Timer::start("correlation matrix");
    let (num_tickers, num_dates) = matrix.shape;

    if num_tickers < 2 {
        return Err(AnalysisError::Degenerate(
            "correlation matrix needs at least two tickers".to_string(),
        ));
    }
    if num_dates < 2 {
        return Err(AnalysisError::InsufficientData {
            ticker: matrix.tickers.join(","),
            needed: 2,
            got: num_dates,
        });
    }

    logger.debug(&format!(
        "RAYON: {} tickers x {} returns",
        num_tickers, num_dates
    ));

    let pairs: Vec<(usize, usize)> = (0..num_tickers)
        .flat_map(|i| ((i + 1)..num_tickers).map(move |j| (i, j)))
        .collect();

    let correlations: Vec<(usize, usize, f64)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            // Constant series have no defined correlation; show them as uncorrelated
            let value = stats::correlation(matrix.row(i), matrix.row(j)).unwrap_or(0.0);
            (i, j, value)
        })
        .collect();

    let mut values = vec![0.0; num_tickers * num_tickers];
    for i in 0..num_tickers {
        values[i * num_tickers + i] = 1.0;
    }
    for (i, j, value) in correlations {
        values[i * num_tickers + j] = value;
        values[j * num_tickers + i] = value;
    }

    timer.log_elapsed("CORRELATION_MATRIX");

    Ok(CorrelationMatrix {
        tickers: matrix.tickers.clone(),
        values,
        observations: num_dates,
    })
}
