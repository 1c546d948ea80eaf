//! Error types for the data-fetch and analysis layers

use thiserror::Error;

/// Errors raised while talking to a market data provider
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("No data available for {0}")]
    NoData(String),
}

/// Errors raised by the metric calculations
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Insufficient data for {ticker}: need {needed} aligned returns, got {got}")]
    InsufficientData {
        ticker: String,
        needed: usize,
        got: usize,
    },

    #[error("Missing series: {0}")]
    MissingSeries(String),

    #[error("Degenerate input: {0}")]
    Degenerate(String),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
