//! # stockcorr - Portfolio Correlation and Risk Research Library
//!
//! A Rust library for researching a personal stock portfolio against a benchmark:
//! - Correlation, beta and alpha over a configurable lookback
//! - Divergence of recent returns from the beta-implied path
//! - A per-ticker risk matrix with regime-conditional statistics
//! - A fear-greed sentiment score built from market proxies
//! - SVG charts, PDF reports, terminal tables and CSV exports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stockcorr::api::AnalysisBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let analyzer = AnalysisBuilder::new().with_benchmark("SPY").build()?;
//!     let rows = analyzer
//!         .risk_matrix(&["AAPL".to_string(), "KO".to_string()])
//!         .await?;
//!     println!("Risk matrix complete: {} tickers measured", rows.len());
//!     Ok(())
//! }
//! ```

// Core modules - these contain the main functionality
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

// Output of results
pub mod render;

// Analysis modules - high-level analysis functionality
pub mod analysis {
    //! Metric calculations over aligned price series

    /// Mean, variance, correlation, beta and rolling windows
    pub mod stats {
        pub use crate::utils::stats::*;
    }

    /// Divergence from the beta-implied path
    pub mod divergence {
        pub use crate::utils::divergence::{detect_divergence, sort_by_score, DivergenceScanner};
    }

    /// Per-ticker risk rows
    pub mod risk_matrix {
        pub use crate::utils::risk_matrix::*;
    }

    /// Fear-greed composite
    pub mod sentiment {
        pub use crate::utils::sentiment::*;
    }

    /// Pairwise correlation over a vectorized returns matrix
    pub mod correlation {
        pub use crate::utils::matrix_utils::*;
    }
}

// Public API for easy library usage
pub mod api;

// Handlers behind the CLI
pub mod commands;

// Prelude for convenient imports
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! Import this module to get the most commonly used types and functions:
    //! ```rust
    //! use stockcorr::prelude::*;
    //! ```

    pub use crate::api::{AnalysisBuilder, StockAnalyzer};
    pub use crate::error::{AnalysisError, FetchError};
    pub use crate::models::{
        AnalysisSettings, CorrelationMatrix, DateRangeConfig, DivergenceReport, DivergenceSignal,
        PriceSeries, RiskLevel, RiskMatrixRow, SentimentLabel, SentimentReport, TimeRange,
    };
    pub use crate::services::{MarketDataProvider, PortfolioManager, StockInfoManager};
}

// Re-export some commonly used utilities
pub use utils::{init_logger, Logger, Timer};
