//! High-level API for easy library usage
//!
//! This module provides simplified interfaces for the portfolio analyses.

pub mod analyzer;
pub mod builder;

pub use analyzer::StockAnalyzer;
pub use builder::AnalysisBuilder;
