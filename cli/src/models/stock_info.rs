use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Company details returned by a market data provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

/// Stored research details for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub ticker: String,
    pub company: String,
    pub industry: String,
    pub sector: String,
    pub peers: Vec<String>,
    pub sector_etf: String,
    pub updated_at: DateTime<Utc>,
}

pub const UNKNOWN: &str = "Unknown";

impl StockInfo {
    /// Placeholder used when the provider has nothing for the ticker
    pub fn unknown(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            company: UNKNOWN.to_string(),
            industry: UNKNOWN.to_string(),
            sector: UNKNOWN.to_string(),
            peers: Vec::new(),
            sector_etf: sector_etf(UNKNOWN).to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn from_profile(ticker: &str, profile: Option<CompanyProfile>, peers: Vec<String>) -> Self {
        let profile = profile.unwrap_or_default();
        let sector = profile.sector.unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            ticker: ticker.to_string(),
            company: profile.name.unwrap_or_else(|| UNKNOWN.to_string()),
            industry: profile.industry.unwrap_or_else(|| UNKNOWN.to_string()),
            sector_etf: sector_etf(&sector).to_string(),
            sector,
            peers: peers.into_iter().filter(|p| p != ticker).collect(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        Utc::now() - self.updated_at > max_age
    }

    pub fn has_sector(&self) -> bool {
        self.sector != UNKNOWN
    }
}

/// SPDR sector fund standing in for a sector; the broad market for anything else
pub fn sector_etf(sector: &str) -> &'static str {
    match sector {
        "Technology" => "XLK",
        "Financial Services" | "Financials" => "XLF",
        "Healthcare" | "Health Care" => "XLV",
        "Consumer Cyclical" | "Consumer Discretionary" => "XLY",
        "Consumer Defensive" | "Consumer Staples" => "XLP",
        "Energy" => "XLE",
        "Industrials" => "XLI",
        "Basic Materials" | "Materials" => "XLB",
        "Utilities" => "XLU",
        "Real Estate" => "XLRE",
        "Communication Services" => "XLC",
        _ => "SPY",
    }
}
