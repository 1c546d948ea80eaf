use crate::{
    error::{FetchError, FetchResult},
    models::{CompanyProfile, DateRangeConfig, PriceSeries, StockDataPoint},
    utils::{format_date_range_info, Logger, Timer},
};
use async_trait::async_trait;
use regex::Regex;
use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
    time::Duration,
};

/// Concurrent requests per batch in [`MarketDataService::fetch_many`]
pub const BATCH_SIZE: usize = 10;
const BATCH_PAUSE: Duration = Duration::from_millis(250);

/// Source of daily bars and company metadata
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars for `symbol`, oldest first
    async fn history(
        &self,
        symbol: &str,
        range: &DateRangeConfig,
    ) -> FetchResult<Vec<StockDataPoint>>;

    async fn profile(&self, symbol: &str) -> FetchResult<CompanyProfile>;

    async fn peers(&self, symbol: &str) -> FetchResult<Vec<String>>;
}

#[async_trait]
impl<P: MarketDataProvider + ?Sized> MarketDataProvider for Arc<P> {
    async fn history(
        &self,
        symbol: &str,
        range: &DateRangeConfig,
    ) -> FetchResult<Vec<StockDataPoint>> {
        (**self).history(symbol, range).await
    }

    async fn profile(&self, symbol: &str) -> FetchResult<CompanyProfile> {
        (**self).profile(symbol).await
    }

    async fn peers(&self, symbol: &str) -> FetchResult<Vec<String>> {
        (**self).peers(symbol).await
    }
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9.^=\-]{1,12}$").expect("symbol pattern is valid"))
}

/// Upper-case and validate a ticker before it reaches any provider
pub fn normalize_symbol(symbol: &str) -> FetchResult<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol_pattern().is_match(&symbol) {
        Ok(symbol)
    } else {
        Err(FetchError::InvalidSymbol(symbol))
    }
}

/// Batch helper over any provider
pub struct MarketDataService {
    provider: Arc<dyn MarketDataProvider>,
    logger: Logger,
}

impl MarketDataService {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            logger: Logger::new("MARKET_DATA"),
        }
    }

    pub fn provider(&self) -> Arc<dyn MarketDataProvider> {
        Arc::clone(&self.provider)
    }

    /// Closing-price series for one symbol
    pub async fn fetch_series(
        &self,
        symbol: &str,
        range: &DateRangeConfig,
    ) -> FetchResult<PriceSeries> {
        let symbol = normalize_symbol(symbol)?;
        let points = self.provider.history(&symbol, range).await?;
        let series = PriceSeries::from_points(&symbol, &points);
        if series.is_empty() {
            return Err(FetchError::NoData(symbol));
        }
        Ok(series)
    }

    /// Fetch many symbols in concurrent batches. A symbol that fails is logged
    /// and left out of the result; the batch carries on.
    pub async fn fetch_many(
        &self,
        symbols: &[String],
        range: &DateRangeConfig,
    ) -> HashMap<String, PriceSeries> {
        let mut result = HashMap::new();
        let timer = Timer::start("batch history fetch");

        self.logger.info(&format!(
            "Fetching {} symbols ({})",
            symbols.len(),
            format_date_range_info(range)
        ));

        let mut unique: Vec<String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match normalize_symbol(symbol) {
                Ok(s) if !unique.contains(&s) => unique.push(s),
                Ok(_) => {}
                Err(e) => self.logger.warn_with_error("Skipping symbol", &e),
            }
        }

        let batches: Vec<&[String]> = unique.chunks(BATCH_SIZE).collect();
        for (batch_idx, batch) in batches.iter().enumerate() {
            let tasks = batch.iter().map(|symbol| async move {
                (symbol.clone(), self.fetch_series(symbol, range).await)
            });

            for (symbol, outcome) in futures::future::join_all(tasks).await {
                match outcome {
                    Ok(series) => {
                        result.insert(symbol, series);
                    }
                    Err(e) => self
                        .logger
                        .warn_with_error(&format!("Failed to fetch {}", symbol), &e),
                }
            }

            if batch_idx + 1 < batches.len() {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
        }

        self.logger.info(&format!(
            "Fetch completed: {}/{} symbols loaded",
            result.len(),
            unique.len()
        ));
        timer.log_elapsed("MARKET_DATA");
        result
    }
}

/// Provider backed by in-memory fixtures, for tests and offline runs
#[derive(Debug, Default, Clone)]
pub struct InMemoryProvider {
    pub histories: HashMap<String, Vec<StockDataPoint>>,
    pub profiles: HashMap<String, CompanyProfile>,
    pub peers: HashMap<String, Vec<String>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register daily closes starting at `start` (YYYY-MM-DD), one per calendar day
    pub fn with_closes(mut self, symbol: &str, start: &str, closes: &[f64]) -> Self {
        let start = chrono::NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap_or_default();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let day = start + chrono::Duration::days(i as i64);
                StockDataPoint::new(
                    symbol.to_string(),
                    day.format("%Y-%m-%d").to_string(),
                    day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
                    *close,
                    *close,
                    *close,
                    *close,
                    *close,
                    0,
                )
            })
            .collect();
        self.histories.insert(symbol.to_string(), points);
        self
    }

    pub fn with_profile(mut self, profile: CompanyProfile, peers: &[&str]) -> Self {
        self.peers.insert(
            profile.symbol.clone(),
            peers.iter().map(|p| p.to_string()).collect(),
        );
        self.profiles.insert(profile.symbol.clone(), profile);
        self
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryProvider {
    async fn history(
        &self,
        symbol: &str,
        _range: &DateRangeConfig,
    ) -> FetchResult<Vec<StockDataPoint>> {
        self.histories
            .get(symbol)
            .cloned()
            .ok_or_else(|| FetchError::NoData(symbol.to_string()))
    }

    async fn profile(&self, symbol: &str) -> FetchResult<CompanyProfile> {
        self.profiles
            .get(symbol)
            .cloned()
            .ok_or_else(|| FetchError::NoData(symbol.to_string()))
    }

    async fn peers(&self, symbol: &str) -> FetchResult<Vec<String>> {
        Ok(self.peers.get(symbol).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("^vix").unwrap(), "^VIX");
        assert_eq!(normalize_symbol("brk-b").unwrap(), "BRK-B");
        assert_eq!(normalize_symbol("EURUSD=X").unwrap(), "EURUSD=X");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("BAD SYMBOL").is_err());
        assert!(normalize_symbol("../etc/passwd").is_err());
        assert!(normalize_symbol("TOOLONGSYMBOL1").is_err());
    }

    #[tokio::test]
    async fn test_fetch_many_skips_failures() {
        let provider = InMemoryProvider::new()
            .with_closes("AAPL", "2024-01-01", &[100.0, 101.0, 102.0])
            .with_closes("MSFT", "2024-01-01", &[200.0, 199.0, 201.0]);
        let service = MarketDataService::new(Arc::new(provider));

        let symbols: Vec<String> = ["aapl", "MSFT", "MISSING", "bad symbol", "AAPL"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let result = service.fetch_many(&symbols, &DateRangeConfig::default()).await;

        assert_eq!(result.len(), 2);
        assert_eq!(result["AAPL"].closes, vec![100.0, 101.0, 102.0]);
        assert_eq!(result["MSFT"].last_date(), Some("2024-01-03"));
    }

    #[tokio::test]
    async fn test_fetch_series_rejects_empty_history() {
        let provider = InMemoryProvider::new().with_closes("ZERO", "2024-01-01", &[0.0, 0.0]);
        let service = MarketDataService::new(Arc::new(provider));
        let err = service
            .fetch_series("ZERO", &DateRangeConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoData(_)));
    }
}
