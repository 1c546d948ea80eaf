//! High-level stock analyzer for easy library usage

use crate::{
    error::AnalysisError,
    models::{
        align_many, AnalysisSettings, CorrelationMatrix, DivergenceConfig, DivergenceReport,
        PriceSeries, RiskConfig, RiskMatrixRow, SentimentHistoryPoint, SentimentReport,
    },
    services::{
        CachedHistoryProvider, HistoryCache, MarketDataProvider, MarketDataService, YahooClient,
    },
    utils::{
        calculate_correlation_matrix, calculate_risk_matrix, calculate_sentiment,
        sentiment_history, vectorize_returns, DivergenceScanner, Logger, SentimentInputs,
    },
};
use anyhow::Context;
use std::{collections::HashMap, sync::Arc};

/// High-level interface for the portfolio analyses
///
/// Fetches what each analysis needs through one provider and hands the
/// aligned series to the metric calculations.
pub struct StockAnalyzer {
    settings: AnalysisSettings,
    data: MarketDataService,
    cache: Option<HistoryCache>,
    logger: Logger,
}

impl StockAnalyzer {
    /// Yahoo Finance behind the on-disk history cache
    pub fn new(settings: AnalysisSettings) -> anyhow::Result<Self> {
        let client = YahooClient::new(true, settings.rate_limit_per_minute)?;
        let cache = HistoryCache::new(&settings.cache_dir, settings.cache_ttl())?;
        let provider = CachedHistoryProvider::new(client, cache.clone());

        let mut analyzer = Self::with_provider(settings, Arc::new(provider));
        analyzer.cache = Some(cache);
        Ok(analyzer)
    }

    /// Any provider, without a cache of its own
    pub fn with_provider(settings: AnalysisSettings, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            settings,
            data: MarketDataService::new(provider),
            cache: None,
            logger: Logger::new("ANALYZER"),
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn provider(&self) -> Arc<dyn MarketDataProvider> {
        self.data.provider()
    }

    pub fn cache(&self) -> Option<&HistoryCache> {
        self.cache.as_ref()
    }

    pub async fn fetch_series(&self, symbol: &str) -> anyhow::Result<PriceSeries> {
        let series = self
            .data
            .fetch_series(symbol, &self.settings.date_range())
            .await
            .with_context(|| format!("fetching {}", symbol))?;
        Ok(series)
    }

    async fn benchmark_series(&self) -> anyhow::Result<PriceSeries> {
        let benchmark = &self.settings.benchmark;
        self.fetch_series(benchmark)
            .await
            .map_err(|e| AnalysisError::MissingSeries(format!("benchmark {}: {:#}", benchmark, e)).into())
    }

    async fn fetch_many(&self, symbols: &[String]) -> HashMap<String, PriceSeries> {
        self.data
            .fetch_many(symbols, &self.settings.date_range())
            .await
    }

    fn in_order(symbols: &[String], mut fetched: HashMap<String, PriceSeries>) -> Vec<PriceSeries> {
        symbols
            .iter()
            .filter_map(|s| fetched.remove(&s.trim().to_uppercase()))
            .collect()
    }

    /// Divergence of each ticker from the benchmark and, where `sector_etfs`
    /// names one, from its sector ETF. Sorted by |score|, largest first.
    pub async fn analyze_divergence(
        &self,
        tickers: &[String],
        sector_etfs: &HashMap<String, String>,
    ) -> anyhow::Result<Vec<DivergenceReport>> {
        let benchmark = self.benchmark_series().await?;

        let mut symbols = tickers.to_vec();
        for etf in sector_etfs.values() {
            if !symbols.contains(etf) && etf != &benchmark.ticker {
                symbols.push(etf.clone());
            }
        }
        let mut fetched = self.fetch_many(&symbols).await;

        let etf_series: HashMap<String, PriceSeries> = sector_etfs
            .values()
            .filter_map(|etf| fetched.get(etf).map(|s| (etf.clone(), s.clone())))
            .collect();
        fetched.retain(|symbol, _| tickers.iter().any(|t| t.trim().eq_ignore_ascii_case(symbol)));
        let series = Self::in_order(tickers, fetched);

        let scanner = DivergenceScanner::new(DivergenceConfig::from(&self.settings));
        let reports = scanner.scan(&series, &benchmark, sector_etfs, &etf_series);
        self.logger.info(&format!(
            "{} divergence reports, {} flagged",
            reports.len(),
            reports.iter().filter(|r| r.is_flagged()).count()
        ));
        Ok(reports)
    }

    pub async fn risk_matrix(&self, tickers: &[String]) -> anyhow::Result<Vec<RiskMatrixRow>> {
        let benchmark = self.benchmark_series().await?;
        let series = Self::in_order(tickers, self.fetch_many(tickers).await);
        Ok(calculate_risk_matrix(
            &series,
            &benchmark,
            &RiskConfig::from(&self.settings),
        ))
    }

    /// Pairwise correlation over the lookback window on dates shared by every ticker
    pub async fn correlation_matrix(
        &self,
        tickers: &[String],
        include_benchmark: bool,
    ) -> anyhow::Result<CorrelationMatrix> {
        let mut symbols = tickers.to_vec();
        if include_benchmark && !symbols.iter().any(|s| s.eq_ignore_ascii_case(&self.settings.benchmark)) {
            symbols.push(self.settings.benchmark.clone());
        }

        let series = Self::in_order(&symbols, self.fetch_many(&symbols).await);
        let mut frame = align_many(&series);
        if frame.dates.len() > self.settings.lookback_days + 1 {
            let start = frame.dates.len() - (self.settings.lookback_days + 1);
            frame.dates.drain(..start);
            for closes in frame.closes.iter_mut() {
                closes.drain(..start);
            }
        }

        Ok(calculate_correlation_matrix(&vectorize_returns(&frame))?)
    }

    /// Market proxies plus the portfolio, ready for the sentiment calculation
    pub async fn sentiment_inputs(&self, portfolio: &[String]) -> SentimentInputs {
        let symbols = &self.settings.sentiment;
        let mut all = vec![
            symbols.benchmark.clone(),
            symbols.volatility.clone(),
            symbols.bonds.clone(),
            symbols.high_yield.clone(),
            symbols.treasuries.clone(),
        ];
        all.extend(portfolio.iter().cloned());

        let mut fetched = self.fetch_many(&all).await;
        let portfolio_series = portfolio
            .iter()
            .filter_map(|t| fetched.get(&t.trim().to_uppercase()).cloned())
            .collect();
        let mut take = |symbol: &str| fetched.remove(&symbol.to_uppercase());

        SentimentInputs {
            benchmark: take(&symbols.benchmark),
            volatility: take(&symbols.volatility),
            bonds: take(&symbols.bonds),
            high_yield: take(&symbols.high_yield),
            treasuries: take(&symbols.treasuries),
            portfolio: portfolio_series,
        }
    }

    pub async fn sentiment(&self, portfolio: &[String]) -> anyhow::Result<SentimentReport> {
        let inputs = self.sentiment_inputs(portfolio).await;
        Ok(calculate_sentiment(&inputs)?)
    }

    pub async fn sentiment_history(
        &self,
        portfolio: &[String],
        days: usize,
    ) -> anyhow::Result<Vec<SentimentHistoryPoint>> {
        let inputs = self.sentiment_inputs(portfolio).await;
        Ok(sentiment_history(&inputs, days))
    }

    /// Ticker and benchmark series over the configured range
    pub async fn price_comparison(&self, ticker: &str) -> anyhow::Result<(PriceSeries, PriceSeries)> {
        let series = self.fetch_series(ticker).await?;
        let benchmark = self.benchmark_series().await?;
        Ok((series, benchmark))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryProvider;
    use crate::utils::divergence::fixtures::noise;

    fn prices(returns: &[f64]) -> Vec<f64> {
        let mut price = 100.0;
        let mut out = vec![price];
        for r in returns {
            price *= r.exp();
            out.push(price);
        }
        out
    }

    fn exposed(seed: u64, beta: f64, bench: &[f64]) -> Vec<f64> {
        let idio = noise(seed, bench.len());
        let returns: Vec<f64> = bench
            .iter()
            .zip(&idio)
            .map(|(b, e)| beta * b + 0.3 * e)
            .collect();
        prices(&returns)
    }

    fn analyzer() -> StockAnalyzer {
        let bench = noise(40, 320);
        let provider = InMemoryProvider::new()
            .with_closes("SPY", "2023-01-02", &prices(&bench))
            .with_closes("AAPL", "2023-01-02", &exposed(42, 1.2, &bench))
            .with_closes("KO", "2023-01-02", &exposed(43, 0.5, &bench))
            .with_closes("XLK", "2023-01-02", &exposed(44, 1.1, &bench));
        StockAnalyzer::with_provider(AnalysisSettings::default(), Arc::new(provider))
    }

    #[tokio::test]
    async fn test_divergence_includes_sector_comparison() {
        let tickers = vec!["AAPL".to_string(), "KO".to_string()];
        let etfs = HashMap::from([("AAPL".to_string(), "XLK".to_string())]);
        let reports = analyzer().analyze_divergence(&tickers, &etfs).await.unwrap();

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().any(|r| r.ticker == "AAPL" && r.benchmark == "XLK"));
        assert!(reports.iter().all(|r| r.ticker != "XLK"));
    }

    #[tokio::test]
    async fn test_risk_matrix_orders_by_input() {
        let tickers = vec!["KO".to_string(), "AAPL".to_string(), "NOPE".to_string()];
        let rows = analyzer().risk_matrix(&tickers).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker, "KO");
        assert!(rows[0].beta < rows[1].beta);
    }

    #[tokio::test]
    async fn test_correlation_matrix_adds_benchmark() {
        let tickers = vec!["AAPL".to_string(), "KO".to_string()];
        let matrix = analyzer().correlation_matrix(&tickers, true).await.unwrap();
        assert_eq!(matrix.tickers, vec!["AAPL", "KO", "SPY"]);
        assert_eq!(matrix.observations, 252);
    }

    #[tokio::test]
    async fn test_missing_benchmark_is_reported() {
        let settings = AnalysisSettings {
            benchmark: "QQQ".to_string(),
            ..Default::default()
        };
        let analyzer = StockAnalyzer::with_provider(settings, Arc::new(InMemoryProvider::new()));
        let err = analyzer.risk_matrix(&["AAPL".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("QQQ"));
    }

    #[tokio::test]
    async fn test_sentiment_uses_available_proxies() {
        let report = analyzer().sentiment(&["AAPL".to_string(), "KO".to_string()]).await.unwrap();
        let kinds: Vec<_> = report.components.iter().map(|c| c.kind).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&crate::models::SentimentComponentKind::MarketMomentum));
        assert!(kinds.contains(&crate::models::SentimentComponentKind::PortfolioBreadth));
    }
}
