use crate::{
    error::{FetchError, FetchResult},
    models::{CompanyProfile, DateRangeConfig, StockDataPoint},
    services::market_data::{normalize_symbol, MarketDataProvider},
    utils::{trading_date_from_timestamp, Logger},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::{sync::Mutex, time::sleep};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
const RECOMMENDATIONS_URL: &str =
    "https://query2.finance.yahoo.com/v6/finance/recommendationsbysymbol";

const MAX_RETRIES: u32 = 5;
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const RATE_WINDOW: Duration = Duration::from_secs(60);

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

// Chart payload: chart.result[0]

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

// Search payload: quotes[]

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    symbol: String,
    shortname: Option<String>,
    longname: Option<String>,
    exchange: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
}

/// Turn a chart payload into daily bars. Bars with a missing close are skipped.
pub fn parse_chart(symbol: &str, payload: &Value) -> FetchResult<Vec<StockDataPoint>> {
    let envelope: ChartEnvelope = serde_json::from_value(payload.clone())?;

    if let Some(error) = envelope.chart.error.filter(|e| !e.is_null()) {
        let description = error
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("unknown chart error");
        return Err(FetchError::InvalidResponse(format!("{}: {}", symbol, description)));
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::NoData(symbol.to_string()))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut points = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let Some(close) = at(&quote.close, i) else {
            continue;
        };
        let Some(day) = trading_date_from_timestamp(ts) else {
            continue;
        };
        let Some(date) = day.and_hms_opt(0, 0, 0) else {
            continue;
        };

        points.push(StockDataPoint::new(
            symbol.to_string(),
            day.format("%Y-%m-%d").to_string(),
            date.and_utc(),
            at(&quote.open, i).unwrap_or(close),
            at(&quote.high, i).unwrap_or(close),
            at(&quote.low, i).unwrap_or(close),
            close,
            at(&adjclose, i).unwrap_or(close),
            quote.volume.get(i).copied().flatten().unwrap_or(0),
        ));
    }

    if points.is_empty() {
        return Err(FetchError::NoData(symbol.to_string()));
    }

    points.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(points)
}

/// Pick the search hit that matches the symbol exactly
pub fn parse_profile(symbol: &str, payload: &Value) -> FetchResult<CompanyProfile> {
    let envelope: SearchEnvelope = serde_json::from_value(payload.clone())?;
    let quote = envelope
        .quotes
        .into_iter()
        .find(|q| q.symbol.eq_ignore_ascii_case(symbol))
        .ok_or_else(|| FetchError::NoData(symbol.to_string()))?;

    Ok(CompanyProfile {
        symbol: quote.symbol,
        name: quote.longname.or(quote.shortname),
        exchange: quote.exchange,
        sector: quote.sector,
        industry: quote.industry,
    })
}

pub fn parse_peers(payload: &Value) -> Vec<String> {
    payload
        .pointer("/finance/result/0/recommendedSymbols")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("symbol").and_then(|s| s.as_str()))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// HTTP client for the public Yahoo Finance endpoints, with a client-side
/// rate limit and retries on throttling or server errors
pub struct YahooClient {
    client: Client,
    rate_limit_per_minute: u32,
    request_times: Mutex<Vec<Instant>>,
    random_agent: bool,
    logger: Logger,
}

impl YahooClient {
    pub fn new(random_agent: bool, rate_limit_per_minute: u32) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()?;

        Ok(YahooClient {
            client,
            rate_limit_per_minute: rate_limit_per_minute.max(1),
            request_times: Mutex::new(Vec::new()),
            random_agent,
            logger: Logger::new("YAHOO"),
        })
    }

    fn user_agent(&self) -> &'static str {
        if self.random_agent {
            use rand::seq::IndexedRandom;
            USER_AGENTS
                .choose(&mut rand::rng())
                .copied()
                .unwrap_or(USER_AGENTS[0])
        } else {
            USER_AGENTS[0]
        }
    }

    async fn enforce_rate_limit(&self) {
        let mut times = self.request_times.lock().await;
        let now = Instant::now();
        times.retain(|t| now.duration_since(*t) < RATE_WINDOW);

        if times.len() >= self.rate_limit_per_minute as usize {
            if let Some(&oldest) = times.first() {
                let wait = RATE_WINDOW.saturating_sub(now.duration_since(oldest));
                if !wait.is_zero() {
                    self.logger
                        .debug(&format!("Rate limit reached, waiting {:?}", wait));
                    sleep(wait + Duration::from_millis(100)).await;
                }
            }
            let now = Instant::now();
            times.retain(|t| now.duration_since(*t) < RATE_WINDOW);
        }

        times.push(Instant::now());
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> FetchResult<Value> {
        let mut last_error = FetchError::InvalidResponse("Max retries exceeded".to_string());

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_secs_f64(
                    2.0_f64.powi(attempt as i32 - 1) + rand::random::<f64>(),
                )
                .min(MAX_BACKOFF);
                sleep(delay).await;
            }

            self.enforce_rate_limit().await;

            let response = self
                .client
                .get(url)
                .query(query)
                .header("Accept", "application/json, text/plain, */*")
                .header("Accept-Language", "en-US,en;q=0.9")
                .header("User-Agent", self.user_agent())
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.json::<Value>().await {
                            Ok(data) => return Ok(data),
                            Err(e) => last_error = FetchError::Http(e),
                        }
                    } else if status == 403 || status == 429 || status.is_server_error() {
                        self.logger.debug(&format!(
                            "{} returned {} (attempt {}/{})",
                            url,
                            status,
                            attempt + 1,
                            MAX_RETRIES
                        ));
                        last_error = if status == 429 {
                            FetchError::RateLimit
                        } else {
                            FetchError::InvalidResponse(format!("HTTP {}", status))
                        };
                    } else if status == 404 {
                        return Err(FetchError::NoData(url.to_string()));
                    } else {
                        return Err(FetchError::InvalidResponse(format!("HTTP {}", status)));
                    }
                }
                Err(e) => last_error = FetchError::Http(e),
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn history(
        &self,
        symbol: &str,
        range: &DateRangeConfig,
    ) -> FetchResult<Vec<StockDataPoint>> {
        let symbol = normalize_symbol(symbol)?;
        let (start, end) = range.bounds();
        let url = format!("{}/{}", CHART_URL, symbol);
        let query = [
            ("period1", start.timestamp().to_string()),
            ("period2", end.timestamp().to_string()),
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];

        let payload = self.get_json(&url, &query).await?;
        let points = parse_chart(&symbol, &payload)?;
        self.logger
            .debug(&format!("{}: {} bars downloaded", symbol, points.len()));
        Ok(StockDataPoint::filter_by_date_range(points, range))
    }

    async fn profile(&self, symbol: &str) -> FetchResult<CompanyProfile> {
        let symbol = normalize_symbol(symbol)?;
        let query = [
            ("q", symbol.clone()),
            ("quotesCount", "5".to_string()),
            ("newsCount", "0".to_string()),
        ];
        let payload = self.get_json(SEARCH_URL, &query).await?;
        parse_profile(&symbol, &payload)
    }

    async fn peers(&self, symbol: &str) -> FetchResult<Vec<String>> {
        let symbol = normalize_symbol(symbol)?;
        let url = format!("{}/{}", RECOMMENDATIONS_URL, symbol);
        let payload = self.get_json(&url, &[]).await?;
        Ok(parse_peers(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_yahoo_client_creation() {
        let client = YahooClient::new(true, 6);
        assert!(client.is_ok());
    }

    #[test]
    fn test_parse_chart_skips_null_bars() {
        let payload = json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL", "gmtoffset": -14400},
                    "timestamp": [1717767000, 1718026200, 1718112600],
                    "indicators": {
                        "quote": [{
                            "open": [194.6, null, 193.6],
                            "high": [196.9, null, 207.1],
                            "low": [194.1, null, 193.6],
                            "close": [196.9, null, 207.2],
                            "volume": [53103900, null, 172373300]
                        }],
                        "adjclose": [{"adjclose": [196.1, null, 206.4]}]
                    }
                }],
                "error": null
            }
        });

        let points = parse_chart("AAPL", &payload).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].time, "2024-06-07");
        assert_eq!(points[1].time, "2024-06-11");
        assert_eq!(points[1].adj_close, 206.4);
        assert_eq!(points[1].volume, 172373300);
    }

    #[test]
    fn test_parse_chart_error_payload() {
        let payload = json!({
            "chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}
        });
        let err = parse_chart("ZZZZ", &payload).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn test_parse_profile_and_peers() {
        let search = json!({
            "quotes": [
                {"symbol": "AAPL.MX", "shortname": "APPLE INC", "exchange": "MEX"},
                {"symbol": "AAPL", "shortname": "Apple Inc.", "longname": "Apple Inc.",
                 "exchange": "NMS", "sector": "Technology", "industry": "Consumer Electronics"}
            ]
        });
        let profile = parse_profile("AAPL", &search).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Apple Inc."));
        assert_eq!(profile.sector.as_deref(), Some("Technology"));
        assert!(parse_profile("MSFT", &search).is_err());

        let recs = json!({
            "finance": {"result": [{"symbol": "AAPL", "recommendedSymbols": [
                {"symbol": "MSFT", "score": 0.28}, {"symbol": "GOOGL", "score": 0.25}
            ]}], "error": null}
        });
        assert_eq!(parse_peers(&recs), vec!["MSFT", "GOOGL"]);
        assert!(parse_peers(&json!({})).is_empty());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_live_history() {
        let client = YahooClient::new(false, 30).unwrap();
        let points = client
            .history("SPY", &DateRangeConfig::new(crate::models::TimeRange::OneMonth))
            .await
            .unwrap();
        assert!(points.len() > 10);
    }
}
