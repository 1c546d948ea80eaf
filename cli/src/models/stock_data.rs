use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDataPoint {
    pub ticker: String,
    pub time: String, // Format: YYYY-MM-DD
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: i64,
}

impl StockDataPoint {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ticker: String,
        time: String,
        date: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        adj_close: f64,
        volume: i64,
    ) -> Self {
        Self {
            ticker,
            time,
            date,
            open,
            high,
            low,
            close,
            adj_close,
            volume,
        }
    }

    /// Price used for return calculations: adjusted close when the provider supplied one
    pub fn analysis_price(&self) -> f64 {
        if self.adj_close > 0.0 && self.adj_close.is_finite() {
            self.adj_close
        } else {
            self.close
        }
    }

    /// Filter data points by date range
    pub fn filter_by_date_range(
        data: Vec<StockDataPoint>,
        config: &DateRangeConfig,
    ) -> Vec<StockDataPoint> {
        match config.range {
            TimeRange::Max => data,
            _ => {
                let (start, end) = config.bounds();
                data.into_iter()
                    .filter(|point| point.date.date_naive() >= start.date_naive())
                    .filter(|point| point.date.date_naive() <= end.date_naive())
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "2Y")]
    TwoYears,
    #[serde(rename = "5Y")]
    FiveYears,
    #[serde(rename = "MAX")]
    Max,
    #[serde(rename = "CUSTOM")]
    Custom,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::OneMonth => "1M",
            TimeRange::ThreeMonths => "3M",
            TimeRange::SixMonths => "6M",
            TimeRange::OneYear => "1Y",
            TimeRange::TwoYears => "2Y",
            TimeRange::FiveYears => "5Y",
            TimeRange::Max => "MAX",
            TimeRange::Custom => "CUSTOM",
        }
    }

    /// Rough number of daily bars a complete download should contain
    pub fn expected_min_points(&self) -> usize {
        match self {
            TimeRange::OneMonth => 20,
            TimeRange::ThreeMonths => 60,
            TimeRange::SixMonths => 120,
            TimeRange::OneYear => 250,
            TimeRange::TwoYears => 500,
            TimeRange::FiveYears => 1250,
            TimeRange::Max => 0,
            TimeRange::Custom => 0,
        }
    }

    fn lookback(&self) -> Option<chrono::Duration> {
        match self {
            TimeRange::OneMonth => Some(chrono::Duration::weeks(5)),
            TimeRange::ThreeMonths => Some(chrono::Duration::weeks(13)),
            TimeRange::SixMonths => Some(chrono::Duration::weeks(26)),
            TimeRange::OneYear => Some(chrono::Duration::weeks(53)),
            TimeRange::TwoYears => Some(chrono::Duration::weeks(105)),
            TimeRange::FiveYears => Some(chrono::Duration::weeks(261)),
            TimeRange::Max | TimeRange::Custom => None,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "1M" => Ok(TimeRange::OneMonth),
            "3M" => Ok(TimeRange::ThreeMonths),
            "6M" => Ok(TimeRange::SixMonths),
            "1Y" => Ok(TimeRange::OneYear),
            "2Y" => Ok(TimeRange::TwoYears),
            "5Y" => Ok(TimeRange::FiveYears),
            "MAX" | "ALL" => Ok(TimeRange::Max),
            "CUSTOM" => Ok(TimeRange::Custom),
            other => Err(format!(
                "unknown range '{}' (expected 1M, 3M, 6M, 1Y, 2Y, 5Y, MAX or CUSTOM)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRangeConfig {
    pub range: TimeRange,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl DateRangeConfig {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            start_date: None,
            end_date: None,
        }
    }

    pub fn custom(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            range: TimeRange::Custom,
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }

    pub fn default_1y() -> Self {
        Self::new(TimeRange::OneYear)
    }

    pub fn default_2y() -> Self {
        Self::new(TimeRange::TwoYears)
    }

    /// Inclusive start and end instants of the range
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        match self.range {
            TimeRange::Custom => (
                self.start_date.unwrap_or_default(),
                self.end_date.unwrap_or(now),
            ),
            TimeRange::Max => (DateTime::<Utc>::default(), now),
            range => {
                let start = range.lookback().map(|d| now - d).unwrap_or_default();
                (start, now)
            }
        }
    }

    /// Stable key used to name cache files
    pub fn cache_key(&self) -> String {
        match self.range {
            TimeRange::Custom => {
                let (start, end) = self.bounds();
                format!("{}_{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
            }
            range => range.as_str().to_string(),
        }
    }
}

impl Default for DateRangeConfig {
    fn default() -> Self {
        Self::default_2y()
    }
}

/// CSV row format used by the on-disk history cache
#[derive(Debug, Serialize, Deserialize)]
pub struct RawStockData {
    pub ticker: String,
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: i64,
}

impl RawStockData {
    /// Convert to StockDataPoint with proper date parsing
    pub fn to_stock_data_point(&self) -> anyhow::Result<StockDataPoint> {
        let naive_date = NaiveDate::parse_from_str(&self.time, "%Y-%m-%d")?;
        let date = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow::anyhow!("Invalid date format"))?
            .and_utc();

        Ok(StockDataPoint::new(
            self.ticker.clone(),
            self.time.clone(),
            date,
            self.open,
            self.high,
            self.low,
            self.close,
            self.adj_close,
            self.volume,
        ))
    }
}

impl From<&StockDataPoint> for RawStockData {
    fn from(point: &StockDataPoint) -> Self {
        Self {
            ticker: point.ticker.clone(),
            time: point.time.clone(),
            open: point.open,
            high: point.high,
            low: point.low,
            close: point.close,
            adj_close: point.adj_close,
            volume: point.volume,
        }
    }
}

/// Daily closing prices of one symbol, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub dates: Vec<String>,
    pub closes: Vec<f64>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, dates: Vec<String>, closes: Vec<f64>) -> Self {
        Self {
            ticker: ticker.into(),
            dates,
            closes,
        }
    }

    /// Build a series from raw bars. Bars are sorted, duplicate dates keep the
    /// last bar and non-positive prices are dropped.
    pub fn from_points(ticker: &str, points: &[StockDataPoint]) -> Self {
        let mut by_date: Vec<(&str, f64)> = points
            .iter()
            .map(|p| (p.time.as_str(), p.analysis_price()))
            .filter(|(_, price)| *price > 0.0 && price.is_finite())
            .collect();
        by_date.sort_by(|a, b| a.0.cmp(b.0));

        let mut dates: Vec<String> = Vec::with_capacity(by_date.len());
        let mut closes: Vec<f64> = Vec::with_capacity(by_date.len());
        for (date, price) in by_date {
            if dates.last().map(|d| d.as_str()) == Some(date) {
                if let Some(last) = closes.last_mut() {
                    *last = price;
                }
                continue;
            }
            dates.push(date.to_string());
            closes.push(price);
        }

        Self::new(ticker, dates, closes)
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last_date(&self) -> Option<&str> {
        self.dates.last().map(|d| d.as_str())
    }

    /// Keep only observations on or before `date`
    pub fn truncate_to(&self, date: &str) -> PriceSeries {
        let cut = self.dates.partition_point(|d| d.as_str() <= date);
        PriceSeries::new(
            self.ticker.clone(),
            self.dates[..cut].to_vec(),
            self.closes[..cut].to_vec(),
        )
    }

    /// Keep the last `n` observations
    pub fn tail(&self, n: usize) -> PriceSeries {
        let start = self.len().saturating_sub(n);
        PriceSeries::new(
            self.ticker.clone(),
            self.dates[start..].to_vec(),
            self.closes[start..].to_vec(),
        )
    }
}

/// Two series joined on their shared dates
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    pub left_ticker: String,
    pub right_ticker: String,
    pub dates: Vec<String>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl AlignedPair {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Keep the last `n` aligned observations
    pub fn tail(&self, n: usize) -> AlignedPair {
        let start = self.len().saturating_sub(n);
        AlignedPair {
            left_ticker: self.left_ticker.clone(),
            right_ticker: self.right_ticker.clone(),
            dates: self.dates[start..].to_vec(),
            left: self.left[start..].to_vec(),
            right: self.right[start..].to_vec(),
        }
    }
}

/// N series joined on the dates present in all of them
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFrame {
    pub tickers: Vec<String>,
    pub dates: Vec<String>,
    /// One column of closes per ticker, same order as `tickers`
    pub closes: Vec<Vec<f64>>,
}

/// Inner join of two series on date
pub fn align_series(left: &PriceSeries, right: &PriceSeries) -> AlignedPair {
    let right_index: HashMap<&str, usize> = right
        .dates
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();

    let mut dates = Vec::new();
    let mut left_values = Vec::new();
    let mut right_values = Vec::new();

    for (i, date) in left.dates.iter().enumerate() {
        if let Some(&j) = right_index.get(date.as_str()) {
            dates.push(date.clone());
            left_values.push(left.closes[i]);
            right_values.push(right.closes[j]);
        }
    }

    AlignedPair {
        left_ticker: left.ticker.clone(),
        right_ticker: right.ticker.clone(),
        dates,
        left: left_values,
        right: right_values,
    }
}

/// Inner join of many series on date
pub fn align_many(series: &[PriceSeries]) -> AlignedFrame {
    let tickers: Vec<String> = series.iter().map(|s| s.ticker.clone()).collect();
    let Some(first) = series.first() else {
        return AlignedFrame {
            tickers,
            dates: Vec::new(),
            closes: Vec::new(),
        };
    };

    let mut shared: HashSet<&str> = first.dates.iter().map(|d| d.as_str()).collect();
    for other in &series[1..] {
        let dates: HashSet<&str> = other.dates.iter().map(|d| d.as_str()).collect();
        shared.retain(|d| dates.contains(d));
    }

    let dates: Vec<String> = first
        .dates
        .iter()
        .filter(|d| shared.contains(d.as_str()))
        .cloned()
        .collect();

    let closes = series
        .iter()
        .map(|s| {
            let index: HashMap<&str, f64> = s
                .dates
                .iter()
                .map(|d| d.as_str())
                .zip(s.closes.iter().copied())
                .collect();
            dates
                .iter()
                .filter_map(|d| index.get(d.as_str()).copied())
                .collect()
        })
        .collect();

    AlignedFrame {
        tickers,
        dates,
        closes,
    }
}
