use crate::{
    error::{FetchError, FetchResult},
    models::{CompanyProfile, DateRangeConfig, RawStockData, StockDataPoint},
    services::market_data::MarketDataProvider,
    utils::Logger,
};
use async_trait::async_trait;
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

/// Per-symbol CSV files under a cache directory; files older than the TTL are discarded
#[derive(Debug, Clone)]
pub struct HistoryCache {
    cache_dir: PathBuf,
    ttl: Duration,
    logger: Logger,
}

impl HistoryCache {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration) -> anyhow::Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;

        let logger = Logger::new("HISTORY_CACHE");
        logger.debug(&format!("Cache directory: {}", cache_dir.display()));

        Ok(Self {
            cache_dir,
            ttl,
            logger,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `^VIX` and `BRK-B` become safe file names
    pub fn file_for(&self, symbol: &str, range: &DateRangeConfig) -> PathBuf {
        let safe: String = symbol
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.cache_dir
            .join(format!("{}_{}.csv", safe, range.cache_key()))
    }

    /// Cached bars, or `None` when the file is missing, expired or unreadable
    pub fn load(&self, symbol: &str, range: &DateRangeConfig) -> Option<Vec<StockDataPoint>> {
        let cache_file = self.file_for(symbol, range);
        let metadata = fs::metadata(&cache_file).ok()?;
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .unwrap_or(Duration::MAX);

        if age > self.ttl {
            self.logger
                .debug(&format!("Cache expired for {}, removing", symbol));
            if let Err(e) = fs::remove_file(&cache_file) {
                self.logger.warn_with_error(
                    &format!("Could not remove expired {}", cache_file.display()),
                    &e,
                );
            }
            return None;
        }

        match self.read_csv(&cache_file, symbol) {
            Ok(points) if !points.is_empty() => {
                self.logger
                    .debug(&format!("Cache HIT: {} ({} points)", symbol, points.len()));
                Some(points)
            }
            Ok(_) => None,
            Err(e) => {
                self.logger
                    .warn(&format!("Failed to read cache for {}: {}", symbol, e));
                None
            }
        }
    }

    pub fn save(
        &self,
        symbol: &str,
        range: &DateRangeConfig,
        points: &[StockDataPoint],
    ) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for point in points {
            writer.serialize(RawStockData::from(point))?;
        }
        let content = writer.into_inner()?;

        let mut file = File::create(self.file_for(symbol, range))?;
        file.write_all(&content)?;
        file.sync_all()?;
        Ok(())
    }

    fn read_csv(&self, path: &Path, symbol: &str) -> anyhow::Result<Vec<StockDataPoint>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut points = Vec::new();
        for row in reader.deserialize() {
            let raw: RawStockData = row?;
            if raw.ticker != symbol {
                continue;
            }
            points.push(raw.to_stock_data_point()?);
        }
        points.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(points)
    }

    /// Remove every cached file, returning how many were deleted
    pub fn clear(&self) -> anyhow::Result<usize> {
        let mut cleared = 0;
        if self.cache_dir.exists() {
            for entry in fs::read_dir(&self.cache_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    fs::remove_file(entry.path())?;
                    cleared += 1;
                }
            }
        }
        self.logger.info(&format!("Cleared {} cached files", cleared));
        Ok(cleared)
    }

    pub fn stats(&self) -> anyhow::Result<CacheStats> {
        let mut stats = CacheStats {
            total_files: 0,
            total_size_bytes: 0,
            cache_dir: self.cache_dir.clone(),
            oldest_file: None,
            newest_file: None,
        };

        if self.cache_dir.exists() {
            for entry in fs::read_dir(&self.cache_dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let metadata = entry.metadata()?;
                let modified = metadata.modified()?;
                stats.total_files += 1;
                stats.total_size_bytes += metadata.len();
                stats.oldest_file = Some(stats.oldest_file.map_or(modified, |o| o.min(modified)));
                stats.newest_file = Some(stats.newest_file.map_or(modified, |n| n.max(modified)));
            }
        }

        Ok(stats)
    }
}

/// Cache statistics structure
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub cache_dir: PathBuf,
    pub oldest_file: Option<SystemTime>,
    pub newest_file: Option<SystemTime>,
}

/// Serves history from the cache and falls back to the wrapped provider
pub struct CachedHistoryProvider<P> {
    inner: P,
    cache: HistoryCache,
}

impl<P: MarketDataProvider> CachedHistoryProvider<P> {
    pub fn new(inner: P, cache: HistoryCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &HistoryCache {
        &self.cache
    }
}

#[async_trait]
impl<P: MarketDataProvider> MarketDataProvider for CachedHistoryProvider<P> {
    async fn history(
        &self,
        symbol: &str,
        range: &DateRangeConfig,
    ) -> FetchResult<Vec<StockDataPoint>> {
        if let Some(points) = self.cache.load(symbol, range) {
            return Ok(points);
        }

        let points = self.inner.history(symbol, range).await?;
        if points.is_empty() {
            return Err(FetchError::NoData(symbol.to_string()));
        }
        if let Err(e) = self.cache.save(symbol, range, &points) {
            self.cache
                .logger
                .warn(&format!("Failed to cache {}: {}", symbol, e));
        }
        Ok(points)
    }

    async fn profile(&self, symbol: &str) -> FetchResult<CompanyProfile> {
        self.inner.profile(symbol).await
    }

    async fn peers(&self, symbol: &str) -> FetchResult<Vec<String>> {
        self.inner.peers(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::market_data::InMemoryProvider;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Counts history calls that reach the wrapped provider
    struct Counting {
        inner: InMemoryProvider,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MarketDataProvider for Counting {
        async fn history(
            &self,
            symbol: &str,
            range: &DateRangeConfig,
        ) -> FetchResult<Vec<StockDataPoint>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.history(symbol, range).await
        }

        async fn profile(&self, symbol: &str) -> FetchResult<CompanyProfile> {
            self.inner.profile(symbol).await
        }

        async fn peers(&self, symbol: &str) -> FetchResult<Vec<String>> {
            self.inner.peers(symbol).await
        }
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Counting {
            inner: InMemoryProvider::new().with_closes("^VIX", "2024-03-01", &[14.0, 15.5, 13.2]),
            calls: Arc::clone(&calls),
        };
        let cache = HistoryCache::new(dir.path(), Duration::from_secs(3600)).unwrap();
        let cached = CachedHistoryProvider::new(provider, cache);
        let range = DateRangeConfig::default();

        let first = cached.history("^VIX", &range).await.unwrap();
        let second = cached.history("^VIX", &range).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert!(cached.cache().file_for("^VIX", &range).ends_with("_VIX_2Y.csv"));

        let stats = cached.cache().stats().unwrap();
        assert_eq!(stats.total_files, 1);
        assert!(stats.total_size_bytes > 0);
        assert_eq!(cached.cache().clear().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_file_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Counting {
            inner: InMemoryProvider::new().with_closes("SPY", "2024-03-01", &[500.0, 501.0]),
            calls: Arc::clone(&calls),
        };
        let cache = HistoryCache::new(dir.path(), Duration::ZERO).unwrap();
        let cached = CachedHistoryProvider::new(provider, cache);
        let range = DateRangeConfig::default();

        cached.history("SPY", &range).await.unwrap();
        std::thread::sleep(Duration::from_millis(20));
        cached.history("SPY", &range).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_expired_entry_is_removed_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HistoryCache::new(dir.path(), Duration::ZERO).unwrap();
        let range = DateRangeConfig::default();

        let file = cache.file_for("SPY", &range);
        fs::write(&file, "time,open,high,low,close,volume,symbol\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.load("SPY", &range).is_none());
        assert!(!file.exists());

        // a directory in the file's place cannot be removed; load still misses
        let stuck = cache.file_for("QQQ", &range);
        fs::create_dir(&stuck).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.load("QQQ", &range).is_none());
        assert!(stuck.exists());
    }
}
