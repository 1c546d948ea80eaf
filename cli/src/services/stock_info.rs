use crate::{
    models::{StockInfo, UNKNOWN},
    services::market_data::{normalize_symbol, MarketDataProvider},
    utils::Logger,
};
use anyhow::Context;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

pub const STOCK_INFO_FILE: &str = "stock_info.json";
pub const READABLE_EXPORT_FILE: &str = "stock_info_readable.json";
/// Stored info older than this is refreshed by [`StockInfoManager::update_portfolio`]
pub const STALE_AFTER_DAYS: i64 = 7;

#[derive(Debug, Serialize)]
struct ReadableEntry<'a> {
    company: &'a str,
    industry: &'a str,
    sector_etf: &'a str,
    peers: &'a [String],
    updated: String,
}

/// JSON-backed store of company details, keyed by ticker
pub struct StockInfoManager {
    path: PathBuf,
    provider: Arc<dyn MarketDataProvider>,
    entries: BTreeMap<String, StockInfo>,
    logger: Logger,
}

impl StockInfoManager {
    /// Open the store at `path`; a missing file starts empty
    pub fn load(path: impl Into<PathBuf>, provider: Arc<dyn MarketDataProvider>) -> anyhow::Result<Self> {
        let path = path.into();
        let logger = Logger::new("STOCK_INFO");

        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        logger.debug(&format!("{} entries loaded from {}", entries.len(), path.display()));

        Ok(Self {
            path,
            provider,
            entries,
            logger,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    /// Stored info without touching the network
    pub fn info(&self, ticker: &str) -> Option<&StockInfo> {
        self.entries.get(ticker)
    }

    /// Stored info, fetched and persisted when missing
    pub async fn get_info(&mut self, ticker: &str) -> anyhow::Result<StockInfo> {
        let ticker = normalize_symbol(ticker)?;
        if let Some(info) = self.entries.get(&ticker) {
            return Ok(info.clone());
        }
        self.update_ticker(&ticker).await
    }

    /// Fetch profile and peers and persist the result. A failed profile
    /// lookup keeps an existing entry untouched, and only a ticker with no
    /// entry yet gets placeholder fields.
    pub async fn update_ticker(&mut self, ticker: &str) -> anyhow::Result<StockInfo> {
        let ticker = normalize_symbol(ticker)?;

        let profile = match self.provider.profile(&ticker).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                if let Some(existing) = self.entries.get(&ticker) {
                    self.logger.warn_with_error(
                        &format!("Refresh of {} failed, keeping stored info", ticker),
                        &e,
                    );
                    return Ok(existing.clone());
                }
                self.logger
                    .warn_with_error(&format!("No profile for {}", ticker), &e);
                None
            }
        };

        let peers = match self.provider.peers(&ticker).await {
            Ok(peers) => peers,
            Err(e) => {
                self.logger
                    .debug(&format!("No peers for {}: {}", ticker, e));
                Vec::new()
            }
        };

        let info = StockInfo::from_profile(&ticker, profile, peers);
        self.entries.insert(ticker.clone(), info.clone());
        self.save()?;
        self.logger.info(&format!(
            "{}: {} ({}, {})",
            ticker, info.company, info.sector, info.sector_etf
        ));
        Ok(info)
    }

    /// Refresh tickers that are missing or stale, or every ticker when `force` is set.
    /// Returns how many were refreshed.
    pub async fn update_portfolio(&mut self, tickers: &[String], force: bool) -> anyhow::Result<usize> {
        let max_age = chrono::Duration::days(STALE_AFTER_DAYS);
        let mut updated = 0;

        for ticker in tickers {
            let needs_update = force
                || self
                    .entries
                    .get(ticker)
                    .map(|info| info.is_stale(max_age))
                    .unwrap_or(true);
            if needs_update {
                self.update_ticker(ticker).await?;
                updated += 1;
            }
        }

        Ok(updated)
    }

    pub fn remove(&mut self, ticker: &str) -> anyhow::Result<bool> {
        let removed = self.entries.remove(ticker).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Ticker to sector ETF for tickers whose sector is known
    pub fn sector_etfs(&self, tickers: &[String]) -> HashMap<String, String> {
        tickers
            .iter()
            .filter_map(|t| self.entries.get(t))
            .filter(|info| info.has_sector())
            .map(|info| (info.ticker.clone(), info.sector_etf.clone()))
            .collect()
    }

    /// Write a sector-grouped copy of the store next to it and return its path
    pub fn export_readable(&self) -> anyhow::Result<PathBuf> {
        let mut grouped: BTreeMap<&str, BTreeMap<&str, ReadableEntry>> = BTreeMap::new();
        for info in self.entries.values() {
            let sector = if info.sector.is_empty() { UNKNOWN } else { info.sector.as_str() };
            grouped.entry(sector).or_default().insert(
                info.ticker.as_str(),
                ReadableEntry {
                    company: &info.company,
                    industry: &info.industry,
                    sector_etf: &info.sector_etf,
                    peers: &info.peers,
                    updated: info.updated_at.format("%Y-%m-%d").to_string(),
                },
            );
        }

        let out = self.path.with_file_name(READABLE_EXPORT_FILE);
        fs::write(&out, serde_json::to_string_pretty(&grouped)?)
            .with_context(|| format!("writing {}", out.display()))?;
        self.logger
            .info(&format!("Exported {} tickers to {}", self.entries.len(), out.display()));
        Ok(out)
    }
}
