use crate::{
    models::{PortfolioConfig, StockInfo},
    render::table,
    services::{
        market_data::{normalize_symbol, MarketDataProvider},
        stock_info::{StockInfoManager, STOCK_INFO_FILE},
    },
    utils::Logger,
};
use anyhow::Context;
use std::{
    fs,
    io::{BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

pub const DEFAULT_PORTFOLIO_FILE: &str = "config.json";
pub const PORTFOLIO_ENV: &str = "STOCKCORR_PORTFOLIO";
/// Peers shown per ticker in listings
pub const LISTED_PEERS: usize = 5;

/// `--portfolio` flag, then `STOCKCORR_PORTFOLIO`, then `config.json`
pub fn resolve_portfolio_path(flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PORTFOLIO_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PORTFOLIO_FILE))
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(StockInfo),
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// One listed holding; info is missing until it has been fetched
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioEntry {
    pub ticker: String,
    pub info: Option<StockInfo>,
}

/// The watched tickers plus their stored company details
pub struct PortfolioManager {
    path: PathBuf,
    config: PortfolioConfig,
    info: StockInfoManager,
    logger: Logger,
}

impl PortfolioManager {
    /// Open the portfolio file, creating it with an empty list when missing.
    /// The stock info store lives next to it.
    pub fn load(path: impl Into<PathBuf>, provider: Arc<dyn MarketDataProvider>) -> anyhow::Result<Self> {
        let path = path.into();
        let logger = Logger::new("PORTFOLIO");

        let (config, created) = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: PortfolioConfig = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            (config, false)
        } else {
            (PortfolioConfig::default(), true)
        };

        let info = StockInfoManager::load(path.with_file_name(STOCK_INFO_FILE), provider)?;
        let manager = Self {
            path,
            config,
            info,
            logger,
        };

        if created {
            manager.save()?;
            manager
                .logger
                .info(&format!("Created new portfolio file at {}", manager.path.display()));
        }

        Ok(manager)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tickers(&self) -> &[String] {
        self.config.stocks()
    }

    pub fn info_store(&self) -> &StockInfoManager {
        &self.info
    }

    pub fn info_store_mut(&mut self) -> &mut StockInfoManager {
        &mut self.info
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.config)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))?;
        self.logger.debug(&format!("Saved {}", self.path.display()));
        Ok(())
    }

    pub async fn add_ticker(&mut self, ticker: &str) -> anyhow::Result<AddOutcome> {
        let ticker = normalize_symbol(ticker)?;
        if self.config.contains(&ticker) {
            return Ok(AddOutcome::AlreadyPresent);
        }

        let info = self.info.update_ticker(&ticker).await?;
        self.config.portfolio.stocks.push(ticker);
        self.save()?;
        Ok(AddOutcome::Added(info))
    }

    pub fn remove_ticker(&mut self, ticker: &str) -> anyhow::Result<RemoveOutcome> {
        let ticker = ticker.trim().to_uppercase();
        let before = self.config.portfolio.stocks.len();
        self.config.portfolio.stocks.retain(|t| t != &ticker);

        if self.config.portfolio.stocks.len() == before {
            return Ok(RemoveOutcome::NotFound);
        }
        self.save()?;
        Ok(RemoveOutcome::Removed)
    }

    /// Holdings in file order. Info missing from the store is fetched and persisted;
    /// a ticker whose lookup fails is listed without info.
    pub async fn list_portfolio(&mut self) -> Vec<PortfolioEntry> {
        let tickers = self.tickers().to_vec();
        let mut entries = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let info = match self.info.get_info(&ticker).await {
                Ok(info) => Some(info),
                Err(e) => {
                    self.logger
                        .warn(&format!("No info for {}: {:#}", ticker, e));
                    None
                }
            };
            entries.push(PortfolioEntry { ticker, info });
        }
        entries
    }

    /// Force-refresh every holding's info; returns how many were refreshed
    pub async fn update_all(&mut self) -> anyhow::Result<usize> {
        let tickers = self.tickers().to_vec();
        if tickers.is_empty() {
            return Ok(0);
        }
        self.logger.info(&format!("Updating {} stocks", tickers.len()));
        self.info.update_portfolio(&tickers, true).await
    }

    /// Fill in info that is missing or older than a week
    pub async fn refresh_stale(&mut self) -> anyhow::Result<usize> {
        let tickers = self.tickers().to_vec();
        self.info.update_portfolio(&tickers, false).await
    }

    pub fn export(&self) -> anyhow::Result<PathBuf> {
        self.info.export_readable()
    }

    /// Numbered menu over a reader and writer: 1 list, 2 add, 3 remove,
    /// 4 update all, 5 export, 6 exit. End of input exits.
    pub async fn interactive_menu<R: BufRead, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> anyhow::Result<()> {
        loop {
            writeln!(writer)?;
            writeln!(writer, "{}", "=".repeat(50))?;
            writeln!(writer, "PORTFOLIO MANAGER")?;
            writeln!(writer, "{}", "=".repeat(50))?;
            writeln!(writer, "1. List portfolio")?;
            writeln!(writer, "2. Add ticker")?;
            writeln!(writer, "3. Remove ticker")?;
            writeln!(writer, "4. Update all stock info")?;
            writeln!(writer, "5. Export stock info")?;
            writeln!(writer, "6. Exit")?;
            write!(writer, "\nSelect option (1-6): ")?;
            writer.flush()?;

            let Some(choice) = read_line(&mut reader)? else {
                break;
            };

            match choice.as_str() {
                "1" => self.write_listing(&mut writer).await?,
                "2" => {
                    write!(writer, "Enter ticker to add: ")?;
                    writer.flush()?;
                    let Some(ticker) = read_line(&mut reader)? else {
                        break;
                    };
                    match self.add_ticker(&ticker).await {
                        Ok(AddOutcome::Added(info)) => {
                            writeln!(writer, "Added {} to portfolio", info.ticker)?;
                            writeln!(writer, "{}", table::stock_info_table(&[info]))?;
                        }
                        Ok(AddOutcome::AlreadyPresent) => {
                            writeln!(writer, "{} is already in portfolio", ticker.to_uppercase())?
                        }
                        Err(e) => writeln!(writer, "Could not add {}: {}", ticker, e)?,
                    }
                }
                "3" => {
                    write!(writer, "Enter ticker to remove: ")?;
                    writer.flush()?;
                    let Some(ticker) = read_line(&mut reader)? else {
                        break;
                    };
                    match self.remove_ticker(&ticker)? {
                        RemoveOutcome::Removed => {
                            writeln!(writer, "Removed {} from portfolio", ticker.to_uppercase())?
                        }
                        RemoveOutcome::NotFound => {
                            writeln!(writer, "{} not found in portfolio", ticker.to_uppercase())?
                        }
                    }
                }
                "4" => {
                    if self.tickers().is_empty() {
                        writeln!(writer, "Portfolio is empty")?;
                    } else {
                        let updated = self.update_all().await?;
                        writeln!(writer, "Updated {} stocks", updated)?;
                    }
                }
                "5" => {
                    let out = self.export()?;
                    writeln!(writer, "Exported to {}", out.display())?;
                }
                "6" => {
                    writeln!(writer, "Goodbye!")?;
                    break;
                }
                _ => writeln!(writer, "Invalid option")?,
            }
        }

        Ok(())
    }

    pub async fn write_listing<W: Write>(&mut self, writer: &mut W) -> anyhow::Result<()> {
        let entries = self.list_portfolio().await;
        if entries.is_empty() {
            writeln!(writer, "Portfolio is empty")?;
        } else {
            writeln!(writer, "{}", table::portfolio_table(&entries))?;
        }
        Ok(())
    }
}

/// Next trimmed line, or `None` at end of input
fn read_line<R: BufRead>(reader: &mut R) -> anyhow::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompanyProfile;
    use crate::services::market_data::InMemoryProvider;
    use std::io::Cursor;

    fn provider() -> Arc<dyn MarketDataProvider> {
        Arc::new(InMemoryProvider::new().with_profile(
            CompanyProfile {
                symbol: "NVDA".into(),
                name: Some("NVIDIA Corporation".into()),
                sector: Some("Technology".into()),
                industry: Some("Semiconductors".into()),
                ..Default::default()
            },
            &["AMD", "INTC", "AVGO", "QCOM", "TXN", "MU"],
        ))
    }

    #[test]
    fn test_missing_file_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let manager = PortfolioManager::load(&path, provider()).unwrap();

        assert!(manager.tickers().is_empty());
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, serde_json::json!({"portfolio": {"stocks": []}}));
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut manager = PortfolioManager::load(&path, provider()).unwrap();

        match manager.add_ticker("nvda").await.unwrap() {
            AddOutcome::Added(info) => {
                assert_eq!(info.company, "NVIDIA Corporation");
                assert_eq!(info.sector_etf, "XLK");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(manager.add_ticker("NVDA").await.unwrap(), AddOutcome::AlreadyPresent);
        assert!(manager.add_ticker("not valid").await.is_err());

        let mut reloaded = PortfolioManager::load(&path, provider()).unwrap();
        assert_eq!(reloaded.tickers(), ["NVDA".to_string()]);
        assert!(reloaded.list_portfolio().await[0].info.is_some());

        assert_eq!(manager.remove_ticker("nvda").unwrap(), RemoveOutcome::Removed);
        assert_eq!(manager.remove_ticker("NVDA").unwrap(), RemoveOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_listing_fetches_info_missing_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"portfolio": {"stocks": ["NVDA"]}}"#).unwrap();
        assert!(!dir.path().join(STOCK_INFO_FILE).exists());

        let mut manager = PortfolioManager::load(&path, provider()).unwrap();
        let entries = manager.list_portfolio().await;
        assert_eq!(entries.len(), 1);
        let info = entries[0].info.as_ref().unwrap();
        assert_eq!(info.company, "NVIDIA Corporation");
        assert_eq!(info.sector_etf, "XLK");
        assert!(dir.path().join(STOCK_INFO_FILE).exists());

        let mut output = Vec::new();
        manager.write_listing(&mut output).await.unwrap();
        assert!(String::from_utf8(output).unwrap().contains("NVDA"));
    }

    #[tokio::test]
    async fn test_interactive_menu_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = PortfolioManager::load(dir.path().join("config.json"), provider()).unwrap();

        let script = "1\n2\nnvda\n9\n4\n5\n3\nNVDA\n1\n6\n";
        let mut output = Vec::new();
        manager
            .interactive_menu(Cursor::new(script), &mut output)
            .await
            .unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("Portfolio is empty"));
        assert!(output.contains("Added NVDA to portfolio"));
        assert!(output.contains("Invalid option"));
        assert!(output.contains("Updated 1 stocks"));
        assert!(output.contains("stock_info_readable.json"));
        assert!(output.contains("Removed NVDA from portfolio"));
        assert!(output.ends_with("Goodbye!\n"));
        assert!(manager.tickers().is_empty());
    }

    #[tokio::test]
    async fn test_menu_exits_on_end_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = PortfolioManager::load(dir.path().join("config.json"), provider()).unwrap();
        let mut output = Vec::new();
        manager
            .interactive_menu(Cursor::new("1\n"), &mut output)
            .await
            .unwrap();
        assert!(String::from_utf8(output).unwrap().contains("Select option"));
    }

    #[test]
    fn test_resolve_portfolio_path_prefers_flag() {
        let flag = PathBuf::from("/tmp/mine.json");
        assert_eq!(resolve_portfolio_path(Some(&flag)), flag);
    }
}
