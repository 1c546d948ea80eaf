//! Command handlers behind the `stockcorr` binary.
//!
//! Each handler prints its table to the given writer and returns the paths
//! of any files it wrote.

use crate::{
    api::StockAnalyzer,
    models::{AnalysisSettings, DivergenceReport},
    render::{self, chart, export, pdf, table, ReportMeta},
    services::{resolve_portfolio_path, AddOutcome, MarketDataProvider, PortfolioManager, RemoveOutcome},
    utils::{market_today, Logger},
};
use anyhow::bail;
use chrono::NaiveDate;
use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use uuid::Uuid;

/// Portfolio store plus the analyzer every command runs through
pub struct Session {
    analyzer: StockAnalyzer,
    portfolio: PortfolioManager,
    today: NaiveDate,
    run_id: Option<Uuid>,
    logger: Logger,
}

impl Session {
    /// Yahoo-backed session over the portfolio at `portfolio_path`
    /// (falling back to `STOCKCORR_PORTFOLIO`, then `config.json`)
    pub fn open(settings: AnalysisSettings, portfolio_path: Option<&Path>) -> anyhow::Result<Self> {
        let analyzer = StockAnalyzer::new(settings)?;
        let path = resolve_portfolio_path(portfolio_path);
        let portfolio = PortfolioManager::load(path, analyzer.provider())?;
        Ok(Self::from_parts(analyzer, portfolio))
    }

    pub fn with_provider(
        settings: AnalysisSettings,
        portfolio_path: &Path,
        provider: Arc<dyn MarketDataProvider>,
    ) -> anyhow::Result<Self> {
        let analyzer = StockAnalyzer::with_provider(settings, Arc::clone(&provider));
        let portfolio = PortfolioManager::load(portfolio_path, provider)?;
        Ok(Self::from_parts(analyzer, portfolio))
    }

    fn from_parts(analyzer: StockAnalyzer, portfolio: PortfolioManager) -> Self {
        Self {
            analyzer,
            portfolio,
            today: market_today(),
            run_id: None,
            logger: Logger::new("COMMAND"),
        }
    }

    /// Stamp output files with `date` instead of today
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.today = date;
        self
    }

    /// Tag reports written from now on with a batch run's id
    pub fn set_run_id(&mut self, run_id: Uuid) {
        self.run_id = Some(run_id);
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    fn report_meta(&self, title: &str) -> ReportMeta {
        let meta = ReportMeta::new(title, &self.analyzer.settings().benchmark);
        match self.run_id {
            Some(run_id) => meta.with_run_id(run_id),
            None => meta,
        }
    }

    pub fn analyzer(&self) -> &StockAnalyzer {
        &self.analyzer
    }

    pub fn portfolio(&self) -> &PortfolioManager {
        &self.portfolio
    }

    pub fn portfolio_mut(&mut self) -> &mut PortfolioManager {
        &mut self.portfolio
    }

    fn output(&self, kind: &str, ticker: Option<&str>, ext: &str) -> anyhow::Result<PathBuf> {
        render::output_path(&self.analyzer.settings().output_dir, kind, ticker, self.today, ext)
    }

    /// Explicit tickers win; otherwise the portfolio holdings
    fn targets(&self, tickers: &[String]) -> anyhow::Result<Vec<String>> {
        let targets: Vec<String> = if tickers.is_empty() {
            self.portfolio.tickers().to_vec()
        } else {
            tickers.iter().map(|t| t.trim().to_uppercase()).collect()
        };
        if targets.is_empty() {
            bail!(
                "no tickers given and the portfolio at {} is empty; add some with `stockcorr portfolio add`",
                self.portfolio.path().display()
            );
        }
        Ok(targets)
    }

    pub async fn portfolio_add<W: Write>(&mut self, tickers: &[String], out: &mut W) -> anyhow::Result<()> {
        for ticker in tickers {
            match self.portfolio.add_ticker(ticker).await? {
                AddOutcome::Added(info) => {
                    writeln!(out, "Added {} to portfolio", info.ticker)?;
                    writeln!(out, "{}", table::stock_info_table(&[info]))?;
                }
                AddOutcome::AlreadyPresent => {
                    writeln!(out, "{} is already in portfolio", ticker.trim().to_uppercase())?
                }
            }
        }
        Ok(())
    }

    pub fn portfolio_remove<W: Write>(&mut self, tickers: &[String], out: &mut W) -> anyhow::Result<()> {
        for ticker in tickers {
            let ticker = ticker.trim().to_uppercase();
            match self.portfolio.remove_ticker(&ticker)? {
                RemoveOutcome::Removed => writeln!(out, "Removed {} from portfolio", ticker)?,
                RemoveOutcome::NotFound => writeln!(out, "{} not found in portfolio", ticker)?,
            }
        }
        Ok(())
    }

    pub async fn portfolio_list<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        self.portfolio.write_listing(out).await
    }

    pub async fn portfolio_update<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        let updated = self.portfolio.update_all().await?;
        writeln!(out, "Updated {} stocks", updated)?;
        Ok(())
    }

    pub fn portfolio_export<W: Write>(&self, out: &mut W) -> anyhow::Result<PathBuf> {
        let path = self.portfolio.export()?;
        writeln!(out, "Exported to {}", path.display())?;
        Ok(path)
    }

    pub async fn portfolio_menu<R: BufRead, W: Write>(&mut self, input: R, out: W) -> anyhow::Result<()> {
        self.portfolio.interactive_menu(input, out).await
    }

    /// Stored company info, fetched on first use
    pub async fn info<W: Write>(&mut self, ticker: &str, out: &mut W) -> anyhow::Result<()> {
        let info = self.portfolio.info_store_mut().get_info(ticker).await?;
        writeln!(out, "{}", table::stock_info_table(&[info]))?;
        Ok(())
    }

    /// Divergence from the benchmark and sector ETFs, with optional charts
    pub async fn divergence<W: Write>(
        &mut self,
        tickers: &[String],
        charts: bool,
        out: &mut W,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let targets = self.targets(tickers)?;
        let store = self.portfolio.info_store_mut();
        if let Err(e) = store.update_portfolio(&targets, false).await {
            self.logger
                .warn(&format!("Sector lookup incomplete, comparing to benchmark only: {:#}", e));
        }
        let sector_etfs = self.portfolio.info_store().sector_etfs(&targets);

        let reports = self.analyzer.analyze_divergence(&targets, &sector_etfs).await?;
        if reports.is_empty() {
            writeln!(out, "No ticker had enough history for a divergence estimate")?;
            return Ok(Vec::new());
        }
        writeln!(out, "{}", table::divergence_table(&reports))?;

        let mut written = vec![self.output("divergence", None, "csv")?];
        export::divergence_csv(&reports, &written[0])?;

        if charts {
            for report in reports.iter().filter(|r| r.benchmark == self.analyzer.settings().benchmark) {
                written.extend(self.divergence_charts(report)?);
            }
        }

        self.report_written(&written, out)?;
        Ok(written)
    }

    fn divergence_charts(&self, report: &DivergenceReport) -> anyhow::Result<Vec<PathBuf>> {
        let path = self.output("divergence", Some(&report.ticker), "svg")?;
        chart::divergence_chart(report, &path)?;
        let mut written = vec![path];

        if !report.rolling_correlation.is_empty() {
            let path = self.output("rolling_correlation", Some(&report.ticker), "svg")?;
            chart::rolling_correlation_chart(report, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Risk matrix over the portfolio, optionally as PDF and CSV
    pub async fn risk_matrix<W: Write>(&self, with_pdf: bool, with_csv: bool, out: &mut W) -> anyhow::Result<Vec<PathBuf>> {
        let targets = self.targets(&[])?;
        let rows = self.analyzer.risk_matrix(&targets).await?;
        if rows.is_empty() {
            writeln!(out, "No ticker had enough history for the risk matrix")?;
            return Ok(Vec::new());
        }
        writeln!(out, "{}", table::risk_matrix_table(&rows))?;

        let mut written = Vec::new();
        if with_pdf {
            let meta = self.report_meta("Portfolio Risk Matrix");
            let path = self.output("risk_matrix", None, "pdf")?;
            pdf::risk_matrix_pdf(&rows, &meta, &path)?;
            written.push(path);
        }
        if with_csv {
            let path = self.output("risk_matrix", None, "csv")?;
            export::risk_matrix_csv(&rows, &path)?;
            written.push(path);
        }

        self.report_written(&written, out)?;
        Ok(written)
    }

    /// Pairwise correlation, benchmark included, with an optional heatmap
    pub async fn correlation<W: Write>(&self, tickers: &[String], heatmap: bool, out: &mut W) -> anyhow::Result<Vec<PathBuf>> {
        let targets = self.targets(tickers)?;
        let matrix = self.analyzer.correlation_matrix(&targets, true).await?;
        writeln!(out, "{}", table::correlation_table(&matrix))?;
        writeln!(out, "{} shared returns", matrix.observations)?;

        let mut written = vec![self.output("correlation", None, "csv")?];
        export::correlation_csv(&matrix, &written[0])?;
        if heatmap {
            let path = self.output("correlation_heatmap", None, "svg")?;
            chart::correlation_heatmap(&matrix, &path)?;
            written.push(path);
        }

        self.report_written(&written, out)?;
        Ok(written)
    }

    /// Today's fear-greed score, plus a trailing history when `history` is set
    pub async fn sentiment<W: Write>(&self, history: Option<usize>, with_chart: bool, out: &mut W) -> anyhow::Result<Vec<PathBuf>> {
        let portfolio = self.portfolio.tickers();
        let report = self.analyzer.sentiment(portfolio).await?;
        writeln!(out, "{}", table::sentiment_table(&report))?;

        let days = match (history, with_chart) {
            (Some(days), _) => days,
            (None, true) => DEFAULT_SENTIMENT_HISTORY,
            (None, false) => return Ok(Vec::new()),
        };

        let points = self.analyzer.sentiment_history(portfolio, days).await?;
        let mut written = vec![self.output("sentiment_history", None, "csv")?];
        export::sentiment_history_csv(&points, &written[0])?;
        if with_chart && !points.is_empty() {
            let path = self.output("sentiment", None, "svg")?;
            chart::sentiment_chart(&points, &path)?;
            written.push(path);
        }

        self.report_written(&written, out)?;
        Ok(written)
    }

    /// Ticker against the benchmark, both rebased to 100
    pub async fn chart<W: Write>(&self, ticker: &str, out: &mut W) -> anyhow::Result<PathBuf> {
        let (series, benchmark) = self.analyzer.price_comparison(ticker).await?;
        let path = self.output("price", Some(&series.ticker), "svg")?;
        chart::normalized_price_chart(&series, &benchmark, &path)?;
        self.report_written(std::slice::from_ref(&path), out)?;
        Ok(path)
    }

    pub fn cache_clear<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        let Some(cache) = self.analyzer.cache() else {
            writeln!(out, "No history cache configured")?;
            return Ok(());
        };
        let removed = cache.clear()?;
        writeln!(out, "Removed {} cached files from {}", removed, cache.cache_dir().display())?;
        Ok(())
    }

    pub fn cache_stats<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        let Some(cache) = self.analyzer.cache() else {
            writeln!(out, "No history cache configured")?;
            return Ok(());
        };
        let stats = cache.stats()?;
        writeln!(out, "Cache directory: {}", stats.cache_dir.display())?;
        writeln!(out, "Files: {}", stats.total_files)?;
        writeln!(out, "Size: {:.1} KB", stats.total_size_bytes as f64 / 1024.0)?;
        Ok(())
    }

    fn report_written<W: Write>(&self, paths: &[PathBuf], out: &mut W) -> anyhow::Result<()> {
        for path in paths {
            writeln!(out, "Wrote {}", path.display())?;
        }
        Ok(())
    }
}

/// Trading days of sentiment history drawn when only `--chart` is given
pub const DEFAULT_SENTIMENT_HISTORY: usize = 90;

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

    fn session(dir: &Path) -> Session {
        let bench = noise(7, 300);
        let stock: Vec<f64> = bench.iter().zip(noise(8, 300)).map(|(b, e)| 1.3 * b + 0.5 * e).collect();
        let provider = InMemoryProvider::new()
            .with_closes("SPY", "2023-01-02", &prices(&bench))
            .with_closes("AMD", "2023-01-02", &prices(&stock));
        let settings = AnalysisSettings {
            output_dir: dir.join("reports"),
            ..Default::default()
        };
        Session::with_provider(settings, &dir.join("config.json"), Arc::new(provider))
            .unwrap()
            .with_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    #[test]
    fn test_report_meta_carries_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let standalone = session.report_meta("Portfolio Risk Matrix");
        assert_eq!(standalone.benchmark, "SPY");

        let run_id = Uuid::new_v4();
        session.set_run_id(run_id);
        assert_ne!(standalone.run_id, run_id);
        assert_eq!(session.report_meta("Portfolio Risk Matrix").run_id, run_id);
    }

    #[tokio::test]
    async fn test_empty_portfolio_without_tickers_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let mut out = Vec::new();
        let err = session.risk_matrix(false, false, &mut out).await.unwrap_err();
        assert!(err.to_string().contains("portfolio"));
    }

    #[tokio::test]
    async fn test_divergence_writes_csv_and_charts() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let mut out = Vec::new();

        let written = session
            .divergence(&["amd".to_string()], true, &mut out)
            .await
            .unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "divergence_20240301.csv",
                "divergence_AMD_20240301.svg",
                "rolling_correlation_AMD_20240301.svg"
            ]
        );
        assert!(String::from_utf8(out).unwrap().contains("AMD"));
    }

    #[tokio::test]
    async fn test_chart_names_file_by_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let mut out = Vec::new();
        let path = session.chart("AMD", &mut out).await.unwrap();
        assert!(path.ends_with("reports/price_AMD_20240301.svg"));
        assert!(path.exists());
    }

    #[test]
    fn test_cache_commands_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let mut out = Vec::new();
        session.cache_stats(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No history cache configured\n");
    }
}
