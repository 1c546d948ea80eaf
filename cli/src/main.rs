use stockcorr::{commands::Session, models::AnalysisSettings, utils::init_logger};

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stockcorr")]
#[command(about = "Portfolio research: correlation, beta, divergence, risk matrix and fear-greed sentiment")]
pub struct Cli {
    /// Portfolio file (defaults to $STOCKCORR_PORTFOLIO, then config.json)
    #[arg(long, global = true)]
    pub portfolio: Option<PathBuf>,

    /// Benchmark symbol
    #[arg(long, global = true)]
    pub benchmark: Option<String>,

    /// Trading days in the estimation window
    #[arg(long, global = true)]
    pub lookback: Option<usize>,

    /// Directory for charts, PDFs and CSV files
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the tickers in the portfolio
    Portfolio {
        #[command(subcommand)]
        action: PortfolioAction,
    },
    /// Show company, sector and peers for a ticker
    Info {
        ticker: String,
    },
    /// Compare recent returns with the beta-implied path
    Divergence {
        /// Tickers to scan (defaults to the portfolio)
        tickers: Vec<String>,
        /// Trading days in the divergence window
        #[arg(short, long)]
        window: Option<usize>,
        /// Write divergence and rolling correlation charts
        #[arg(long)]
        chart: bool,
    },
    /// Beta, volatility and conditional correlation for every holding
    RiskMatrix {
        /// Write a PDF report
        #[arg(long)]
        pdf: bool,
        /// Write a CSV export
        #[arg(long)]
        csv: bool,
    },
    /// Pairwise correlation matrix including the benchmark
    Correlation {
        /// Tickers to correlate (defaults to the portfolio)
        tickers: Vec<String>,
        /// Write a heatmap
        #[arg(long)]
        chart: bool,
    },
    /// Fear-greed score from market proxies and portfolio breadth
    Sentiment {
        /// Trading days of score history to compute
        #[arg(long)]
        history: Option<usize>,
        /// Write a history chart
        #[arg(long)]
        chart: bool,
    },
    /// Price chart against the benchmark, both rebased to 100
    Chart {
        ticker: String,
    },
    /// Inspect or clear the price history cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum PortfolioAction {
    /// Add tickers and fetch their company info
    Add { tickers: Vec<String> },
    /// Remove tickers
    Remove { tickers: Vec<String> },
    /// List holdings with sector and peers
    List,
    /// Refresh company info for every holding
    Update,
    /// Write the stock info grouped by sector
    Export,
    /// Interactive numbered menu
    Menu,
}

#[derive(Subcommand)]
pub enum CacheAction {
    Clear,
    Stats,
}

impl Cli {
    /// Environment settings with command-line flags on top
    fn settings(&self) -> AnalysisSettings {
        let mut settings = AnalysisSettings::from_env();
        if let Some(benchmark) = &self.benchmark {
            settings.benchmark = benchmark.trim().to_uppercase();
        }
        if let Some(lookback) = self.lookback {
            settings.lookback_days = lookback;
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Commands::Divergence { window: Some(window), .. } = self.command {
            settings.recent_window = window;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logger()?;

    let cli = Cli::parse();
    let mut session = Session::open(cli.settings(), cli.portfolio.as_deref())?;
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Portfolio { action } => match action {
            PortfolioAction::Add { tickers } => session.portfolio_add(&tickers, &mut out).await?,
            PortfolioAction::Remove { tickers } => session.portfolio_remove(&tickers, &mut out)?,
            PortfolioAction::List => session.portfolio_list(&mut out).await?,
            PortfolioAction::Update => session.portfolio_update(&mut out).await?,
            PortfolioAction::Export => {
                session.portfolio_export(&mut out)?;
            }
            PortfolioAction::Menu => {
                session.portfolio_menu(io::stdin().lock(), &mut out).await?
            }
        },
        Commands::Info { ticker } => session.info(&ticker, &mut out).await?,
        Commands::Divergence { tickers, chart, .. } => {
            session.divergence(&tickers, chart, &mut out).await?;
        }
        Commands::RiskMatrix { pdf, csv } => {
            session.risk_matrix(pdf, csv, &mut out).await?;
        }
        Commands::Correlation { tickers, chart } => {
            session.correlation(&tickers, chart, &mut out).await?;
        }
        Commands::Sentiment { history, chart } => {
            session.sentiment(history, chart, &mut out).await?;
        }
        Commands::Chart { ticker } => {
            session.chart(&ticker, &mut out).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Clear => session.cache_clear(&mut out)?,
            CacheAction::Stats => session.cache_stats(&mut out)?,
        },
    }

    Ok(())
}
