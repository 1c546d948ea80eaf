//! Terminal tables for every report.

use crate::{
    models::{CorrelationMatrix, DivergenceReport, RiskLevel, RiskMatrixRow, SentimentReport, StockInfo},
    render::{fmt_opt, fmt_pct},
    services::{PortfolioEntry, LISTED_PEERS},
};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

pub const RISK_COLUMNS: [&str; 15] = [
    "Ticker", "Beta", "Corr", "Alpha", "Vol", "TE", "Expected", "Actual", "Excess", "Up corr",
    "Down corr", "Down beta", "Hi-vol corr", "Lo-vol corr", "Risk",
];

/// Text cells of one risk row, in `RISK_COLUMNS` order
pub fn risk_row_cells(row: &RiskMatrixRow) -> Vec<String> {
    vec![
        row.ticker.clone(),
        format!("{:.2}", row.beta),
        format!("{:.2}", row.correlation),
        format!("{:.4}", row.alpha),
        format!("{:.1}%", row.annualized_volatility * 100.0),
        format!("{:.1}%", row.tracking_error * 100.0),
        fmt_pct(row.expected_return),
        fmt_pct(row.actual_return),
        fmt_pct(row.excess_return),
        fmt_opt(row.up_market_correlation),
        fmt_opt(row.down_market_correlation),
        fmt_opt(row.downside_beta),
        fmt_opt(row.high_vol_correlation),
        fmt_opt(row.low_vol_correlation),
        row.risk_level.as_str().to_string(),
    ]
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn risk_color(level: RiskLevel) -> Color {
    match level {
        RiskLevel::Low => Color::Green,
        RiskLevel::Medium => Color::Yellow,
        RiskLevel::High => Color::Red,
    }
}

pub fn risk_matrix_table(rows: &[RiskMatrixRow]) -> Table {
    let mut table = base_table();
    table.set_header(RISK_COLUMNS.to_vec());
    for row in rows {
        let mut cells: Vec<Cell> = risk_row_cells(row).into_iter().map(Cell::new).collect();
        if let Some(last) = cells.pop() {
            cells.push(last.fg(risk_color(row.risk_level)));
        }
        table.add_row(cells);
    }
    table
}

pub fn divergence_table(reports: &[DivergenceReport]) -> Table {
    let mut table = base_table();
    table.set_header(vec![
        "Ticker", "Benchmark", "Beta", "Corr", "Recent corr", "Actual", "Expected", "Divergence",
        "Score", "Signal", "Breakdown",
    ]);
    for r in reports {
        let signal = Cell::new(r.signal.as_str()).fg(match r.signal {
            crate::models::DivergenceSignal::Outperforming => Color::Green,
            crate::models::DivergenceSignal::Underperforming => Color::Red,
            crate::models::DivergenceSignal::InLine => Color::Reset,
        });
        table.add_row(vec![
            Cell::new(&r.ticker),
            Cell::new(&r.benchmark),
            Cell::new(format!("{:.2}", r.beta)),
            Cell::new(format!("{:.2}", r.correlation)),
            Cell::new(fmt_opt(r.recent_correlation)),
            Cell::new(fmt_pct(r.actual_return)),
            Cell::new(fmt_pct(r.expected_return)),
            Cell::new(fmt_pct(r.divergence)),
            Cell::new(format!("{:+.2}", r.divergence_score)),
            signal,
            Cell::new(if r.correlation_breakdown { "yes" } else { "" }),
        ]);
    }
    table
}

pub fn correlation_table(matrix: &CorrelationMatrix) -> Table {
    let mut table = base_table();
    let mut header = vec![String::new()];
    header.extend(matrix.tickers.iter().cloned());
    table.set_header(header);

    for (i, ticker) in matrix.tickers.iter().enumerate() {
        let mut cells = vec![Cell::new(ticker)];
        for j in 0..matrix.size() {
            let value = matrix.get(i, j);
            let cell = Cell::new(format!("{:.2}", value));
            cells.push(if i == j {
                cell
            } else if value >= 0.7 {
                cell.fg(Color::Red)
            } else if value <= -0.3 {
                cell.fg(Color::Blue)
            } else {
                cell
            });
        }
        table.add_row(cells);
    }
    table
}

pub fn sentiment_table(report: &SentimentReport) -> Table {
    let mut table = base_table();
    table.set_header(vec!["Component", "Raw", "Score"]);
    for c in &report.components {
        table.add_row(vec![
            c.kind.label().to_string(),
            format!("{:.4}", c.raw),
            format!("{:.1}", c.score),
        ]);
    }
    table.add_row(vec![
        Cell::new("Composite"),
        Cell::new(report.label.as_str()),
        Cell::new(format!("{:.1}", report.score)),
    ]);
    table
}

fn info_cells(ticker: &str, info: Option<&StockInfo>) -> Vec<String> {
    match info {
        Some(info) => vec![
            ticker.to_string(),
            info.company.clone(),
            info.industry.clone(),
            info.sector.clone(),
            info.peers
                .iter()
                .take(LISTED_PEERS)
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            info.sector_etf.clone(),
        ],
        None => vec![
            ticker.to_string(),
            "(not fetched)".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ],
    }
}

const INFO_HEADER: [&str; 6] = ["Ticker", "Company", "Industry", "Sector", "Peers", "ETF"];

pub fn portfolio_table(entries: &[PortfolioEntry]) -> Table {
    let mut table = base_table();
    table.set_header(INFO_HEADER.to_vec());
    for entry in entries {
        table.add_row(info_cells(&entry.ticker, entry.info.as_ref()));
    }
    table
}

pub fn stock_info_table(infos: &[StockInfo]) -> Table {
    let mut table = base_table();
    table.set_header(INFO_HEADER.to_vec());
    for info in infos {
        table.add_row(info_cells(&info.ticker, Some(info)));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> RiskMatrixRow {
        RiskMatrixRow {
            ticker: "TSLA".into(),
            benchmark: "SPY".into(),
            observations: 252,
            correlation: 0.55,
            beta: 1.9,
            alpha: 0.0004,
            annualized_volatility: 0.55,
            tracking_error: 0.45,
            expected_return: 0.2,
            actual_return: 0.1,
            excess_return: -0.1,
            up_market_correlation: Some(0.4),
            down_market_correlation: None,
            downside_beta: Some(2.1),
            high_vol_correlation: Some(0.6),
            low_vol_correlation: Some(0.3),
            risk_level: RiskLevel::High,
        }
    }

    #[test]
    fn test_risk_row_cells() {
        let cells = risk_row_cells(&row());
        assert_eq!(cells.len(), RISK_COLUMNS.len());
        assert_eq!(cells[0], "TSLA");
        assert_eq!(cells[4], "55.0%");
        assert_eq!(cells[8], "-10.00%");
        assert_eq!(cells[10], "n/a");
        assert_eq!(cells[14], "High");
    }

    #[test]
    fn test_tables_render_content() {
        let rendered = risk_matrix_table(&[row()]).to_string();
        assert!(rendered.contains("TSLA"));
        assert!(rendered.contains("Down beta"));

        let entries = vec![PortfolioEntry {
            ticker: "NEW".into(),
            info: None,
        }];
        assert!(portfolio_table(&entries).to_string().contains("(not fetched)"));
    }
}
