use crate::models::{CorrelationMatrix, DivergenceCsvRow, DivergenceReport, RiskMatrixRow, SentimentHistoryPoint};
use serde::Serialize;
use std::path::Path;

fn write_rows<T: Serialize>(rows: impl IntoIterator<Item = T>, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn risk_matrix_csv(rows: &[RiskMatrixRow], path: &Path) -> anyhow::Result<()> {
    write_rows(rows, path)
}

pub fn divergence_csv(reports: &[DivergenceReport], path: &Path) -> anyhow::Result<()> {
    write_rows(reports.iter().map(DivergenceCsvRow::from), path)
}

pub fn sentiment_history_csv(history: &[SentimentHistoryPoint], path: &Path) -> anyhow::Result<()> {
    write_rows(history, path)
}

/// Square matrix with tickers as the header row and first column
pub fn correlation_csv(matrix: &CorrelationMatrix, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![String::from("ticker")];
    header.extend(matrix.tickers.iter().cloned());
    writer.write_record(&header)?;

    for (i, ticker) in matrix.tickers.iter().enumerate() {
        let mut record = vec![ticker.clone()];
        record.extend((0..matrix.size()).map(|j| format!("{:.4}", matrix.get(i, j))));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;

    #[test]
    fn test_risk_matrix_csv_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.csv");
        let row = RiskMatrixRow {
            ticker: "KO".into(),
            benchmark: "SPY".into(),
            observations: 252,
            correlation: 0.5,
            beta: 0.6,
            alpha: 0.0001,
            annualized_volatility: 0.15,
            tracking_error: 0.12,
            expected_return: 0.05,
            actual_return: 0.07,
            excess_return: 0.02,
            up_market_correlation: Some(0.4),
            down_market_correlation: None,
            downside_beta: Some(0.5),
            high_vol_correlation: Some(0.55),
            low_vol_correlation: Some(0.35),
            risk_level: RiskLevel::Low,
        };
        risk_matrix_csv(&[row], &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "ticker");
        assert_eq!(headers.iter().last(), Some("risk_level"));

        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "KO");
        assert_eq!(&record[12], "");
        assert_eq!(record.iter().last(), Some("Low"));
    }

    #[test]
    fn test_correlation_csv_is_square() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corr.csv");
        let matrix = CorrelationMatrix {
            tickers: vec!["A".into(), "B".into()],
            values: vec![1.0, -0.25, -0.25, 1.0],
            observations: 60,
        };
        correlation_csv(&matrix, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "ticker,A,B\nA,1.0000,-0.2500\nB,-0.2500,1.0000\n");
    }
}
