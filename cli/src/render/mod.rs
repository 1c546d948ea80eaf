//! Output of analysis results: SVG charts, PDF reports, terminal tables and CSV files.
//!
//! Files are named `<output_dir>/<kind>_<YYYYMMDD>.<ext>`, with the ticker
//! inserted for per-ticker outputs: `<kind>_<TICKER>_<YYYYMMDD>.<ext>`.

pub mod chart;
pub mod export;
pub mod pdf;
pub mod table;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Build an output path and make sure its directory exists
pub fn output_path(
    output_dir: &Path,
    kind: &str,
    ticker: Option<&str>,
    date: NaiveDate,
    ext: &str,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let stamp = crate::utils::report_stamp(date);
    let name = match ticker {
        Some(ticker) => format!("{}_{}_{}.{}", kind, file_safe(ticker), stamp, ext),
        None => format!("{}_{}.{}", kind, stamp, ext),
    };
    Ok(output_dir.join(name))
}

fn file_safe(ticker: &str) -> String {
    ticker
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Header details stamped on generated reports
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub run_id: Uuid,
    pub title: String,
    pub benchmark: String,
    pub generated_at: DateTime<Utc>,
}

impl ReportMeta {
    pub fn new(title: impl Into<String>, benchmark: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            title: title.into(),
            benchmark: benchmark.into(),
            generated_at: Utc::now(),
        }
    }

    /// Attach an existing run id so every artifact of one run shares it
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }
}

/// `Some(0.1234)` as `0.12`, `None` as `n/a`
pub fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "n/a".to_string())
}

/// Log return as a percentage string
pub fn fmt_pct(value: f64) -> String {
    format!("{:+.2}%", value * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_naming() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();

        let path = output_path(dir.path(), "risk_matrix", None, date, "pdf").unwrap();
        assert_eq!(path, dir.path().join("risk_matrix_20240607.pdf"));

        let path = output_path(dir.path(), "chart", Some("^VIX"), date, "svg").unwrap();
        assert_eq!(path, dir.path().join("chart__VIX_20240607.svg"));
    }

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(fmt_opt(None), "n/a");
        assert_eq!(fmt_opt(Some(0.12345)), "0.12");
        assert_eq!(fmt_pct(0.0512), "+5.12%");
        assert_eq!(fmt_pct(-0.1), "-10.00%");
    }
}
