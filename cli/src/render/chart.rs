//! SVG charts drawn with plotters. X axes are day indices labelled with dates.

use crate::models::{
    align_series, CorrelationMatrix, DivergenceReport, PriceSeries, SentimentHistoryPoint,
};
use anyhow::bail;
use plotters::prelude::*;
use std::path::Path;

const SIZE: (u32, u32) = (1000, 600);
const FONT: &str = "sans-serif";

fn date_label(dates: &[String], x: i32) -> String {
    usize::try_from(x)
        .ok()
        .and_then(|i| dates.get(i))
        .cloned()
        .unwrap_or_default()
}

/// Padded y range covering every value
fn y_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = ((hi - lo) * 0.1).max(0.5);
    (lo - pad, hi + pad)
}

fn last_index(len: usize) -> i32 {
    (len as i32 - 1).max(1)
}

/// Blue for -1 through white to red for +1
pub fn heat_color(value: f64) -> RGBColor {
    let t = value.clamp(-1.0, 1.0).abs();
    let fade = (255.0 * (1.0 - t)).round() as u8;
    if value < 0.0 {
        RGBColor(fade, fade, 255)
    } else {
        RGBColor(255, fade, fade)
    }
}

/// Cumulative actual vs beta-implied return over the recent window
pub fn divergence_chart(report: &DivergenceReport, path: &Path) -> anyhow::Result<()> {
    if report.path.is_empty() {
        bail!("no divergence path for {}", report.ticker);
    }

    let dates: Vec<String> = report.path.iter().map(|p| p.date.clone()).collect();
    let actual: Vec<(i32, f64)> = report
        .path
        .iter()
        .enumerate()
        .map(|(i, p)| (i as i32, p.actual * 100.0))
        .collect();
    let expected: Vec<(i32, f64)> = report
        .path
        .iter()
        .enumerate()
        .map(|(i, p)| (i as i32, p.expected * 100.0))
        .collect();
    let (y_min, y_max) = y_bounds(actual.iter().chain(&expected).map(|(_, v)| *v));

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!(
                "{} vs {}: divergence {:+.2}σ ({})",
                report.ticker,
                report.benchmark,
                report.divergence_score,
                report.signal.as_str()
            ),
            (FONT, 24),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0..last_index(dates.len()), y_min..y_max)?;

    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&|x| date_label(&dates, *x))
        .y_desc("Cumulative log return (%)")
        .draw()?;

    chart
        .draw_series(LineSeries::new(actual, &BLUE))?
        .label(format!("{} actual", report.ticker))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .draw_series(LineSeries::new(expected, &RED))?
        .label(format!("Expected (beta {:.2})", report.beta))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Rolling correlation with the long-run level as a reference line
pub fn rolling_correlation_chart(report: &DivergenceReport, path: &Path) -> anyhow::Result<()> {
    if report.rolling_correlation.is_empty() {
        bail!("no rolling correlation for {}", report.ticker);
    }

    let dates: Vec<String> = report
        .rolling_correlation
        .iter()
        .map(|(d, _)| d.clone())
        .collect();
    let last = last_index(dates.len());

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} vs {}: rolling correlation", report.ticker, report.benchmark),
            (FONT, 24),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0..last, -1.0..1.0)?;

    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&|x| date_label(&dates, *x))
        .y_desc("Correlation")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            report
                .rolling_correlation
                .iter()
                .enumerate()
                .map(|(i, (_, v))| (i as i32, *v)),
            &BLUE,
        ))?
        .label("Rolling")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .draw_series(LineSeries::new(
            vec![(0, report.correlation), (last, report.correlation)],
            &BLACK,
        ))?
        .label(format!("Estimation window {:.2}", report.correlation))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLACK));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Composite fear-greed score over time on top of the label bands
pub fn sentiment_chart(history: &[SentimentHistoryPoint], path: &Path) -> anyhow::Result<()> {
    if history.is_empty() {
        bail!("no sentiment history to chart");
    }

    let dates: Vec<String> = history.iter().map(|p| p.date.clone()).collect();
    let last = last_index(dates.len());

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Fear & Greed", (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0..last, 0.0..100.0)?;

    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&|x| date_label(&dates, *x))
        .y_desc("Score")
        .draw()?;

    let bands = [
        (0.0, 25.0, RGBColor(178, 34, 34)),
        (25.0, 45.0, RGBColor(255, 140, 0)),
        (45.0, 55.0, RGBColor(160, 160, 160)),
        (55.0, 75.0, RGBColor(154, 205, 50)),
        (75.0, 100.0, RGBColor(34, 139, 34)),
    ];
    chart.draw_series(bands.iter().map(|(lo, hi, color)| {
        Rectangle::new([(0, *lo), (last, *hi)], color.mix(0.15).filled())
    }))?;

    chart.draw_series(LineSeries::new(
        history.iter().enumerate().map(|(i, p)| (i as i32, p.score)),
        BLACK.stroke_width(2),
    ))?;

    root.present()?;
    Ok(())
}

/// Correlation matrix as coloured cells with the value printed in each
pub fn correlation_heatmap(matrix: &CorrelationMatrix, path: &Path) -> anyhow::Result<()> {
    let n = matrix.size() as i32;
    if n == 0 {
        bail!("empty correlation matrix");
    }
    let tickers = &matrix.tickers;

    let root = SVGBackend::new(path, (900, 900)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Correlation of daily log returns ({} days)", matrix.observations),
            (FONT, 22),
        )
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0..n, 0..n)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n as usize + 1)
        .y_labels(n as usize + 1)
        .x_label_formatter(&|x| date_label(tickers, *x))
        .y_label_formatter(&|y| date_label(tickers, *y))
        .draw()?;

    let cells: Vec<(i32, i32, f64)> = (0..n)
        .flat_map(|row| (0..n).map(move |col| (row, col)))
        .map(|(row, col)| (row, col, matrix.get(row as usize, col as usize)))
        .collect();

    chart.draw_series(cells.iter().map(|(row, col, value)| {
        Rectangle::new(
            [(*col, *row), (*col + 1, *row + 1)],
            heat_color(*value).filled(),
        )
    }))?;

    chart.draw_series(cells.iter().map(|(row, col, value)| {
        Text::new(
            format!("{:.2}", value),
            (*col, *row + 1),
            (FONT, 14).into_font(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Ticker and benchmark rebased to 100 on their first shared date
pub fn normalized_price_chart(
    ticker: &PriceSeries,
    benchmark: &PriceSeries,
    path: &Path,
) -> anyhow::Result<()> {
    let pair = align_series(ticker, benchmark);
    if pair.len() < 2 {
        bail!(
            "{} and {} share fewer than two dates",
            ticker.ticker,
            benchmark.ticker
        );
    }

    let rebase = |values: &[f64]| -> Vec<(i32, f64)> {
        let base = values[0];
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as i32, v / base * 100.0))
            .collect()
    };
    let left = rebase(&pair.left);
    let right = rebase(&pair.right);
    let (y_min, y_max) = y_bounds(left.iter().chain(&right).map(|(_, v)| *v));
    let dates = &pair.dates;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} vs {} (rebased to 100)", ticker.ticker, benchmark.ticker),
            (FONT, 24),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0..last_index(dates.len()), y_min..y_max)?;

    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&|x| date_label(dates, *x))
        .draw()?;

    chart
        .draw_series(LineSeries::new(left, &BLUE))?
        .label(ticker.ticker.clone())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .draw_series(LineSeries::new(right, &RED))?
        .label(benchmark.ticker.clone())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DivergencePoint, DivergenceSignal};

    #[test]
    fn test_heat_color_endpoints() {
        assert_eq!(heat_color(1.0), RGBColor(255, 0, 0));
        assert_eq!(heat_color(-1.0), RGBColor(0, 0, 255));
        assert_eq!(heat_color(0.0), RGBColor(255, 255, 255));
    }

    #[test]
    fn test_y_bounds_pads_range() {
        let (lo, hi) = y_bounds([1.0, 3.0].into_iter());
        assert!(lo < 1.0 && hi > 3.0);
        assert_eq!(y_bounds(std::iter::empty()), (-1.0, 1.0));
    }

    #[test]
    fn test_charts_write_svg_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = DivergenceReport {
            ticker: "AAPL".into(),
            benchmark: "SPY".into(),
            as_of: "2024-01-03".into(),
            observations: 252,
            beta: 1.1,
            alpha: 0.0,
            correlation: 0.7,
            residual_std: 0.01,
            actual_return: 0.02,
            expected_return: 0.01,
            divergence: 0.01,
            divergence_score: 0.5,
            recent_correlation: Some(0.6),
            correlation_change: Some(-0.1),
            signal: DivergenceSignal::InLine,
            correlation_breakdown: false,
            path: vec![
                DivergencePoint { date: "2024-01-02".into(), actual: 0.01, expected: 0.005 },
                DivergencePoint { date: "2024-01-03".into(), actual: 0.02, expected: 0.01 },
            ],
            rolling_correlation: vec![("2024-01-02".into(), 0.65), ("2024-01-03".into(), 0.6)],
        };

        let divergence = dir.path().join("divergence.svg");
        divergence_chart(&report, &divergence).unwrap();
        let svg = std::fs::read_to_string(&divergence).unwrap();
        assert!(svg.contains("<svg"));

        let rolling = dir.path().join("rolling.svg");
        rolling_correlation_chart(&report, &rolling).unwrap();
        assert!(rolling.exists());

        let matrix = CorrelationMatrix {
            tickers: vec!["AAPL".into(), "MSFT".into()],
            values: vec![1.0, 0.8, 0.8, 1.0],
            observations: 100,
        };
        let heatmap = dir.path().join("heatmap.svg");
        correlation_heatmap(&matrix, &heatmap).unwrap();
        assert!(heatmap.exists());
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sentiment_chart(&[], &dir.path().join("s.svg")).is_err());
        let a = PriceSeries::new("A", vec!["2024-01-02".into()], vec![1.0]);
        assert!(normalized_price_chart(&a, &a, &dir.path().join("p.svg")).is_err());
    }
}
