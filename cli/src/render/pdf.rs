//! Landscape A4 risk-matrix report.

use crate::{
    models::{RiskLevel, RiskMatrixRow},
    render::{
        table::{risk_row_cells, RISK_COLUMNS},
        ReportMeta,
    },
};
use printpdf::{BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rgb};
use std::{fs::File, io::BufWriter, path::Path};

const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 10.0;
const ROW_HEIGHT: f32 = 6.0;
const FONT_SIZE: f32 = 8.0;
/// First table row on a page, below the header block
const TABLE_TOP: f32 = PAGE_HEIGHT - 40.0;

fn pdf_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("PDF error: {}", e)
}

fn fill(layer: &PdfLayerReference, r: f32, g: f32, b: f32) {
    layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
}

fn level_color(level: RiskLevel) -> (f32, f32, f32) {
    match level {
        RiskLevel::Low => (0.1, 0.5, 0.1),
        RiskLevel::Medium => (0.7, 0.5, 0.0),
        RiskLevel::High => (0.8, 0.1, 0.1),
    }
}

/// Rows that fit on one page below the header
pub fn rows_per_page() -> usize {
    ((TABLE_TOP - ROW_HEIGHT - MARGIN) / ROW_HEIGHT).floor() as usize
}

fn column_x(index: usize) -> f32 {
    let width = (PAGE_WIDTH - 2.0 * MARGIN) / RISK_COLUMNS.len() as f32;
    MARGIN + width * index as f32
}

fn draw_header(
    layer: &PdfLayerReference,
    meta: &ReportMeta,
    page: usize,
    pages: usize,
    bold: &IndirectFontRef,
    font: &IndirectFontRef,
) {
    fill(layer, 0.0, 0.0, 0.0);
    layer.use_text(meta.title.clone(), 16.0, Mm(MARGIN), Mm(PAGE_HEIGHT - 15.0), bold);
    layer.use_text(
        format!(
            "Benchmark {}  |  Generated {}  |  Run {}  |  Page {}/{}",
            meta.benchmark,
            meta.generated_at.format("%Y-%m-%d %H:%M UTC"),
            meta.run_id,
            page,
            pages
        ),
        FONT_SIZE,
        Mm(MARGIN),
        Mm(PAGE_HEIGHT - 22.0),
        font,
    );

    for (i, column) in RISK_COLUMNS.iter().enumerate() {
        layer.use_text(*column, FONT_SIZE, Mm(column_x(i)), Mm(TABLE_TOP), bold);
    }
}

/// Write the risk matrix as a PDF, breaking onto new pages as needed
pub fn risk_matrix_pdf(rows: &[RiskMatrixRow], meta: &ReportMeta, path: &Path) -> anyhow::Result<()> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(meta.title.clone(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;

    let per_page = rows_per_page().max(1);
    let pages = rows.len().div_ceil(per_page).max(1);

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    draw_header(&layer, meta, 1, pages, &bold, &font);
    if rows.is_empty() {
        layer.use_text(
            "No tickers could be measured",
            FONT_SIZE,
            Mm(MARGIN),
            Mm(TABLE_TOP - ROW_HEIGHT),
            &font,
        );
    }

    for (page_idx, chunk) in rows.chunks(per_page).enumerate() {
        if page_idx > 0 {
            let (page, page_layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            draw_header(&layer, meta, page_idx + 1, pages, &bold, &font);
        }

        for (row_idx, row) in chunk.iter().enumerate() {
            let y = TABLE_TOP - ROW_HEIGHT * (row_idx as f32 + 1.0);
            let cells = risk_row_cells(row);
            let last = cells.len() - 1;
            for (i, cell) in cells.into_iter().enumerate() {
                if i == last {
                    let (r, g, b) = level_color(row.risk_level);
                    fill(&layer, r, g, b);
                    layer.use_text(cell, FONT_SIZE, Mm(column_x(i)), Mm(y), &bold);
                    fill(&layer, 0.0, 0.0, 0.0);
                } else {
                    layer.use_text(cell, FONT_SIZE, Mm(column_x(i)), Mm(y), &font);
                }
            }
        }
    }

    let file = File::create(path)?;
    doc.save(&mut BufWriter::new(file)).map_err(pdf_err)?;
    Ok(())
}
