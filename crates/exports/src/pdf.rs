//! Landscape A4 PDF rendering of a [`StatementLayout`].

use printpdf::{BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect, Rgb};
use rust_decimal::Decimal;

use exportdesk_core::{ExportError, ExportResult, format_amount};

use crate::statement::{StatementLayout, StatementRow};

const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 12.0;
const BAND_HEIGHT: f32 = 24.0;
const LINE_HEIGHT: f32 = 6.0;
const TABLE_TOP: f32 = 166.0;

/// Column x offsets: Date, Account, Type, Purpose, Credit, Debit, Balance.
const COLUMNS: [(&str, f32, usize); 7] = [
    ("Date", MARGIN, 18),
    ("Account", 48.0, 24),
    ("Type", 95.0, 12),
    ("Purpose", 120.0, 44),
    ("Credit", 205.0, 12),
    ("Debit", 232.0, 12),
    ("Balance", 259.0, 14),
];

const HEADER_BLUE: (f32, f32, f32) = (0.13, 0.29, 0.49);
const ROW_GREY: (f32, f32, f32) = (0.93, 0.94, 0.96);

/// Rows that fit between the table header and the footer at the default line height.
pub const DEFAULT_ROWS_PER_PAGE: usize = 23;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

pub fn encode_pdf(layout: &StatementLayout) -> ExportResult<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(layout.title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Statement");

    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
    };

    let page_count = layout.page_count();
    for (index, rows) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Statement");
            doc.get_page(page).get_layer(layer)
        };

        draw_header(&layer, &fonts, layout);
        let mut y = draw_table(&layer, &fonts, rows);
        if index + 1 == page_count {
            y -= LINE_HEIGHT;
            draw_summary(&layer, &fonts, layout, y);
        }
        draw_footer(&layer, &fonts, index + 1, page_count);
    }

    doc.save_to_bytes().map_err(pdf_error)
}

fn draw_header(layer: &PdfLayerReference, fonts: &Fonts, layout: &StatementLayout) {
    fill(layer, HEADER_BLUE);
    layer.add_rect(Rect::new(
        Mm(0.0),
        Mm(PAGE_HEIGHT - BAND_HEIGHT),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
    ));

    fill(layer, (1.0, 1.0, 1.0));
    layer.use_text(layout.title.as_str(), 18.0, Mm(MARGIN), Mm(PAGE_HEIGHT - 12.0), &fonts.bold);
    let generated = format!("Generated {}", layout.generated_at.format("%Y-%m-%d %H:%M"));
    layer.use_text(generated, 9.0, Mm(MARGIN), Mm(PAGE_HEIGHT - 19.0), &fonts.regular);

    fill(layer, (0.0, 0.0, 0.0));
    if let Some(filters) = &layout.filter_line {
        let line = format!("Filters: {}", fit(filters, 150));
        layer.use_text(line, 9.0, Mm(MARGIN), Mm(PAGE_HEIGHT - BAND_HEIGHT - 8.0), &fonts.regular);
    }
}

/// Draws the column header and rows; returns the y of the last line drawn.
fn draw_table(layer: &PdfLayerReference, fonts: &Fonts, rows: &[StatementRow]) -> f32 {
    let mut y = TABLE_TOP;

    fill(layer, ROW_GREY);
    layer.add_rect(Rect::new(
        Mm(MARGIN - 2.0),
        Mm(y - 2.0),
        Mm(PAGE_WIDTH - MARGIN + 2.0),
        Mm(y + LINE_HEIGHT - 2.0),
    ));
    fill(layer, (0.0, 0.0, 0.0));
    for (title, x, _) in COLUMNS {
        layer.use_text(title, 9.0, Mm(x), Mm(y), &fonts.bold);
    }

    for row in rows {
        y -= LINE_HEIGHT;
        let cells = [
            row.date.clone(),
            row.account.clone(),
            row.kind.clone(),
            row.purpose.clone(),
            optional_amount(row.credit),
            optional_amount(row.debit),
            format_amount(row.balance),
        ];
        for ((_, x, width), text) in COLUMNS.iter().zip(cells) {
            layer.use_text(fit(&text, *width), 8.0, Mm(*x), Mm(y), &fonts.regular);
        }
    }

    y
}

fn draw_summary(layer: &PdfLayerReference, fonts: &Fonts, layout: &StatementLayout, top: f32) {
    let summary = &layout.summary;
    let lines = [
        ("Total Transactions", summary.total_count.to_string()),
        ("Total Credit", format_amount(summary.credit_total)),
        ("Total Debit", format_amount(summary.debit_total)),
        ("Net Amount", format_amount(summary.net_amount)),
    ];

    let mut y = top;
    layer.use_text("Summary", 10.0, Mm(MARGIN), Mm(y), &fonts.bold);
    for (label, value) in lines {
        y -= LINE_HEIGHT;
        layer.use_text(label, 9.0, Mm(MARGIN), Mm(y), &fonts.regular);
        layer.use_text(value, 9.0, Mm(60.0), Mm(y), &fonts.bold);
    }
}

fn draw_footer(layer: &PdfLayerReference, fonts: &Fonts, page: usize, pages: usize) {
    let text = format!("Page {page} of {pages}");
    layer.use_text(text, 8.0, Mm(PAGE_WIDTH - MARGIN - 22.0), Mm(8.0), &fonts.regular);
}

fn fill(layer: &PdfLayerReference, (r, g, b): (f32, f32, f32)) {
    layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
}

fn optional_amount(amount: Option<Decimal>) -> String {
    amount.map(format_amount).unwrap_or_default()
}

/// Truncate to `max` characters, marking the cut. Built-in fonts are not
/// measured, so widths are approximated by character count.
fn fit(text: &str, max: usize) -> String {
    let flat = text.replace(['\n', '\r', '\t'], " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

fn pdf_error<E: core::fmt::Debug>(e: E) -> ExportError {
    ExportError::file_generation(format!("pdf: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use exportdesk_core::{ExportFormat, ExportQuery, Transaction, TransactionSummary};

    fn rows(n: usize) -> Vec<Transaction> {
        (0..n)
            .map(|i| Transaction {
                id: i.to_string(),
                time: format!("2024-01-01T{:02}:00:00Z", i % 24),
                account: "Main".into(),
                transaction_type: if i % 2 == 0 { "Credit" } else { "Debit" }.into(),
                amount: Decimal::new(1234, 2),
                purpose: "Ünïcode, \"quoted\"\nline".into(),
            })
            .collect()
    }

    #[test]
    fn renders_a_pdf_document() {
        let rows = rows(60);
        let layout = StatementLayout::build(
            &rows,
            TransactionSummary::from_rows(&rows),
            &ExportQuery::new(ExportFormat::Pdf),
            DEFAULT_ROWS_PER_PAGE,
            Local::now(),
        );
        assert_eq!(layout.page_count(), 3);

        let bytes = encode_pdf(&layout).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn fit_truncates_long_cells() {
        assert_eq!(fit("short", 10), "short");
        assert_eq!(fit("a very long purpose text", 10), "a very ...");
        assert_eq!(fit("two\nlines", 20), "two lines");
    }
}
