//! Tabular attendance report rendered with printpdf's builtin fonts.

use crate::error::AttendanceError;
use crate::service::attendance::RangeRecord;
use chrono::NaiveDate;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rgb,
};

const PAGE_WIDTH: Mm = Mm(215.9);
const PAGE_HEIGHT: Mm = Mm(279.4);
const MARGIN_TOP: f32 = 255.0;
const MARGIN_BOTTOM: f32 = 20.0;
const ROW_HEIGHT: f32 = 7.0;
const COLUMNS: [(&str, f32); 4] = [
    ("Student ID", 20.0),
    ("Name", 60.0),
    ("Days Present", 130.0),
    ("Attendance %", 165.0),
];
const ID_MAX_CHARS: usize = 18;
const NAME_MAX_CHARS: usize = 36;

pub struct PdfReport<'a> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub class_label: &'a str,
    pub total_days: i64,
    pub rows: &'a [RangeRecord],
}

pub fn render_pdf(report: &PdfReport<'_>) -> Result<Vec<u8>, AttendanceError> {
    let (doc, page, layer) =
        PdfDocument::new("Attendance Report", PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;

    let mut canvas = doc.get_page(page).get_layer(layer);
    canvas.set_fill_color(Color::Rgb(Rgb::new(0.4, 0.494, 0.918, None)));
    canvas.use_text("Attendance Report", 24.0, Mm(20.0), Mm(MARGIN_TOP), &bold);
    canvas.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));

    let mut y = MARGIN_TOP - 14.0;
    for line in [
        format!("Period: {} to {}", report.start, report.end),
        format!("Class: {}", report.class_label),
        format!("Total Days: {}", report.total_days),
    ] {
        canvas.use_text(line, 11.0, Mm(20.0), Mm(y), &regular);
        y -= 6.0;
    }
    y -= 6.0;

    write_header(&canvas, y, &bold);
    y -= ROW_HEIGHT;

    for row in report.rows {
        if y < MARGIN_BOTTOM {
            canvas = new_page(&doc);
            y = MARGIN_TOP;
            write_header(&canvas, y, &bold);
            y -= ROW_HEIGHT;
        }
        for (text, (_, x)) in row_cells(row).into_iter().zip(COLUMNS) {
            canvas.use_text(text, 10.0, Mm(x), Mm(y), &regular);
        }
        y -= ROW_HEIGHT;
    }

    doc.save_to_bytes().map_err(pdf_err)
}

fn write_header(canvas: &PdfLayerReference, y: f32, bold: &IndirectFontRef) {
    for (title, x) in COLUMNS {
        canvas.use_text(title, 12.0, Mm(x), Mm(y), bold);
    }
}

fn new_page(doc: &PdfDocumentReference) -> PdfLayerReference {
    let (page, layer) = doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
    doc.get_page(page).get_layer(layer)
}

/// Cell texts in column order, clipped to their column widths.
fn row_cells(row: &RangeRecord) -> [String; 4] {
    [
        truncate(&row.student_id, ID_MAX_CHARS),
        truncate(&row.name, NAME_MAX_CHARS),
        row.days_present.to_string(),
        format!("{}%", row.percentage),
    ]
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn pdf_err(e: impl std::fmt::Display) -> AttendanceError {
    AttendanceError::Report(e.to_string())
}
