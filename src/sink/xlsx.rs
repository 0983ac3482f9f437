//! Workbook sink over `rust_xlsxwriter`.
//!
//! Renders the header styling the template declares (colors, wrap text, cell
//! comments), rolls over to a fresh sheet when a sheet fills up — re-emitting
//! the header row — and writes SUM formulas for summation columns before
//! every sheet boundary and at close.

use crate::error::ExportError;
use crate::sink::{HeaderStyle, TabularSink};
use crate::value::CellValue;
use rust_xlsxwriter::{Color, Format, FormatAlign, Formula, Note, Workbook, Worksheet};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::warn;

/// Rows per sheet (header included) before rolling over to a new sheet.
const DEFAULT_SHEET_THRESHOLD: u32 = 65_000;

/// A [`TabularSink`] that writes an xlsx workbook.
pub struct XlsxSink {
    workbook: Workbook,
    sheet: Worksheet,
    path: PathBuf,
    headers: Vec<(String, HeaderStyle)>,
    summation_columns: Vec<usize>,
    wrap_columns: HashSet<usize>,
    sheet_count: usize,
    /// Index of the last written row in the current sheet; 0 is the header.
    current_row: u32,
    threshold: u32,
    closed: bool,
    fmt_integer: Format,
    fmt_float: Format,
    fmt_date: Format,
    fmt_wrap: Format,
    fmt_sum: Format,
}

impl XlsxSink {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ExportError> {
        Ok(XlsxSink {
            workbook: Workbook::new(),
            sheet: make_sheet(1)?,
            path: path.into(),
            headers: Vec::new(),
            summation_columns: Vec::new(),
            wrap_columns: HashSet::new(),
            sheet_count: 1,
            current_row: 0,
            threshold: DEFAULT_SHEET_THRESHOLD,
            closed: false,
            fmt_integer: Format::new().set_num_format("#,##0"),
            fmt_float: Format::new().set_num_format("#,##0.00"),
            fmt_date: Format::new().set_num_format("m/d/yy"),
            fmt_wrap: Format::new().set_text_wrap().set_align(FormatAlign::Top),
            fmt_sum: Format::new().set_num_format("#,##0.00"),
        })
    }

    /// Override the sheet rollover threshold (rows per sheet, header
    /// included). Values below 2 are clamped to 2 so every sheet can hold
    /// its header and at least one data row.
    pub fn with_threshold(mut self, rows: u32) -> Self {
        self.threshold = rows.max(2);
        self
    }

    /// Number of sheets the workbook holds so far.
    pub fn sheet_count(&self) -> usize {
        self.sheet_count
    }

    fn write_header_at(&mut self, column: usize, name: &str, style: &HeaderStyle) -> Result<(), ExportError> {
        let mut format = Format::new().set_bold().set_align(FormatAlign::Top);
        if let Some(color) = style.text_color.as_deref().and_then(parse_color) {
            format = format.set_font_color(color);
        }
        if let Some(color) = style.background_color.as_deref().and_then(parse_color) {
            format = format.set_background_color(color);
        }
        self.sheet
            .write_string_with_format(0, column as u16, name, &format)?;
        if let Some(comment) = &style.comment {
            let note = Note::new(comment.clone());
            self.sheet.insert_note(0, column as u16, &note)?;
        }
        Ok(())
    }

    /// Emit SUM formulas for the registered columns over the current sheet's
    /// data range. Consumes one row.
    fn write_summations(&mut self) -> Result<(), ExportError> {
        if self.summation_columns.is_empty() || self.current_row == 0 {
            return Ok(());
        }
        let last_data_row = self.current_row + 1; // excel rows are 1-based
        self.current_row += 1;
        for &column in &self.summation_columns {
            let letter = column_name(column + 1);
            let formula = Formula::new(format!("SUM({letter}2:{letter}{last_data_row})"));
            self.sheet
                .write_formula_with_format(self.current_row, column as u16, formula, &self.fmt_sum)?;
        }
        Ok(())
    }

    /// Seal the current sheet and start a fresh one with the header row
    /// re-emitted.
    fn rollover(&mut self) -> Result<(), ExportError> {
        self.write_summations()?;
        self.sheet.autofit();

        self.sheet_count += 1;
        let finished = std::mem::replace(&mut self.sheet, make_sheet(self.sheet_count)?);
        self.workbook.push_worksheet(finished);

        self.current_row = 0;
        let headers = self.headers.clone();
        for (column, (name, style)) in headers.iter().enumerate() {
            if !name.is_empty() {
                self.write_header_at(column, name, style)?;
            }
        }
        Ok(())
    }
}

impl TabularSink for XlsxSink {
    fn add_header(&mut self, column: usize, name: &str, style: &HeaderStyle) -> Result<(), ExportError> {
        if column >= self.headers.len() {
            self.headers
                .resize(column + 1, (String::new(), HeaderStyle::default()));
        }
        self.headers[column] = (name.to_string(), style.clone());
        if style.wrap_text {
            self.wrap_columns.insert(column);
        }
        self.write_header_at(column, name, style)
    }

    fn add_summation(&mut self, column: usize) -> Result<(), ExportError> {
        self.summation_columns.push(column);
        Ok(())
    }

    fn new_row(&mut self) -> Result<(), ExportError> {
        if self.current_row + 1 >= self.threshold {
            self.rollover()?;
        }
        self.current_row += 1;
        Ok(())
    }

    fn write_cell(&mut self, column: usize, value: &CellValue) -> Result<(), ExportError> {
        let row = self.current_row;
        let col = column as u16;
        match value {
            CellValue::Text(s) => {
                if self.wrap_columns.contains(&column) {
                    self.sheet
                        .write_string_with_format(row, col, s.as_str(), &self.fmt_wrap)?;
                } else {
                    self.sheet.write_string(row, col, s.as_str())?;
                }
            }
            CellValue::Integer(i) => {
                self.sheet
                    .write_number_with_format(row, col, *i as f64, &self.fmt_integer)?;
            }
            CellValue::Float(v) => {
                self.sheet
                    .write_number_with_format(row, col, *v, &self.fmt_float)?;
            }
            CellValue::Bool(b) => {
                self.sheet.write_boolean(row, col, *b)?;
            }
            CellValue::Date(dt) => {
                self.sheet
                    .write_datetime_with_format(row, col, dt, &self.fmt_date)?;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ExportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.write_summations()?;
        self.sheet.autofit();
        let finished = std::mem::replace(&mut self.sheet, Worksheet::new());
        self.workbook.push_worksheet(finished);
        self.workbook.save(&self.path)?;
        Ok(())
    }
}

fn make_sheet(index: usize) -> Result<Worksheet, ExportError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(format!("Sheet {index}"))?;
    sheet.set_freeze_panes(1, 0)?;
    Ok(sheet)
}

/// Parse an `RRGGBB` hex color code; unparseable codes are dropped with a
/// warning rather than failing the export.
fn parse_color(code: &str) -> Option<Color> {
    let trimmed = code.trim().trim_start_matches('#');
    match u32::from_str_radix(trimmed, 16) {
        Ok(rgb) if trimmed.len() == 6 => Some(Color::RGB(rgb)),
        _ => {
            warn!(code, "ignoring unparseable header color");
            None
        }
    }
}

/// Column letters for a 1-based position: 1 → A, 26 → Z, 28 → AB.
fn column_name(mut position: usize) -> String {
    let mut name = String::new();
    while position > 0 {
        let digit = position % 26;
        let letter = if digit == 0 {
            'Z'
        } else {
            (b'A' + digit as u8 - 1) as char
        };
        name.insert(0, letter);
        position = (position - 1) / 26;
    }
    name
}
