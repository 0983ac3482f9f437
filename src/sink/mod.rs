//! Tabular sinks: the write surface the table builder targets.
//!
//! The core resolves values and decides row/column placement; a sink only
//! receives header registrations and cell writes and encodes them into some
//! physical output. [`XlsxSink`] writes a workbook; [`MemorySink`] records
//! everything for assertions.

pub mod memory;
pub mod xlsx;

pub use memory::MemorySink;
pub use xlsx::XlsxSink;

use crate::error::ExportError;
use crate::value::CellValue;

/// Presentation metadata for one header cell, assembled from the template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderStyle {
    /// `RRGGBB` hex code for the header text.
    pub text_color: Option<String>,
    /// `RRGGBB` hex code for the header fill.
    pub background_color: Option<String>,
    /// Wrap text in this header's column.
    pub wrap_text: bool,
    /// Comment attached to the header cell.
    pub comment: Option<String>,
}

/// Receives the rows the table builder produces.
///
/// Calls arrive in a fixed discipline: every header (with its stable column
/// index) before the first row, then `new_row` / `write_cell` interleaved,
/// then exactly one `close` — which the export entry point guarantees on
/// both the success and the error path.
pub trait TabularSink {
    /// Register a header at a stable column index.
    fn add_header(&mut self, column: usize, name: &str, style: &HeaderStyle) -> Result<(), ExportError>;

    /// Mark a column for a SUM formula over its data range before every
    /// sheet boundary and at close.
    fn add_summation(&mut self, column: usize) -> Result<(), ExportError>;

    /// Start the next output row.
    fn new_row(&mut self) -> Result<(), ExportError>;

    /// Write one cell into the current row.
    fn write_cell(&mut self, column: usize, value: &CellValue) -> Result<(), ExportError>;

    /// Finalize and release the sink. Implementations must tolerate nothing
    /// further being written afterwards; callers must not call this twice.
    fn close(&mut self) -> Result<(), ExportError>;
}
