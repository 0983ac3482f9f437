//! An in-memory sink that records every call for test assertions.

use crate::error::ExportError;
use crate::sink::{HeaderStyle, TabularSink};
use crate::value::CellValue;
use std::collections::BTreeMap;

/// Records headers, rows, and summation registrations verbatim.
#[derive(Debug, Default)]
pub struct MemorySink {
    headers: Vec<(usize, String, HeaderStyle)>,
    summations: Vec<usize>,
    rows: Vec<BTreeMap<usize, CellValue>>,
    close_calls: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn headers(&self) -> &[(usize, String, HeaderStyle)] {
        &self.headers
    }

    pub fn summations(&self) -> &[usize] {
        &self.summations
    }

    pub fn rows(&self) -> &[BTreeMap<usize, CellValue>] {
        &self.rows
    }

    /// The cell at (row, column), if one was written.
    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(&column))
    }

    /// One row rendered to strings, padded with empties up to `width`.
    pub fn row_strings(&self, row: usize, width: usize) -> Vec<String> {
        (0..width)
            .map(|col| {
                self.cell(row, col)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls > 0
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls
    }
}

impl TabularSink for MemorySink {
    fn add_header(&mut self, column: usize, name: &str, style: &HeaderStyle) -> Result<(), ExportError> {
        self.headers.push((column, name.to_string(), style.clone()));
        Ok(())
    }

    fn add_summation(&mut self, column: usize) -> Result<(), ExportError> {
        self.summations.push(column);
        Ok(())
    }

    fn new_row(&mut self) -> Result<(), ExportError> {
        self.rows.push(BTreeMap::new());
        Ok(())
    }

    fn write_cell(&mut self, column: usize, value: &CellValue) -> Result<(), ExportError> {
        if let Some(row) = self.rows.last_mut() {
            row.insert(column, value.clone());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ExportError> {
        self.close_calls += 1;
        Ok(())
    }
}
