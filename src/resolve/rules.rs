//! Template rule application: value substitution and cell-type coercion.
//!
//! Rules are keyed by the original path expression a column was declared
//! with, never by the shrinking sub-paths the resolver recurses through.

use crate::error::ExportError;
use crate::template::{CellFormat, ExtendedReplace, SheetTemplate};
use crate::value::CellValue;

/// Applies a template's `replace` and `format_cell_value` rules to resolved
/// values, and exposes `extended_replace` rules for the row loop.
#[derive(Debug, Clone, Copy)]
pub struct RuleProcessor<'t> {
    template: &'t SheetTemplate,
}

impl<'t> RuleProcessor<'t> {
    pub fn new(template: &'t SheetTemplate) -> Self {
        RuleProcessor { template }
    }

    /// Substitute the value when a `replace` rule for `path` maps its
    /// rendered form; otherwise pass it through unchanged.
    pub fn replace(&self, path: &str, value: CellValue) -> CellValue {
        if let Some(table) = self.template.replace.get(path) {
            if let Some(replacement) = table.get(&value.to_string()) {
                return CellValue::from_json(replacement);
            }
        }
        value
    }

    /// Coerce the value into the primitive a `format_cell_value` rule
    /// requests. Blank values are passed through untouched; a numeric
    /// coercion that fails to parse is fatal.
    pub fn format(&self, path: &str, value: CellValue) -> Result<CellValue, ExportError> {
        let Some(format) = self.template.format_cell_value.get(path) else {
            return Ok(value);
        };
        if value.is_blank() {
            return Ok(value);
        }
        let rendered = value.to_string();
        match format {
            CellFormat::Integer => rendered
                .trim()
                .parse::<i64>()
                .map(CellValue::Integer)
                .map_err(|_| ExportError::FormatCoercion {
                    path: path.to_string(),
                    value: rendered,
                    format: "INTEGER",
                }),
            CellFormat::Float => rendered
                .trim()
                .parse::<f64>()
                .map(CellValue::Float)
                .map_err(|_| ExportError::FormatCoercion {
                    path: path.to_string(),
                    value: rendered,
                    format: "FLOAT",
                }),
            CellFormat::Text => Ok(CellValue::Text(rendered)),
        }
    }

    /// Run both value rules in their fixed order: replace, then format.
    pub fn apply(&self, path: &str, value: CellValue) -> Result<CellValue, ExportError> {
        self.format(path, self.replace(path, value))
    }

    /// The `extended_replace` rule declared for `path`, if any.
    pub fn extended_rule(&self, path: &str) -> Option<&'t ExtendedReplace> {
        self.template.extended_replace.get(path)
    }
}
