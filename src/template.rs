//! Declarative sheet templates.
//!
//! A template is a JSON object that names the header row, the property path
//! expression behind every column, and the optional value rules (replace,
//! extended replace, cell formats) and header presentation metadata.
//!
//! ```json
//! {
//!   "header": ["Order", "Status", "Qty"],
//!   "properties": ["orderNumber", "salesOrder.orderStatus", "items.quantity"],
//!   "replace": { "salesOrder.orderStatus": { "5": "Shipped" } },
//!   "format_cell_value": { "items.quantity": "INTEGER" }
//! }
//! ```

use crate::error::ExportError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Requested primitive type for a resolved cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CellFormat {
    Integer,
    Float,
    Text,
}

/// One `extended_replace` rule: when the column at the keyed path resolves to
/// `value`, every later column in the same row whose path appears in
/// `replace` is forced to the paired value instead of being resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtendedReplace {
    pub value: String,
    /// Ordered list of single-pair objects, `[{"path": "forced value"}, …]`.
    #[serde(default)]
    pub replace: Vec<HashMap<String, String>>,
}

impl ExtendedReplace {
    /// The override pairs in declaration order.
    pub fn overrides(&self) -> impl Iterator<Item = (&String, &String)> {
        self.replace.iter().flat_map(|entry| entry.iter())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawTemplate {
    header: Option<Vec<String>>,
    #[serde(default)]
    properties: Vec<String>,
    #[serde(default)]
    summation_headers: Vec<String>,
    #[serde(default)]
    replace: HashMap<String, HashMap<String, Value>>,
    #[serde(default)]
    extended_replace: HashMap<String, ExtendedReplace>,
    #[serde(default)]
    format_cell_value: HashMap<String, CellFormat>,
    #[serde(default)]
    header_text_color: HashMap<String, String>,
    #[serde(default)]
    header_background_color: HashMap<String, String>,
    #[serde(default)]
    wrap_text_headers: Vec<String>,
    #[serde(default)]
    header_comments: HashMap<String, String>,
}

/// A parsed, validated sheet template.
#[derive(Debug, Clone)]
pub struct SheetTemplate {
    pub header: Vec<String>,
    pub properties: Vec<String>,
    pub summation_headers: Vec<String>,
    pub replace: HashMap<String, HashMap<String, Value>>,
    pub extended_replace: HashMap<String, ExtendedReplace>,
    pub format_cell_value: HashMap<String, CellFormat>,
    pub header_text_color: HashMap<String, String>,
    pub header_background_color: HashMap<String, String>,
    pub wrap_text_headers: Vec<String>,
    pub header_comments: HashMap<String, String>,
}

impl SheetTemplate {
    /// Parse a template from JSON text.
    ///
    /// A missing `header` array is fatal here; everything else is optional.
    pub fn from_json_str(text: &str) -> Result<Self, ExportError> {
        let raw: RawTemplate =
            serde_json::from_str(text).map_err(|e| ExportError::TemplateParse(e.to_string()))?;

        let header = raw
            .header
            .ok_or(ExportError::MissingTemplateField("header"))?;

        Ok(SheetTemplate {
            header,
            properties: raw.properties,
            summation_headers: raw.summation_headers,
            replace: raw.replace,
            extended_replace: raw.extended_replace,
            format_cell_value: raw.format_cell_value,
            header_text_color: raw.header_text_color,
            header_background_color: raw.header_background_color,
            wrap_text_headers: raw.wrap_text_headers,
            header_comments: raw.header_comments,
        })
    }
}
