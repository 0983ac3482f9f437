//! # Rowforge - Template-Driven Tabular Export
//!
//! A library for exporting in-memory collections of structured records into
//! spreadsheet rows according to a declarative JSON template.
//!
//! The core is a hierarchical property-path resolver: given a dotted path
//! expression like `itemPrice[2].priceListId`, it navigates an arbitrary
//! record graph - nested objects and nested collections included - extracts
//! scalar values, expands one-to-many relations into additional rows, and
//! applies the template's conditional filters, value substitutions, and type
//! coercions along the way.
//!
//! ## Modules
//!
//! - **resolve**: path grammar, property introspection, the recursive
//!   evaluator, and rule application
//! - **table**: build orchestration and multi-value row expansion
//! - **sink**: the output surface - an xlsx workbook sink and an in-memory
//!   recording sink
//! - **template**: the declarative JSON template
//!
//! ## Quick Start
//!
//! ```rust
//! use rowforge::{export_records, MemorySink, SheetTemplate};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), rowforge::ExportError> {
//! let template = SheetTemplate::from_json_str(r#"{
//!     "header": ["Order", "Item"],
//!     "properties": ["orderNumber", "items.sku"]
//! }"#)?;
//!
//! let records = vec![json!({
//!     "orderNumber": "SO-17",
//!     "items": [{"sku": "A-1"}, {"sku": "B-2"}]
//! })];
//!
//! let mut sink = MemorySink::new();
//! export_records(&template, &records, &mut sink)?;
//!
//! // One primary row plus one overflow row for the second item.
//! assert_eq!(sink.rows().len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! Typed structs become records through serde:
//!
//! ```rust
//! use rowforge::record_from;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Order {
//!     order_number: String,
//!     #[serde(skip)]
//!     audit_token: u64,
//! }
//!
//! let record = record_from(&Order { order_number: "SO-17".into(), audit_token: 9 });
//! assert!(record.get("audit_token").is_none());
//! ```

use serde_json::Value;
use std::path::Path;
use tracing::{debug, error};

pub mod error;
pub mod resolve;
pub mod sink;
pub mod table;
pub mod template;
pub mod value;

// Re-export commonly used types for convenience
pub use error::ExportError;
pub use resolve::{record_from, PropertyCache, Resolved, RuleProcessor, ValueResolver};
pub use sink::{HeaderStyle, MemorySink, TabularSink, XlsxSink};
pub use table::TableBuilder;
pub use template::{CellFormat, ExtendedReplace, SheetTemplate};
pub use value::{CellValue, DataType};

/// Main entry point: export a record list through a template into a sink.
///
/// The sink is closed exactly once, on the success path and on the error
/// path alike; a build error takes precedence over a close error.
pub fn export_records<S: TabularSink>(
    template: &SheetTemplate,
    records: &[Value],
    sink: &mut S,
) -> Result<(), ExportError> {
    debug!(
        records = records.len(),
        columns = template.properties.len(),
        "starting export"
    );

    let outcome = {
        let mut builder = TableBuilder::new(template, sink);
        builder.process(records)
    };

    let closed = sink.close();
    match (outcome, closed) {
        (Err(e), Err(close_err)) => {
            error!(error = %close_err, "sink close failed after build error");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(close_err)) => Err(close_err),
        (Ok(()), Ok(())) => Ok(()),
    }
}

/// Convenience wrapper: export straight to an xlsx workbook on disk.
pub fn export_to_xlsx(
    template: &SheetTemplate,
    records: &[Value],
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let mut sink = XlsxSink::new(path.as_ref())?;
    export_records(template, records, &mut sink)
}
