use thiserror::Error;

/// Errors that abort an export.
///
/// Everything that can degrade gracefully (an unknown path, a failed filter,
/// a missing property) resolves to an empty value instead of surfacing here;
/// the variants below are the fatal taxonomy only.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The template text was not valid JSON.
    #[error("template is not valid JSON: {0}")]
    TemplateParse(String),

    /// A required template field was absent.
    #[error("template is missing required field `{0}`")]
    MissingTemplateField(&'static str),

    /// A `format_cell_value` rule asked for a numeric type the resolved
    /// value cannot be parsed into.
    #[error("cannot coerce `{value}` at `{path}` to {format}")]
    FormatCoercion {
        path: String,
        value: String,
        format: &'static str,
    },

    /// The workbook sink failed while writing or saving.
    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}
