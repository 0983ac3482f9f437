//! Runtime value classification and the sink-facing cell value union.
//!
//! Records are plain `serde_json::Value` graphs. Every property value is
//! classified into a [`DataType`] by inspecting the runtime value only —
//! there is no declared schema anywhere in the pipeline.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;

// Pre-compiled patterns for date-shaped strings
static ISO_DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

static ISO_DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Semantic type of a property value, inferred from the runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    Integer,
    Float,
    Date,
    Boolean,
    Object,
    Set,
    List,
    Map,
}

/// Classify a runtime value into its [`DataType`].
///
/// `null` classifies as `Object`: the resolver's object branch then recurses
/// into the null and comes back empty, which is the behavior the rest of the
/// pipeline relies on for absent nested records.
pub fn classify(value: &Value) -> DataType {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                DataType::Integer
            } else {
                DataType::Float
            }
        }
        Value::Bool(_) => DataType::Boolean,
        Value::String(s) => {
            if ISO_DATETIME_REGEX.is_match(s) || ISO_DATE_REGEX.is_match(s) {
                DataType::Date
            } else {
                DataType::Text
            }
        }
        Value::Array(_) => DataType::List,
        Value::Object(_) => DataType::Object,
        Value::Null => DataType::Object,
    }
}

/// One cell's worth of output: the scalar union the tabular sink accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    /// The empty cell; what unresolvable paths degrade to.
    pub fn empty() -> Self {
        CellValue::Text(String::new())
    }

    /// True when the rendered value is blank after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Convert a scalar JSON value into a cell value.
    ///
    /// Date-shaped strings become real date cells; arrays and maps fall back
    /// to their compact JSON rendering.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => match parse_date(s) {
                Some(dt) => CellValue::Date(dt),
                None => CellValue::Text(s.clone()),
            },
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CellValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    CellValue::Integer(u as i64)
                } else {
                    CellValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Null => CellValue::empty(),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Date(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Parse a date-shaped string into a naive timestamp.
///
/// Accepts RFC 3339 timestamps (offset folded to UTC), offset-less
/// timestamps, and bare dates (midnight).
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    if ISO_DATETIME_REGEX.is_match(s) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.naive_utc());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(dt);
        }
    }
    if ISO_DATE_REGEX.is_match(s) {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
