//! Path segment grammar.
//!
//! A path expression is a dot-separated chain of segments. Each segment names
//! one property and may carry a 1-based collection index or a filter clause:
//!
//! ```text
//! segment       := identifier ( "[" digits "]" )? ( "(" conditionList ")" )?
//! conditionList := condition ( ";" condition )*
//! condition     := key "!=" literal | key "=" literal
//! ```
//!
//! Examples: `itemPrice[2].priceListId` narrows the collection to its second
//! element; `value(priceListId=2)` keeps the scalar only when the sibling
//! property matches.

use once_cell::sync::Lazy;
use regex::Regex;

static INDEX_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([0-9]*)\]").unwrap());

static FILTER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]*)\)").unwrap());

/// Comparison operator inside a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
}

/// One filter condition, evaluated against a sibling property.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub op: Operator,
    pub literal: String,
}

/// A parsed path segment.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    /// Plain property name with index/filter syntax stripped.
    pub identifier: String,
    /// Surface index as written; 1-based, with `[0]` and `[]` meaning the
    /// first element.
    pub index: Option<usize>,
    pub conditions: Vec<Condition>,
}

impl PathSegment {
    /// Parse one segment (the text between two path separators).
    pub fn parse(segment: &str) -> Self {
        let identifier = FILTER_REGEX
            .replace_all(&INDEX_REGEX.replace_all(segment, ""), "")
            .into_owned();

        let index = INDEX_REGEX
            .captures(segment)
            .map(|cap| cap[1].parse::<usize>().unwrap_or(0));

        let conditions = FILTER_REGEX
            .captures(segment)
            .map(|cap| parse_conditions(&cap[1]))
            .unwrap_or_default();

        PathSegment {
            identifier,
            index,
            conditions,
        }
    }

    /// The 0-based collection offset for this segment's surface index.
    ///
    /// The surface syntax is 1-based, but `[0]` is accepted and treated the
    /// same as `[1]`.
    pub fn offset(&self) -> Option<usize> {
        self.index.map(|i| i.saturating_sub(1))
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    pub fn has_filter(&self) -> bool {
        !self.conditions.is_empty()
    }
}

/// Parse a `;`-separated condition list. Malformed entries (no operator, or
/// an operator appearing more than once) are dropped, not raised.
fn parse_conditions(body: &str) -> Vec<Condition> {
    let mut conditions = Vec::new();
    for expression in body.split(';') {
        let (op, parts): (Operator, Vec<&str>) = if expression.contains("!=") {
            (Operator::NotEq, expression.split("!=").collect())
        } else if expression.contains('=') {
            (Operator::Eq, expression.split('=').collect())
        } else {
            continue;
        };
        if parts.len() == 2 {
            conditions.push(Condition {
                key: parts[0].to_string(),
                op,
                literal: parts[1].to_string(),
            });
        }
    }
    conditions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifier() {
        let seg = PathSegment::parse("warehouseName");
        assert_eq!(seg.identifier, "warehouseName");
        assert_eq!(seg.index, None);
        assert!(seg.conditions.is_empty());
    }

    #[test]
    fn test_indexed_segment() {
        let seg = PathSegment::parse("itemPrice[2]");
        assert_eq!(seg.identifier, "itemPrice");
        assert_eq!(seg.index, Some(2));
        assert_eq!(seg.offset(), Some(1));
    }

    #[test]
    fn test_index_zero_means_first() {
        assert_eq!(PathSegment::parse("a[0]").offset(), Some(0));
        assert_eq!(PathSegment::parse("a[1]").offset(), Some(0));
        assert_eq!(PathSegment::parse("a[]").offset(), Some(0));
    }

    #[test]
    fn test_filter_segment() {
        let seg = PathSegment::parse("value(priceListId=2)");
        assert_eq!(seg.identifier, "value");
        assert_eq!(
            seg.conditions,
            vec![Condition {
                key: "priceListId".into(),
                op: Operator::Eq,
                literal: "2".into(),
            }]
        );
    }

    #[test]
    fn test_condition_list() {
        let seg = PathSegment::parse("value(priceListId=2;status!=archived)");
        assert_eq!(seg.conditions.len(), 2);
        assert_eq!(seg.conditions[1].op, Operator::NotEq);
        assert_eq!(seg.conditions[1].literal, "archived");
    }

    #[test]
    fn test_malformed_conditions_dropped() {
        let seg = PathSegment::parse("value(nonsense;a=b=c;ok=1)");
        assert_eq!(seg.conditions.len(), 1);
        assert_eq!(seg.conditions[0].key, "ok");
    }

    #[test]
    fn test_index_and_filter_together() {
        let seg = PathSegment::parse("rows[3](kind=summary)");
        assert_eq!(seg.identifier, "rows");
        assert_eq!(seg.offset(), Some(2));
        assert_eq!(seg.conditions.len(), 1);
    }
}
