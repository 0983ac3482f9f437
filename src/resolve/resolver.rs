//! The recursive path evaluator.
//!
//! `resolve` walks a dotted path expression through a record's object graph,
//! branching on the semantic type of each property it meets: scalars are
//! returned (subject to filter clauses), nested objects are descended into,
//! and collections either collapse, narrow to an indexed element, or expand
//! into a multi-value result that the table builder later turns into extra
//! rows.
//!
//! Resolution never fails for data-shaped reasons — unknown identifiers,
//! absent values, failed filters, and out-of-range indexes all degrade to an
//! empty value. The only fatal outcome is a `format_cell_value` coercion
//! that cannot parse.

use crate::error::ExportError;
use crate::resolve::introspect::{PropertyCache, PropertyDescriptor};
use crate::resolve::path::{Condition, Operator, PathSegment};
use crate::resolve::rules::RuleProcessor;
use crate::value::{CellValue, DataType};
use serde_json::Value;

/// Join separator for multi-valued collection results.
const MULTI_SEPARATOR: char = ';';

/// Outcome of resolving one path against one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A single value, possibly empty.
    Scalar(CellValue),
    /// One value per collection element; the table builder writes the first
    /// into the primary row and the rest into overflow rows.
    Multi(Vec<String>),
}

impl Resolved {
    pub fn empty() -> Self {
        Resolved::Scalar(CellValue::empty())
    }

    /// Render for joining into an enclosing collection's accumulator.
    pub fn render(&self) -> String {
        match self {
            Resolved::Scalar(value) => value.to_string(),
            Resolved::Multi(values) => values.join(";"),
        }
    }
}

/// Evaluates path expressions against record graphs.
///
/// Holds the template's rule processor; all per-pass mutable state lives in
/// the [`PropertyCache`] the caller threads through.
#[derive(Debug, Clone, Copy)]
pub struct ValueResolver<'t> {
    rules: RuleProcessor<'t>,
}

impl<'t> ValueResolver<'t> {
    pub fn new(rules: RuleProcessor<'t>) -> Self {
        ValueResolver { rules }
    }

    /// Resolve `path` against `root`.
    ///
    /// Replace and format rules are keyed by `path` as passed here — the
    /// original column expression — for the entire recursive walk.
    pub fn resolve<'a>(
        &self,
        cache: &mut PropertyCache<'a>,
        path: &str,
        root: &'a Value,
    ) -> Result<Resolved, ExportError> {
        let resolved = self.resolve_segment(cache, path, path, root)?;

        // A walk that came back empty without ever reaching a scalar leaf
        // still consults the rule tables once, so a replace rule may map the
        // empty value.
        match resolved {
            Resolved::Scalar(value) if value.to_string().is_empty() => {
                Ok(Resolved::Scalar(self.rules.apply(path, value)?))
            }
            other => Ok(other),
        }
    }

    fn resolve_segment<'a>(
        &self,
        cache: &mut PropertyCache<'a>,
        entry_path: &str,
        path: &str,
        root: &'a Value,
    ) -> Result<Resolved, ExportError> {
        if path.is_empty() || root.is_null() {
            return Ok(Resolved::empty());
        }

        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, rest),
            None => (path, ""),
        };
        let segment = PathSegment::parse(head);

        let Some(descriptor) = cache.descriptor(root, &segment.identifier) else {
            return Ok(Resolved::empty());
        };

        match descriptor.data_type {
            DataType::Set | DataType::List => {
                self.resolve_collection(cache, entry_path, &segment, rest, descriptor.value)
            }
            DataType::Object => self.resolve_segment(cache, entry_path, rest, descriptor.value),
            _ => self.resolve_scalar(cache, entry_path, &segment, root, &descriptor),
        }
    }

    /// Scalar leaf: apply the segment's filter clause against sibling
    /// properties, then the value rules keyed by the entry path. Any path
    /// remaining past a scalar is ignored.
    fn resolve_scalar<'a>(
        &self,
        cache: &mut PropertyCache<'a>,
        entry_path: &str,
        segment: &PathSegment,
        root: &'a Value,
        descriptor: &PropertyDescriptor<'a>,
    ) -> Result<Resolved, ExportError> {
        let value = if segment.has_filter() && !filter_matches(cache, root, &segment.conditions) {
            CellValue::empty()
        } else {
            CellValue::from_json(descriptor.value)
        };
        Ok(Resolved::Scalar(self.rules.apply(entry_path, value)?))
    }

    fn resolve_collection<'a>(
        &self,
        cache: &mut PropertyCache<'a>,
        entry_path: &str,
        segment: &PathSegment,
        rest: &str,
        value: &'a Value,
    ) -> Result<Resolved, ExportError> {
        let Some(elements) = value.as_array() else {
            return Ok(Resolved::empty());
        };
        if elements.is_empty() {
            return Ok(Resolved::empty());
        }

        // A one-element collection behaves as if the element were the
        // property itself, index or no index.
        if elements.len() == 1 {
            return self.resolve_segment(cache, entry_path, rest, &elements[0]);
        }

        if segment.has_index() {
            return match segment.offset().and_then(|offset| elements.get(offset)) {
                Some(element) => self.resolve_segment(cache, entry_path, rest, element),
                None => Ok(Resolved::empty()),
            };
        }

        // No index over several elements: resolve each, join the non-empty
        // renderings with the separator, then tie-break on separator count.
        let mut joined = String::new();
        for element in elements {
            let child = self.resolve_segment(cache, entry_path, rest, element)?;
            let rendered = child.render();
            if !rendered.is_empty() {
                joined.push_str(&rendered);
                joined.push(MULTI_SEPARATOR);
            }
        }

        let separators = joined.matches(MULTI_SEPARATOR).count();
        if separators > 1 {
            let mut parts: Vec<String> = joined.split(MULTI_SEPARATOR).map(str::to_string).collect();
            while parts.last().is_some_and(|part| part.is_empty()) {
                parts.pop();
            }
            if parts.is_empty() {
                return Ok(Resolved::empty());
            }
            return Ok(Resolved::Multi(parts));
        }
        if separators == 1 {
            // Exactly one non-empty child: strip the stray separator.
            return Ok(Resolved::Scalar(CellValue::Text(
                joined.replace(MULTI_SEPARATOR, ""),
            )));
        }
        Ok(Resolved::Scalar(CellValue::Text(joined)))
    }
}

/// Evaluate a filter clause against the sibling properties of `root`.
///
/// Conditions participate only when the sibling is Integer- or Text-typed;
/// anything else (including a missing sibling) is ignored. All participating
/// conditions must hold.
fn filter_matches<'a>(
    cache: &mut PropertyCache<'a>,
    root: &'a Value,
    conditions: &[Condition],
) -> bool {
    for condition in conditions {
        let Some(sibling) = cache.descriptor(root, &condition.key) else {
            continue;
        };
        let holds = match sibling.data_type {
            DataType::Integer => {
                match (sibling.value.as_i64(), condition.literal.trim().parse::<i64>()) {
                    (Some(actual), Ok(literal)) => match condition.op {
                        Operator::Eq => actual == literal,
                        Operator::NotEq => actual != literal,
                    },
                    _ => false,
                }
            }
            DataType::Text => {
                let actual = sibling.value.as_str().unwrap_or_default();
                match condition.op {
                    Operator::Eq => actual == condition.literal,
                    Operator::NotEq => actual != condition.literal,
                }
            }
            _ => continue,
        };
        if !holds {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::SheetTemplate;
    use serde_json::json;

    fn resolve_with(template_text: &str, path: &str, record: &Value) -> Resolved {
        let template = SheetTemplate::from_json_str(template_text).unwrap();
        let resolver = ValueResolver::new(RuleProcessor::new(&template));
        let mut cache = PropertyCache::new();
        resolver.resolve(&mut cache, path, record).unwrap()
    }

    fn resolve(path: &str, record: &Value) -> Resolved {
        resolve_with(r#"{"header": []}"#, path, record)
    }

    #[test]
    fn test_direct_scalar() {
        let record = json!({"name": "Alice", "qty": 3});
        assert_eq!(
            resolve("name", &record),
            Resolved::Scalar(CellValue::Text("Alice".into()))
        );
        assert_eq!(
            resolve("qty", &record),
            Resolved::Scalar(CellValue::Integer(3))
        );
    }

    #[test]
    fn test_nested_object_path() {
        let record = json!({"warehouse": {"name": "East", "capacity": 100}});
        assert_eq!(
            resolve("warehouse.name", &record),
            Resolved::Scalar(CellValue::Text("East".into()))
        );
    }

    #[test]
    fn test_null_nested_object_is_empty() {
        let record = json!({"warehouse": null});
        assert_eq!(resolve("warehouse.name", &record), Resolved::empty());
    }

    #[test]
    fn test_unknown_path_is_empty() {
        let record = json!({"name": "Alice"});
        assert_eq!(resolve("missing.leaf", &record), Resolved::empty());
        assert_eq!(resolve("missing", &record), Resolved::empty());
    }

    #[test]
    fn test_trailing_path_past_scalar_is_ignored() {
        let record = json!({"name": "Alice"});
        assert_eq!(
            resolve("name.extra.deep", &record),
            Resolved::Scalar(CellValue::Text("Alice".into()))
        );
    }

    #[test]
    fn test_single_element_collapse() {
        let record = json!({"prices": [{"id": 7}]});
        // With and without index/filter syntax the lone element is used.
        assert_eq!(
            resolve("prices.id", &record),
            Resolved::Scalar(CellValue::Integer(7))
        );
        assert_eq!(
            resolve("prices[3].id", &record),
            Resolved::Scalar(CellValue::Integer(7))
        );
    }

    #[test]
    fn test_index_normalization() {
        let record = json!({"prices": [{"id": 1}, {"id": 2}, {"id": 3}]});
        assert_eq!(
            resolve("prices[1].id", &record),
            Resolved::Scalar(CellValue::Integer(1))
        );
        assert_eq!(
            resolve("prices[2].id", &record),
            Resolved::Scalar(CellValue::Integer(2))
        );
        // Index 0 is treated as the first element.
        assert_eq!(
            resolve("prices[0].id", &record),
            Resolved::Scalar(CellValue::Integer(1))
        );
    }

    #[test]
    fn test_index_out_of_range_is_empty() {
        let record = json!({"prices": [{"id": 1}, {"id": 2}]});
        assert_eq!(resolve("prices[9].id", &record), Resolved::empty());
    }

    #[test]
    fn test_multi_value_expansion() {
        let record = json!({"prices": [{"id": 1}, {"id": 2}, {"id": 3}]});
        assert_eq!(
            resolve("prices.id", &record),
            Resolved::Multi(vec!["1".into(), "2".into(), "3".into()])
        );
    }

    #[test]
    fn test_two_values_expand() {
        let record = json!({"prices": [{"id": 1}, {"id": 2}]});
        assert_eq!(
            resolve("prices.id", &record),
            Resolved::Multi(vec!["1".into(), "2".into()])
        );
    }

    #[test]
    fn test_single_nonempty_child_strips_stray_separator() {
        // Two elements but only one resolves non-empty: the joined
        // intermediate carries exactly one separator, which is stripped.
        let record = json!({"prices": [{"id": 5}, {"other": true}]});
        assert_eq!(
            resolve("prices.id", &record),
            Resolved::Scalar(CellValue::Text("5".into()))
        );
    }

    #[test]
    fn test_all_children_empty_is_empty() {
        let record = json!({"prices": [{"a": 1}, {"b": 2}]});
        assert_eq!(resolve("prices.id", &record), Resolved::empty());
    }

    #[test]
    fn test_separator_inside_value_inflates_the_split() {
        // The tie-break counts every separator character, including ones
        // carried inside child values.
        let record = json!({"notes": [{"text": "a;b"}, {"text": "c"}]});
        assert_eq!(
            resolve("notes.text", &record),
            Resolved::Multi(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn test_filter_on_integer_sibling() {
        let record = json!({"price": {"value": 9, "priceListId": 2}});
        assert_eq!(
            resolve("price.value(priceListId=2)", &record),
            Resolved::Scalar(CellValue::Integer(9))
        );
        assert_eq!(
            resolve("price.value(priceListId=3)", &record),
            Resolved::empty()
        );
        assert_eq!(
            resolve("price.value(priceListId!=3)", &record),
            Resolved::Scalar(CellValue::Integer(9))
        );
    }

    #[test]
    fn test_filter_on_text_sibling() {
        let record = json!({"price": {"value": 9, "tier": "retail"}});
        assert_eq!(
            resolve("price.value(tier=retail)", &record),
            Resolved::Scalar(CellValue::Integer(9))
        );
        assert_eq!(
            resolve("price.value(tier!=retail)", &record),
            Resolved::empty()
        );
    }

    #[test]
    fn test_filter_conditions_are_anded() {
        let record = json!({"price": {"value": 9, "priceListId": 2, "tier": "retail"}});
        assert_eq!(
            resolve("price.value(priceListId=2;tier=retail)", &record),
            Resolved::Scalar(CellValue::Integer(9))
        );
        assert_eq!(
            resolve("price.value(priceListId=2;tier=wholesale)", &record),
            Resolved::empty()
        );
    }

    #[test]
    fn test_filter_on_missing_or_untyped_sibling_is_ignored() {
        let record = json!({"price": {"value": 9, "meta": {"x": 1}}});
        assert_eq!(
            resolve("price.value(nothere=1)", &record),
            Resolved::Scalar(CellValue::Integer(9))
        );
        assert_eq!(
            resolve("price.value(meta=1)", &record),
            Resolved::Scalar(CellValue::Integer(9))
        );
    }

    #[test]
    fn test_unparseable_integer_literal_fails_the_filter() {
        let record = json!({"price": {"value": 9, "priceListId": 2}});
        assert_eq!(
            resolve("price.value(priceListId=two)", &record),
            Resolved::empty()
        );
    }

    #[test]
    fn test_filter_narrows_collection_elements() {
        let record = json!({"prices": [
            {"value": 9, "priceListId": 1},
            {"value": 12, "priceListId": 2},
        ]});
        assert_eq!(
            resolve("prices.value(priceListId=2)", &record),
            Resolved::Scalar(CellValue::Text("12".into()))
        );
    }

    #[test]
    fn test_replace_applies_per_element_before_join() {
        let record = json!({"statuses": [{"code": 5}, {"code": 6}]});
        let template = r#"{
            "header": [],
            "replace": {"statuses.code": {"5": "Shipped", "6": "Delivered"}}
        }"#;
        assert_eq!(
            resolve_with(template, "statuses.code", &record),
            Resolved::Multi(vec!["Shipped".into(), "Delivered".into()])
        );
    }

    #[test]
    fn test_replace_round_trip() {
        let record = json!({"status": 5});
        let template = r#"{"header": [], "replace": {"status": {"5": "Shipped"}}}"#;
        assert_eq!(
            resolve_with(template, "status", &record),
            Resolved::Scalar(CellValue::Text("Shipped".into()))
        );

        let other = json!({"status": 4});
        assert_eq!(
            resolve_with(template, "status", &other),
            Resolved::Scalar(CellValue::Integer(4))
        );
    }

    #[test]
    fn test_format_coercion_failure_is_fatal() {
        let template =
            SheetTemplate::from_json_str(r#"{"header": [], "format_cell_value": {"qty": "INTEGER"}}"#)
                .unwrap();
        let resolver = ValueResolver::new(RuleProcessor::new(&template));
        let mut cache = PropertyCache::new();
        let record = json!({"qty": "abc"});
        let err = resolver.resolve(&mut cache, "qty", &record).unwrap_err();
        assert!(matches!(err, ExportError::FormatCoercion { .. }));
    }

    #[test]
    fn test_format_applies_at_the_leaf() {
        let record = json!({"item": {"qty": "42"}});
        let template = r#"{"header": [], "format_cell_value": {"item.qty": "INTEGER"}}"#;
        assert_eq!(
            resolve_with(template, "item.qty", &record),
            Resolved::Scalar(CellValue::Integer(42))
        );
    }

    #[test]
    fn test_date_scalar_resolves_to_date_cell() {
        let record = json!({"created": "2024-03-01"});
        match resolve("created", &record) {
            Resolved::Scalar(CellValue::Date(dt)) => {
                assert_eq!(dt.to_string(), "2024-03-01 00:00:00")
            }
            other => panic!("expected date cell, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_collection_path_is_empty() {
        // Collections need a leaf segment beneath them; the element recursion
        // sees an empty remaining path and yields empty.
        let record = json!({"tags": ["a", "b"]});
        assert_eq!(resolve("tags", &record), Resolved::empty());
    }

    #[test]
    fn test_idempotent_resolution_touches_cache_once() {
        let template = SheetTemplate::from_json_str(r#"{"header": []}"#).unwrap();
        let resolver = ValueResolver::new(RuleProcessor::new(&template));
        let mut cache = PropertyCache::new();
        let record = json!({"warehouse": {"name": "East"}});

        let first = resolver.resolve(&mut cache, "warehouse.name", &record).unwrap();
        let entries_after_first = cache.len();
        let second = resolver.resolve(&mut cache, "warehouse.name", &record).unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.len(), entries_after_first);
    }
}
