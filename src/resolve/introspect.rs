//! Property introspection and the per-pass identity cache.
//!
//! A record is any `serde_json::Value`; its declared properties are the keys
//! of the underlying object. Typed Rust structs enter the pipeline through
//! [`record_from`], which makes serde derive the property-enumeration
//! contract: `#[serde(skip)]` marks a property ignored, and a
//! `#[serde(flatten)]`-embedded base struct contributes the single level of
//! inherited properties the resolver expects.
//!
//! Introspection is memoized per value node for the duration of one
//! table-build pass. The cache key is node identity (the node's address
//! inside the borrowed record graph), never value equality, so two distinct
//! but equal objects each get their own entry.

use crate::value::{classify, DataType};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// One declared property of a record: name, value handle, and the semantic
/// type inferred from the runtime value.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor<'a> {
    pub name: String,
    pub value: &'a Value,
    pub data_type: DataType,
}

/// Mapping from property name to descriptor for one object instance.
pub type PropertyMap<'a> = HashMap<String, PropertyDescriptor<'a>>;

/// Memoizes property maps keyed by object identity, scoped to one
/// table-build pass. A new pass must start with a fresh cache.
#[derive(Debug, Default)]
pub struct PropertyCache<'a> {
    entries: HashMap<usize, PropertyMap<'a>>,
}

impl<'a> PropertyCache<'a> {
    pub fn new() -> Self {
        PropertyCache {
            entries: HashMap::new(),
        }
    }

    /// Look up one property of `obj`, loading and caching the full property
    /// map on first visit. Returns `None` for unknown names and for roots
    /// that have no properties at all (scalars, arrays, null).
    pub fn descriptor(&mut self, obj: &'a Value, name: &str) -> Option<PropertyDescriptor<'a>> {
        self.properties(obj).get(name).cloned()
    }

    /// The full property map for `obj`, computed on first visit.
    pub fn properties(&mut self, obj: &'a Value) -> &PropertyMap<'a> {
        let key = obj as *const Value as usize;
        self.entries.entry(key).or_insert_with(|| load_properties(obj))
    }

    /// Number of distinct objects introspected so far in this pass.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Enumerate the declared properties of one object instance.
fn load_properties(obj: &Value) -> PropertyMap<'_> {
    let mut map = PropertyMap::new();
    if let Value::Object(fields) = obj {
        for (name, value) in fields {
            map.insert(
                name.clone(),
                PropertyDescriptor {
                    name: name.clone(),
                    value,
                    data_type: classify(value),
                },
            );
        }
    }
    map
}

/// Convert a typed record into the value graph the resolver walks.
///
/// Serialization failures are logged and degrade to a null record (which
/// resolves every path to empty); they never abort an export.
pub fn record_from<T: Serialize>(record: &T) -> Value {
    match serde_json::to_value(record) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "record serialization failed; treating record as empty");
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_properties_of_object() {
        let record = json!({"sku": "A-1", "qty": 3, "prices": [1, 2]});
        let mut cache = PropertyCache::new();

        let sku = cache.descriptor(&record, "sku").unwrap();
        assert_eq!(sku.data_type, DataType::Text);
        let qty = cache.descriptor(&record, "qty").unwrap();
        assert_eq!(qty.data_type, DataType::Integer);
        let prices = cache.descriptor(&record, "prices").unwrap();
        assert_eq!(prices.data_type, DataType::List);
    }

    #[test]
    fn test_unknown_property_is_none() {
        let record = json!({"sku": "A-1"});
        let mut cache = PropertyCache::new();
        assert!(cache.descriptor(&record, "missing").is_none());
    }

    #[test]
    fn test_non_object_roots_have_no_properties() {
        let mut cache = PropertyCache::new();
        let scalar = json!(42);
        let array = json!([1, 2]);
        assert!(cache.descriptor(&scalar, "anything").is_none());
        assert!(cache.descriptor(&array, "anything").is_none());
        assert!(cache.descriptor(&Value::Null, "anything").is_none());
    }

    #[test]
    fn test_cache_is_identity_keyed_and_visited_once() {
        let record = json!({"sku": "A-1", "qty": 3});
        let twin = json!({"sku": "A-1", "qty": 3});
        let mut cache = PropertyCache::new();

        cache.descriptor(&record, "sku");
        cache.descriptor(&record, "qty");
        assert_eq!(cache.len(), 1);

        cache.descriptor(&twin, "sku");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_record_from_respects_serde_skip() {
        #[derive(serde::Serialize)]
        struct Item {
            sku: String,
            #[serde(skip)]
            _internal: u32,
        }

        let value = record_from(&Item {
            sku: "A-1".into(),
            _internal: 9,
        });
        let mut cache = PropertyCache::new();
        assert!(cache.descriptor(&value, "sku").is_some());
        assert!(cache.descriptor(&value, "_internal").is_none());
    }

    #[test]
    fn test_record_from_flattens_base_record() {
        #[derive(serde::Serialize)]
        struct Base {
            id: u32,
        }
        #[derive(serde::Serialize)]
        struct Item {
            #[serde(flatten)]
            base: Base,
            sku: String,
        }

        let value = record_from(&Item {
            base: Base { id: 7 },
            sku: "A-1".into(),
        });
        let mut cache = PropertyCache::new();
        assert!(cache.descriptor(&value, "id").is_some());
        assert!(cache.descriptor(&value, "sku").is_some());
    }
}
