//! Named records with ordered fields

use std::sync::Arc;

use indexmap::IndexMap;

use super::Value;

/// A record instance with named fields.
///
/// Unlike a map, a record carries a type name, so cached lookups can tell two
/// record types apart even when their fields overlap. Lookup on a record
/// tries `name`, then `getName`, then `isName`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The record's type name (e.g., "Item", "User")
    pub type_name: Arc<str>,

    /// The record's fields in definition order
    pub fields: IndexMap<String, Value>,
}

impl Record {
    /// Create a new empty record
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Add a field (builder pattern)
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a field by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Whether the record has a field with this name
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder_preserves_order() {
        let record = Record::new("Item")
            .with_field("name", "Widget")
            .with_field("price", 3);

        let names: Vec<&str> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["name", "price"]);
        assert_eq!(record.get("price"), Some(&Value::Int(3)));
        assert!(record.contains("name"));
        assert!(!record.contains("getName"));
    }
}
