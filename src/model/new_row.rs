use super::PropertyValue;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Property values for a page about to be created in the destination table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRowProperties {
    values: IndexMap<String, PropertyValue>,
}

impl NewRowProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: PropertyValue) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&PropertyValue> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `properties` object of a create-page request. Values Notion
    /// computes itself are left out.
    pub fn to_request(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_request_value()
                    .map(|request| (name.clone(), request))
            })
            .collect();
        Value::Object(map)
    }
}
