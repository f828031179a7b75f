//! Generic resource view over a collection's attribute map.

use crate::attributes::AttributeMap;
use crate::plugin::Record;
use serde_json::{Map, Value};

/// Keeps visible attributes and, when `fields` is non-empty, only the requested ones.
/// Primary keys are always kept.
pub struct ResourceView<'a> {
    attr_info: &'a AttributeMap,
    fields: Vec<String>,
}

impl<'a> ResourceView<'a> {
    pub fn new(attr_info: &'a AttributeMap) -> Self {
        ResourceView {
            attr_info,
            fields: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    fn shows(&self, attr: &str) -> bool {
        let Some(spec) = self.attr_info.get(attr) else {
            return false;
        };
        if spec.primary_key {
            return true;
        }
        spec.is_visible && (self.fields.is_empty() || self.fields.iter().any(|f| f == attr))
    }

    pub fn build(&self, record: &Record) -> Value {
        let body: Map<String, Value> = record
            .iter()
            .filter(|(k, _)| self.shows(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(body)
    }

    pub fn build_all(&self, records: &[Record]) -> Vec<Value> {
        records.iter().map(|r| self.build(r)).collect()
    }
}
