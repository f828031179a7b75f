//! Attribute descriptors as they appear in the registry and in extension files.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Default for an attribute on create.
///
/// `NotSpecified` marks an optional attribute that the plugin generates when the
/// client omits it. It is distinct from a literal `null` default.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
    NotSpecified,
    Value(Value),
}

impl DefaultValue {
    pub fn to_attr(&self) -> AttrValue {
        match self {
            DefaultValue::NotSpecified => AttrValue::NotSpecified,
            DefaultValue::Value(v) => AttrValue::Set(v.clone()),
        }
    }
}

/// In extension files a generated default is written as `{ "generated": true }`.
impl<'de> Deserialize<'de> for DefaultValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Value::deserialize(deserializer)?;
        if let Value::Object(obj) = &v {
            if obj.len() == 1 && obj.get("generated") == Some(&Value::Bool(true)) {
                return Ok(DefaultValue::NotSpecified);
            }
        }
        Ok(DefaultValue::Value(v))
    }
}

impl Serialize for DefaultValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            DefaultValue::NotSpecified => serde_json::json!({ "generated": true }).serialize(serializer),
            DefaultValue::Value(v) => v.serialize(serializer),
        }
    }
}

/// Value conversion applied before validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Converter {
    ToBoolean,
    ToBooleanIfNotNone,
    ToInt,
    ToIntIfNotNone,
    NoneToEmptyList,
    NoneToEmptyDict,
    ToList,
    KvpStrToList,
    KvpListToDict,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    #[serde(default)]
    pub allow_post: bool,
    #[serde(default)]
    pub allow_put: bool,
    /// Absent means the attribute is mandatory on create.
    #[serde(
        default,
        deserialize_with = "present_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<DefaultValue>,
    /// Validator name (e.g. `type:string`) to its argument.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validate: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert_to: Option<Converter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert_list_to: Option<Converter>,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub required_by_policy: bool,
    #[serde(default)]
    pub enforce_policy: bool,
    #[serde(default)]
    pub primary_key: bool,
}

/// A present `default` key is always `Some`, even when its value is `null`.
fn present_default<'de, D>(deserializer: D) -> Result<Option<DefaultValue>, D::Error>
where
    D: Deserializer<'de>,
{
    DefaultValue::deserialize(deserializer).map(Some)
}

impl AttributeSpec {
    pub fn new(allow_post: bool, allow_put: bool) -> Self {
        AttributeSpec {
            allow_post,
            allow_put,
            ..Default::default()
        }
    }

    pub fn default_value(mut self, v: Value) -> Self {
        self.default = Some(DefaultValue::Value(v));
        self
    }

    pub fn generated(mut self) -> Self {
        self.default = Some(DefaultValue::NotSpecified);
        self
    }

    pub fn validate(mut self, rule: &str, arg: Value) -> Self {
        self.validate.insert(rule.to_string(), arg);
        self
    }

    pub fn convert_to(mut self, c: Converter) -> Self {
        self.convert_to = Some(c);
        self
    }

    pub fn convert_list_to(mut self, c: Converter) -> Self {
        self.convert_list_to = Some(c);
        self
    }

    pub fn visible(mut self) -> Self {
        self.is_visible = true;
        self
    }

    pub fn required_by_policy(mut self) -> Self {
        self.required_by_policy = true;
        self
    }

    pub fn enforce_policy(mut self) -> Self {
        self.enforce_policy = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn is_required_on_create(&self) -> bool {
        self.allow_post && self.default.is_none()
    }
}

/// Attribute name to rules for one collection.
pub type AttributeMap = BTreeMap<String, AttributeSpec>;

/// One attribute of a prepared request body.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    NotSpecified,
    Set(Value),
}

impl AttrValue {
    pub fn specified(&self) -> Option<&Value> {
        match self {
            AttrValue::Set(v) => Some(v),
            AttrValue::NotSpecified => None,
        }
    }
}

/// Prepared request body handed to the plugin.
pub type Attributes = BTreeMap<String, AttrValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_default_parses_from_marker_object() {
        let spec: AttributeSpec = serde_json::from_value(json!({
            "allow_post": true,
            "default": { "generated": true },
            "is_visible": true
        }))
        .unwrap();
        assert_eq!(spec.default, Some(DefaultValue::NotSpecified));
        assert!(!spec.is_required_on_create());
    }

    #[test]
    fn literal_null_default_is_not_generated() {
        let spec: AttributeSpec = serde_json::from_value(json!({
            "allow_post": true,
            "default": null
        }))
        .unwrap();
        assert_eq!(spec.default, Some(DefaultValue::Value(Value::Null)));
    }

    #[test]
    fn missing_default_makes_post_attribute_required() {
        let spec: AttributeSpec = serde_json::from_value(json!({
            "allow_post": true,
            "validate": { "type:uuid": null },
            "convert_to": "to_boolean"
        }))
        .unwrap();
        assert!(spec.is_required_on_create());
        assert_eq!(spec.convert_to, Some(Converter::ToBoolean));
        assert!(spec.validate.contains_key("type:uuid"));
    }
}
