use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::spec::field::{ChoiceOption, DependsOperator, FieldType};

/// Persisted, JSON-Schema-like description of one form version.
///
/// `properties` is kept as raw JSON so that a single malformed descriptor can
/// be skipped without rejecting the whole document. Key order is declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(
        rename = "x-group-order",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub group_order: Vec<String>,
}

impl SchemaDocument {
    /// Reads a document without failing on structural problems.
    ///
    /// A missing or non-object `properties` yields an empty document; non-string
    /// entries of `required` are ignored.
    pub fn from_value(value: &Value) -> Self {
        let properties = value
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let required = value
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let group_order = value
            .get("x-group-order")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            title: value.get("title").and_then(Value::as_str).map(String::from),
            properties,
            required,
            group_order,
        }
    }
}

/// Item descriptor of an `array` property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ItemsDescriptor {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub json_type: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

/// A single entry of `properties`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PropertyDescriptor {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub json_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "x-order", default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(rename = "x-group", default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(rename = "x-type", default, skip_serializing_if = "Option::is_none")]
    pub type_override: Option<FieldType>,
    #[serde(rename = "x-options", default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ChoiceOption>>,
    #[serde(rename = "x-relevant", default, skip_serializing_if = "Option::is_none")]
    pub relevant: Option<String>,
    #[serde(rename = "x-constraint", default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    #[serde(
        rename = "x-constraint-message",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub constraint_message: Option<String>,
    #[serde(rename = "x-depends-on", default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    #[serde(
        rename = "x-depends-value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub depends_value: Option<String>,
    #[serde(
        rename = "x-depends-operator",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub depends_operator: Option<DependsOperator>,
    #[serde(rename = "x-filter-field", default, skip_serializing_if = "Option::is_none")]
    pub filter_field: Option<String>,
    #[serde(
        rename = "x-choice-filter",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub choice_filter: Option<String>,
    #[serde(rename = "x-appearance", default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    #[serde(rename = "x-hidden", default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(rename = "x-metadata", default, skip_serializing_if = "is_false")]
    pub metadata: bool,
    #[serde(rename = "x-display-only", default, skip_serializing_if = "is_false")]
    pub display_only: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}
