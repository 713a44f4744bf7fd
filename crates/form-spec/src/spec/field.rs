use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Supported field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Decimal,
    Date,
    Time,
    Datetime,
    SelectOne,
    SelectMultiple,
    Geopoint,
    Image,
    Audio,
    Video,
    Draw,
    Note,
    Barcode,
    Acknowledge,
    Calculate,
    Hidden,
    File,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Datetime => "datetime",
            FieldType::SelectOne => "select_one",
            FieldType::SelectMultiple => "select_multiple",
            FieldType::Geopoint => "geopoint",
            FieldType::Image => "image",
            FieldType::Audio => "audio",
            FieldType::Video => "video",
            FieldType::Draw => "draw",
            FieldType::Note => "note",
            FieldType::Barcode => "barcode",
            FieldType::Acknowledge => "acknowledge",
            FieldType::Calculate => "calculate",
            FieldType::Hidden => "hidden",
            FieldType::File => "file",
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self, FieldType::SelectOne | FieldType::SelectMultiple)
    }

    /// JSON type written back by `decompile`.
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Decimal => "number",
            FieldType::SelectMultiple => "array",
            FieldType::Geopoint => "object",
            FieldType::Acknowledge => "boolean",
            _ => "string",
        }
    }

    /// JSON-schema `format` matching the type, if any.
    pub fn json_format(&self) -> Option<&'static str> {
        match self {
            FieldType::Date => Some("date"),
            FieldType::Time => Some("time"),
            FieldType::Datetime => Some("date-time"),
            _ => None,
        }
    }
}

/// Operator of the legacy `depends_on` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum DependsOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

/// One selectable option of a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceOption {
    /// Empty when the document omits it; compilation falls back to `value`.
    #[serde(default)]
    pub label: String,
    #[serde(deserialize_with = "lenient_text")]
    #[schemars(with = "String")]
    pub value: String,
    /// Bare parent value or an expression such as `${province}='kinshasa'`.
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub filter: Option<String>,
}

/// Text of a scalar read from a document; numbers and booleans keep their JSON spelling.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(|value| value_text(&value))
}

fn lenient_optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.is_null()).map(|value| value_text(&value)))
}

impl ChoiceOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Declarative bounds checked on every entered value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldValidation {
    pub fn is_empty(&self) -> bool {
        self == &FieldValidation::default()
    }
}

/// A compiled, renderable question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ChoiceOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_value: Option<String>,
    #[serde(default)]
    pub depends_operator: DependsOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_filter: Option<String>,
    #[serde(default, skip_serializing_if = "FieldValidation::is_empty")]
    pub validation: FieldValidation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub metadata: bool,
    #[serde(default)]
    pub display_only: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            required: false,
            group: None,
            order: None,
            options: None,
            depends_on: None,
            depends_value: None,
            depends_operator: DependsOperator::Eq,
            relevant: None,
            constraint: None,
            constraint_message: None,
            filter_field: None,
            choice_filter: None,
            validation: FieldValidation::default(),
            default_value: None,
            hint: None,
            appearance: None,
            hidden: false,
            metadata: false,
            display_only: false,
        }
    }

    /// Excluded fields never appear in the visible list but stay addressable by expressions.
    pub fn is_excluded(&self) -> bool {
        self.hidden
            || self.metadata
            || self.display_only
            || matches!(self.kind, FieldType::Hidden | FieldType::Calculate)
    }

    /// The `relevant` expression when it is set and non-blank.
    pub fn relevant_expr(&self) -> Option<&str> {
        non_blank(self.relevant.as_deref())
    }

    pub fn constraint_expr(&self) -> Option<&str> {
        non_blank(self.constraint.as_deref())
    }

    pub fn depends_on_field(&self) -> Option<&str> {
        non_blank(self.depends_on.as_deref())
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
