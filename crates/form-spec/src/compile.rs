//! Schema document ⇄ compiled field list.
//!
//! `compile` never aborts: a descriptor that cannot be read is skipped and
//! reported in [`CompiledForm::diagnostics`]. `decompile` writes every
//! attribute back explicitly so that compiling its output reproduces the same
//! fields, order, options and expressions.

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};
use tracing::warn;

use crate::spec::field::{
    ChoiceOption, DependsOperator, FieldDefinition, FieldType, FieldValidation, value_text,
};
use crate::spec::form::{CompiledForm, Diagnostic};
use crate::spec::schema::{ItemsDescriptor, PropertyDescriptor, SchemaDocument};

/// Compiles a raw JSON schema document.
pub fn compile_value(value: &Value) -> CompiledForm {
    if !value.is_object() {
        warn!("schema document is not a JSON object; compiling to an empty form");
    }
    compile(&SchemaDocument::from_value(value))
}

/// Compiles a schema document into ordered field definitions.
pub fn compile(document: &SchemaDocument) -> CompiledForm {
    let required: BTreeSet<&str> = document.required.iter().map(String::as_str).collect();
    let mut diagnostics = Vec::new();
    let mut compiled = Vec::with_capacity(document.properties.len());

    for (index, (name, raw)) in document.properties.iter().enumerate() {
        match compile_property(name, raw, required.contains(name.as_str())) {
            Ok(field) => compiled.push((index, field)),
            Err(message) => {
                warn!(field = %name, %message, "skipping malformed property descriptor");
                diagnostics.push(Diagnostic::new(name, message));
            }
        }
    }

    compiled.sort_by_key(|(index, field)| (field.order.unwrap_or(i64::MAX), *index));

    let (excluded, fields): (Vec<_>, Vec<_>) = compiled
        .into_iter()
        .map(|(_, field)| field)
        .partition(FieldDefinition::is_excluded);

    let group_order = derive_group_order(&fields);

    CompiledForm {
        title: document.title.clone(),
        fields,
        excluded,
        group_order,
        diagnostics,
    }
}

/// Group names in order of first appearance among already-sorted fields.
pub fn derive_group_order(fields: &[FieldDefinition]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    fields
        .iter()
        .filter_map(|field| field.group.as_deref())
        .filter(|group| seen.insert(*group))
        .map(String::from)
        .collect()
}

fn compile_property(name: &str, raw: &Value, required: bool) -> Result<FieldDefinition, String> {
    if name.trim().is_empty() {
        return Err("field name is empty".into());
    }
    if !raw.is_object() {
        return Err("property descriptor must be an object".into());
    }
    let descriptor: PropertyDescriptor =
        serde_json::from_value(raw.clone()).map_err(|err| err.to_string())?;

    let kind = resolve_type(&descriptor);
    let options = if kind.is_select() {
        Some(resolve_options(kind, &descriptor))
    } else {
        None
    };

    Ok(FieldDefinition {
        name: name.to_string(),
        label: descriptor.title.clone().unwrap_or_else(|| name.to_string()),
        kind,
        required,
        group: descriptor.group,
        order: descriptor.order,
        options,
        depends_on: descriptor.depends_on,
        depends_value: descriptor.depends_value,
        depends_operator: descriptor.depends_operator.unwrap_or_default(),
        relevant: descriptor.relevant,
        constraint: descriptor.constraint,
        constraint_message: descriptor.constraint_message,
        filter_field: descriptor.filter_field,
        choice_filter: descriptor.choice_filter,
        validation: FieldValidation {
            min: descriptor.minimum,
            max: descriptor.maximum,
            min_length: descriptor.min_length,
            max_length: descriptor.max_length,
            pattern: descriptor.pattern,
        },
        default_value: descriptor.default.filter(|value| !value.is_null()),
        hint: descriptor.description,
        appearance: descriptor.appearance,
        hidden: descriptor.hidden,
        metadata: descriptor.metadata,
        display_only: descriptor.display_only,
    })
}

/// Override, then enumerated arrays, then enumerated strings, then the JSON type.
fn resolve_type(descriptor: &PropertyDescriptor) -> FieldType {
    if let Some(kind) = descriptor.type_override {
        return kind;
    }
    let json_type = descriptor.json_type.as_deref().unwrap_or("string");
    let items_enumerated = descriptor
        .items
        .as_ref()
        .and_then(|items| items.enum_values.as_ref())
        .is_some();
    if json_type == "array" && items_enumerated {
        return FieldType::SelectMultiple;
    }
    if json_type == "string" && descriptor.enum_values.is_some() {
        return FieldType::SelectOne;
    }
    match json_type {
        "string" => match descriptor.format.as_deref() {
            Some("date") => FieldType::Date,
            Some("time") => FieldType::Time,
            Some("date-time") => FieldType::Datetime,
            _ => FieldType::Text,
        },
        "integer" => FieldType::Integer,
        "number" => FieldType::Decimal,
        "boolean" => FieldType::Acknowledge,
        "object" => FieldType::Geopoint,
        _ => FieldType::Text,
    }
}

fn resolve_options(kind: FieldType, descriptor: &PropertyDescriptor) -> Vec<ChoiceOption> {
    if let Some(options) = &descriptor.options {
        return options
            .iter()
            .map(|option| {
                let mut option = option.clone();
                if option.label.trim().is_empty() {
                    option.label = option.value.clone();
                }
                option
            })
            .collect();
    }
    let item_values = descriptor
        .items
        .as_ref()
        .and_then(|items| items.enum_values.as_ref());
    let values = match kind {
        FieldType::SelectMultiple => item_values.or(descriptor.enum_values.as_ref()),
        _ => descriptor.enum_values.as_ref().or(item_values),
    };
    values
        .map(|values| {
            values
                .iter()
                .map(|value| {
                    let text = value_text(value);
                    ChoiceOption::new(text.clone(), text)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Rebuilds a schema document from compiled fields.
///
/// Fields are written in the given order, so recompiling yields the same
/// ordering even for fields without an explicit `order`.
pub fn decompile(fields: &[FieldDefinition], group_order: &[String]) -> SchemaDocument {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in fields {
        if field.required {
            required.push(field.name.clone());
        }
        let descriptor = describe_field(field);
        let value = serde_json::to_value(&descriptor).unwrap_or_else(|err| {
            warn!(field = %field.name, %err, "failed to encode property descriptor");
            json!({ "x-type": field.kind.as_str() })
        });
        properties.insert(field.name.clone(), value);
    }

    SchemaDocument {
        title: None,
        properties,
        required,
        group_order: group_order.to_vec(),
    }
}

impl CompiledForm {
    /// Decompiles every field, excluded ones included.
    pub fn to_document(&self) -> SchemaDocument {
        let fields: Vec<FieldDefinition> = self.all_fields().cloned().collect();
        let mut document = decompile(&fields, &self.group_order);
        document.title = self.title.clone();
        document
    }
}

fn describe_field(field: &FieldDefinition) -> PropertyDescriptor {
    let enum_values = field
        .options
        .as_ref()
        .map(|options| {
            options
                .iter()
                .map(|option| Value::String(option.value.clone()))
                .collect::<Vec<_>>()
        });
    let (top_enum, items) = match field.kind {
        FieldType::SelectMultiple => (
            None,
            Some(ItemsDescriptor {
                json_type: Some("string".into()),
                enum_values,
            }),
        ),
        FieldType::SelectOne => (enum_values, None),
        _ => (None, None),
    };
    let depends_operator = match field.depends_operator {
        DependsOperator::Ne => Some(DependsOperator::Ne),
        DependsOperator::Eq => None,
    };

    PropertyDescriptor {
        json_type: Some(field.kind.json_type().to_string()),
        title: Some(field.label.clone()),
        description: field.hint.clone(),
        enum_values: top_enum,
        items,
        default: field.default_value.clone(),
        format: field.kind.json_format().map(String::from),
        minimum: field.validation.min,
        maximum: field.validation.max,
        min_length: field.validation.min_length,
        max_length: field.validation.max_length,
        pattern: field.validation.pattern.clone(),
        order: field.order,
        group: field.group.clone(),
        type_override: Some(field.kind),
        options: field.options.clone(),
        relevant: field.relevant.clone(),
        constraint: field.constraint.clone(),
        constraint_message: field.constraint_message.clone(),
        depends_on: field.depends_on.clone(),
        depends_value: field.depends_value.clone(),
        depends_operator,
        filter_field: field.filter_field.clone(),
        choice_filter: field.choice_filter.clone(),
        appearance: field.appearance.clone(),
        hidden: field.hidden,
        metadata: field.metadata,
        display_only: field.display_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_override_wins_over_enum() {
        let form = compile_value(&json!({
            "properties": {
                "district": { "type": "string", "enum": ["a"], "x-type": "text" }
            }
        }));
        assert_eq!(form.fields[0].kind, FieldType::Text);
        assert!(form.fields[0].options.is_none());
    }

    #[test]
    fn enumerated_array_becomes_select_multiple() {
        let form = compile_value(&json!({
            "properties": {
                "symptoms": {
                    "type": "array",
                    "items": { "type": "string", "enum": ["fever", "cough"] }
                }
            }
        }));
        let field = &form.fields[0];
        assert_eq!(field.kind, FieldType::SelectMultiple);
        let values: Vec<_> = field
            .options
            .as_ref()
            .expect("options")
            .iter()
            .map(|option| option.value.as_str())
            .collect();
        assert_eq!(values, ["fever", "cough"]);
    }

    #[test]
    fn json_types_map_to_field_types() {
        let form = compile_value(&json!({
            "properties": {
                "age": { "type": "integer" },
                "weight": { "type": "number" },
                "visit": { "type": "string", "format": "date" },
                "consent": { "type": "boolean" },
                "location": { "type": "object" },
                "notes": {}
            }
        }));
        let kinds: Vec<_> = form.fields.iter().map(|field| field.kind).collect();
        assert_eq!(
            kinds,
            [
                FieldType::Integer,
                FieldType::Decimal,
                FieldType::Date,
                FieldType::Acknowledge,
                FieldType::Geopoint,
                FieldType::Text,
            ]
        );
    }

    #[test]
    fn missing_order_sorts_last_in_declaration_order() {
        let form = compile_value(&json!({
            "properties": {
                "c": {},
                "a": { "x-order": 2 },
                "d": {},
                "b": { "x-order": 1 }
            }
        }));
        let names: Vec<_> = form.fields.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c", "d"]);
    }

    #[test]
    fn group_order_follows_first_field_not_name() {
        let form = compile_value(&json!({
            "properties": {
                "z_field": { "x-group": "Zeta", "x-order": 1 },
                "a_field": { "x-group": "Alpha", "x-order": 2 },
                "z_again": { "x-group": "Zeta", "x-order": 3 }
            }
        }));
        assert_eq!(form.group_order, ["Zeta", "Alpha"]);
    }

    #[test]
    fn malformed_descriptor_is_skipped() {
        let form = compile_value(&json!({
            "properties": {
                "good": { "type": "string" },
                "bad_order": { "x-order": "first" },
                "bad_type": { "x-type": "slider" },
                "not_object": 5
            }
        }));
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.fields[0].name, "good");
        let skipped: Vec<_> = form.diagnostics.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(skipped, ["bad_order", "bad_type", "not_object"]);
    }

    #[test]
    fn document_without_properties_is_empty() {
        let form = compile_value(&json!({ "required": ["x"] }));
        assert!(form.fields.is_empty());
        assert!(form.diagnostics.is_empty());
        assert!(compile_value(&json!("nope")).fields.is_empty());
    }

    #[test]
    fn excluded_fields_are_kept_aside() {
        let form = compile_value(&json!({
            "properties": {
                "uuid": { "x-metadata": true },
                "score": { "x-type": "calculate" },
                "token": { "x-hidden": true },
                "intro": { "x-type": "note", "x-display-only": true },
                "name": { "type": "string" }
            }
        }));
        let visible: Vec<_> = form.fields.iter().map(|f| f.name.as_str()).collect();
        let excluded: Vec<_> = form.excluded.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(visible, ["name"]);
        assert_eq!(excluded, ["uuid", "score", "token", "intro"]);
        assert!(form.contains("score"));
    }

    #[test]
    fn explicit_options_keep_filters() {
        let form = compile_value(&json!({
            "properties": {
                "zone": {
                    "type": "string",
                    "enum": ["gombe", "kikwit"],
                    "x-options": [
                        { "label": "Gombe", "value": "gombe", "filter": "${province}='kinshasa'" },
                        { "label": "Kikwit", "value": "kikwit", "filter": "kwilu" }
                    ]
                }
            }
        }));
        let options = form.fields[0].options.as_ref().expect("options");
        assert_eq!(options[0].label, "Gombe");
        assert_eq!(options[0].filter.as_deref(), Some("${province}='kinshasa'"));
        assert_eq!(options[1].filter.as_deref(), Some("kwilu"));
    }

    #[test]
    fn numeric_option_values_compile_like_numeric_enums() {
        let form = compile_value(&json!({
            "properties": {
                "q": {
                    "type": "string",
                    "x-type": "select_one",
                    "x-options": [
                        { "label": "One", "value": 1, "filter": 10 },
                        { "value": 2 }
                    ]
                },
                "r": { "type": "integer", "x-type": "select_one", "enum": [1, 2] }
            }
        }));
        assert!(form.diagnostics.is_empty());
        let names: Vec<_> = form.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["q", "r"]);
        let options = form.fields[0].options.as_ref().expect("options");
        assert_eq!(options[0], ChoiceOption::new("One", "1").with_filter("10"));
        assert_eq!(options[1], ChoiceOption::new("2", "2"));
        let enumerated = form.fields[1].options.as_ref().expect("options");
        assert_eq!(enumerated[0].value, options[0].value);
    }
}
