use std::collections::BTreeSet;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::answers::{
    AnswerSet, ValidationError, ValidationResult, answer_texts, as_number, is_present, scalar_text,
};
use crate::config::EngineConfig;
use crate::expr::evaluate_constraint;
use crate::options::resolve_options;
use crate::spec::field::{ChoiceOption, FieldDefinition, FieldType};
use crate::spec::form::CompiledForm;
use crate::visibility::resolve_visibility;

/// Validates every visible field of a submission.
pub fn validate(
    form: &CompiledForm,
    answers: &AnswerSet,
    config: &EngineConfig,
) -> ValidationResult {
    let visibility = resolve_visibility(form, answers);

    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for field in &form.fields {
        if !visibility.get(&field.name).copied().unwrap_or(true) {
            continue;
        }

        match answers.present(&field.name) {
            None => {
                if field.required {
                    missing_required.push(field.name.clone());
                }
            }
            Some(value) => {
                let eligible = field
                    .kind
                    .is_select()
                    .then(|| resolve_options(field, form, answers, config));
                if let Some(error) = validate_value(field, value, answers, eligible.as_deref()) {
                    errors.push(error);
                }
            }
        }
    }

    let all_names: BTreeSet<&str> = form.all_fields().map(|field| field.name.as_str()).collect();
    let unknown_fields: Vec<String> = answers
        .keys()
        .filter(|key| !all_names.contains(key.as_str()))
        .cloned()
        .collect();

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
        errors,
        missing_required,
        unknown_fields,
    }
}

/// Checks one entered value: type, constraint expression, declared bounds,
/// then option eligibility.
///
/// `eligible` restricts select answers to a filtered option list; `None` falls
/// back to the field's full options. Empty values are always accepted.
pub fn validate_value(
    field: &FieldDefinition,
    value: &Value,
    answers: &AnswerSet,
    eligible: Option<&[ChoiceOption]>,
) -> Option<ValidationError> {
    if !is_present(value) {
        return None;
    }

    if !matches_type(field.kind, value) {
        return Some(base_error(
            field,
            format!("expected a {} value", field.kind.as_str()),
            "type_mismatch",
        ));
    }

    if let Some(message) = evaluate_constraint(field, value, answers) {
        return Some(base_error(field, message, "constraint"));
    }

    if let Some(error) = enforce_bounds(field, value) {
        return Some(error);
    }

    if field.kind.is_select()
        && let Some(options) = eligible.or(field.options.as_deref())
    {
        let chosen = answer_texts(value);
        if let Some(invalid) = chosen
            .iter()
            .find(|text| !options.iter().any(|option| option.value.trim() == text.as_str()))
        {
            return Some(base_error(
                field,
                format!("'{}' is not an eligible option", invalid),
                "option_not_eligible",
            ));
        }
    }

    None
}

fn matches_type(kind: FieldType, value: &Value) -> bool {
    match kind {
        FieldType::Integer => match value {
            Value::Number(number) => {
                number.is_i64()
                    || number.is_u64()
                    || number.as_f64().is_some_and(|n| n.fract() == 0.0)
            }
            Value::String(text) => text.trim().parse::<i64>().is_ok(),
            _ => false,
        },
        FieldType::Decimal => as_number(value).is_some(),
        FieldType::SelectOne => matches!(value, Value::String(_) | Value::Number(_)),
        FieldType::SelectMultiple => value
            .as_array()
            .is_some_and(|items| items.iter().all(|item| scalar_text(item).is_some())),
        FieldType::Geopoint => value.as_object().is_some_and(|point| {
            ["latitude", "longitude"]
                .iter()
                .all(|key| point.get(*key).is_some_and(Value::is_number))
        }),
        FieldType::Acknowledge => match value {
            Value::Bool(_) => true,
            Value::String(text) => text.trim() == "OK",
            _ => false,
        },
        FieldType::Note | FieldType::Calculate | FieldType::Hidden => true,
        _ => value.is_string(),
    }
}

fn enforce_bounds(field: &FieldDefinition, value: &Value) -> Option<ValidationError> {
    let bounds = &field.validation;
    let text = match value {
        Value::String(text) => Some(text.as_str()),
        _ => None,
    };

    if let Some(pattern) = bounds.pattern.as_deref()
        && let Some(text) = text
    {
        match Regex::new(pattern) {
            Ok(regex) if !regex.is_match(text) => {
                return Some(base_error(
                    field,
                    format!("value does not match pattern {}", pattern),
                    "pattern_mismatch",
                ));
            }
            Ok(_) => {}
            Err(err) => {
                warn!(field = %field.name, %pattern, %err, "invalid pattern; check skipped")
            }
        }
    }

    if let Some(min_len) = bounds.min_length
        && let Some(text) = text
        && text.chars().count() < min_len
    {
        return Some(base_error(
            field,
            format!("must be at least {} characters", min_len),
            "min_length",
        ));
    }

    if let Some(max_len) = bounds.max_length
        && let Some(text) = text
        && text.chars().count() > max_len
    {
        return Some(base_error(
            field,
            format!("must be at most {} characters", max_len),
            "max_length",
        ));
    }

    let number = match field.kind {
        FieldType::Integer | FieldType::Decimal => as_number(value),
        _ => value.as_f64(),
    };

    if let Some(min) = bounds.min
        && let Some(number) = number
        && number < min
    {
        return Some(base_error(field, format!("must be at least {}", min), "min"));
    }

    if let Some(max) = bounds.max
        && let Some(number) = number
        && number > max
    {
        return Some(base_error(field, format!("must be at most {}", max), "max"));
    }

    None
}

fn base_error(field: &FieldDefinition, message: impl Into<String>, code: &str) -> ValidationError {
    ValidationError::for_field(&field.name, message, code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile_value;
    use serde_json::json;

    fn form() -> CompiledForm {
        compile_value(&json!({
            "properties": {
                "age": { "type": "integer", "minimum": 0, "maximum": 120 },
                "name": { "type": "string", "minLength": 2, "maxLength": 5 },
                "code": { "type": "string", "pattern": "^[A-Z]{3}$" },
                "role": { "type": "string", "enum": ["nurse", "doctor"] },
                "tags": { "type": "array", "items": { "type": "string", "enum": ["a", "b"] } },
                "where": { "type": "object" },
                "ok": { "type": "boolean" }
            },
            "required": ["age", "name"]
        }))
    }

    fn check(name: &str, value: Value) -> Option<String> {
        let form = form();
        let field = form.field(name).expect("field");
        validate_value(field, &value, &AnswerSet::new(), None).and_then(|error| error.code)
    }

    #[test]
    fn type_checks_follow_field_kind() {
        assert_eq!(check("age", json!("12")), None);
        assert_eq!(check("age", json!(12.5)).as_deref(), Some("type_mismatch"));
        assert_eq!(check("name", json!(5)).as_deref(), Some("type_mismatch"));
        assert_eq!(check("where", json!({"latitude": -4.3, "longitude": 15.3})), None);
        assert_eq!(check("where", json!({"latitude": -4.3})).as_deref(), Some("type_mismatch"));
        assert_eq!(check("ok", json!("OK")), None);
        assert_eq!(check("ok", json!("yes")).as_deref(), Some("type_mismatch"));
    }

    #[test]
    fn bounds_are_enforced() {
        assert_eq!(check("age", json!(130)).as_deref(), Some("max"));
        assert_eq!(check("age", json!("-1")).as_deref(), Some("min"));
        assert_eq!(check("name", json!("A")).as_deref(), Some("min_length"));
        assert_eq!(check("name", json!("Abcdef")).as_deref(), Some("max_length"));
        assert_eq!(check("code", json!("abc")).as_deref(), Some("pattern_mismatch"));
        assert_eq!(check("code", json!("ABC")), None);
    }

    #[test]
    fn bounds_apply_to_the_value_as_entered() {
        assert_eq!(check("code", json!(" ABC ")).as_deref(), Some("pattern_mismatch"));
        assert_eq!(check("name", json!("  Abcd ")).as_deref(), Some("max_length"));
    }

    #[test]
    fn select_answers_must_be_offered() {
        assert_eq!(check("role", json!("nurse")), None);
        assert_eq!(check("role", json!("pilot")).as_deref(), Some("option_not_eligible"));
        assert_eq!(check("tags", json!(["a", "b"])), None);
        assert_eq!(check("tags", json!(["a", "z"])).as_deref(), Some("option_not_eligible"));
    }

    #[test]
    fn filtered_options_narrow_eligibility() {
        let form = form();
        let role = form.field("role").expect("role");
        let only_doctor = [ChoiceOption::new("Doctor", "doctor")];
        let error = validate_value(role, &json!("nurse"), &AnswerSet::new(), Some(&only_doctor));
        assert_eq!(error.and_then(|e| e.code).as_deref(), Some("option_not_eligible"));
    }

    #[test]
    fn empty_values_are_accepted() {
        assert_eq!(check("age", json!("")), None);
        assert_eq!(check("tags", json!([])), None);
    }

    #[test]
    fn whole_submission() {
        let form = form();
        let answers = AnswerSet::from_value(&json!({"age": 30, "role": "pilot", "extra": 1}));
        let result = validate(&form, &answers, &EngineConfig::default());
        assert!(!result.valid);
        assert_eq!(result.missing_required, ["name"]);
        assert_eq!(result.unknown_fields, ["extra"]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field.as_deref(), Some("role"));
    }
}
