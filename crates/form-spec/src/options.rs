//! Choice filtering for select fields.
//!
//! The parent field is found from, in order: `filter_field`, the first
//! `${..}` reference inside `choice_filter`, the configured parent table, and
//! finally substring inference against the geographic hierarchy.

use std::collections::BTreeMap;

use crate::answers::{AnswerSet, answer_texts, scalar_text};
use crate::config::EngineConfig;
use crate::expr::{CompareOp, Expr, FieldRef, parse};
use crate::spec::field::{ChoiceOption, FieldDefinition, non_blank};
use crate::spec::form::CompiledForm;

/// Name of the field whose answer restricts `field`'s options.
pub fn resolve_parent_field(
    field: &FieldDefinition,
    form: &CompiledForm,
    config: &EngineConfig,
) -> Option<String> {
    if let Some(parent) = non_blank(field.filter_field.as_deref()) {
        return Some(parent.to_string());
    }
    if let Some(parent) = non_blank(field.choice_filter.as_deref()).and_then(first_reference) {
        return Some(parent);
    }
    if let Some(parent) = config.parent_fields.get(&field.name) {
        return Some(parent.clone());
    }
    infer_geographic_parent(field, form, &config.geo_hierarchy)
}

/// First `${name}` inside `text`.
fn first_reference(text: &str) -> Option<String> {
    let start = text.find("${")? + 2;
    let end = start + text[start..].find('}')?;
    let name = text[start..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Nearest ancestor level, present among the form's fields, of the level named in `field`.
fn infer_geographic_parent(
    field: &FieldDefinition,
    form: &CompiledForm,
    hierarchy: &[String],
) -> Option<String> {
    let level = hierarchy
        .iter()
        .rposition(|level| field.name.contains(level.as_str()))?;
    hierarchy[..level]
        .iter()
        .rev()
        .find_map(|ancestor| find_level_field(form, &field.name, ancestor))
        .map(|other| other.name.clone())
}

/// A field named exactly after `level`, else the first whose name contains it.
fn find_level_field<'f>(
    form: &'f CompiledForm,
    exclude: &str,
    level: &str,
) -> Option<&'f FieldDefinition> {
    form.all_fields()
        .filter(|other| other.name != exclude)
        .find(|other| other.name == level)
        .or_else(|| {
            form.all_fields()
                .filter(|other| other.name != exclude)
                .find(|other| other.name.contains(level))
        })
}

/// Options of `field` eligible under the current answers.
///
/// Returns all options when no parent is resolved or the parent is unanswered.
/// The field's own option list is never modified.
pub fn resolve_options(
    field: &FieldDefinition,
    form: &CompiledForm,
    answers: &AnswerSet,
    config: &EngineConfig,
) -> Vec<ChoiceOption> {
    let options = field.options.as_deref().unwrap_or_default();
    let Some(parent) = resolve_parent_field(field, form, config) else {
        return options.to_vec();
    };
    let Some(parent_answer) = answers.present(&parent) else {
        return options.to_vec();
    };
    let parent_values = answer_texts(parent_answer);
    options
        .iter()
        .filter(|option| option_matches(option, &parent, &parent_values, answers))
        .cloned()
        .collect()
}

/// Eligible options for every select field, excluded ones included.
pub fn resolve_all_options(
    form: &CompiledForm,
    answers: &AnswerSet,
    config: &EngineConfig,
) -> BTreeMap<String, Vec<ChoiceOption>> {
    form.all_fields()
        .filter(|field| field.kind.is_select())
        .map(|field| {
            (
                field.name.clone(),
                resolve_options(field, form, answers, config),
            )
        })
        .collect()
}

fn option_matches(
    option: &ChoiceOption,
    parent: &str,
    parent_values: &[String],
    answers: &AnswerSet,
) -> bool {
    let Some(filter) = non_blank(option.filter.as_deref()) else {
        return true;
    };
    if parent_values.iter().any(|value| value == filter) {
        return true;
    }
    match parse(filter) {
        Expr::Compare {
            field: FieldRef::Named(name),
            op: CompareOp::Eq,
            literal,
        } => name == parent && parent_values.contains(&literal.as_text().trim().to_string()),
        Expr::Field(FieldRef::Named(name)) if filter.starts_with("${") => answers
            .get(&name)
            .and_then(scalar_text)
            .is_some_and(|resolved| parent_values.contains(&resolved)),
        _ => false,
    }
}
