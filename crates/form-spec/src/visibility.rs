use crate::answers::{AnswerSet, answer_texts};
use crate::expr::evaluate_relevance;
use crate::spec::field::{DependsOperator, FieldDefinition};
use crate::spec::form::CompiledForm;

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// Whether `field` is shown under the current answers.
///
/// A `relevant` expression wins over the legacy `depends_on` pair; the two are
/// never combined.
pub fn is_relevant(field: &FieldDefinition, answers: &AnswerSet) -> bool {
    if let Some(expr) = field.relevant_expr() {
        return evaluate_relevance(expr, answers);
    }
    let Some(parent) = field.depends_on_field() else {
        return true;
    };
    let parent_values = answers.present(parent).map(answer_texts).unwrap_or_default();
    match field.depends_value.as_deref().map(str::trim) {
        None | Some("") => match field.depends_operator {
            DependsOperator::Eq => !parent_values.is_empty(),
            DependsOperator::Ne => parent_values.is_empty(),
        },
        Some(expected) => {
            let matched = parent_values.iter().any(|value| value == expected);
            match field.depends_operator {
                DependsOperator::Eq => matched,
                DependsOperator::Ne => !matched,
            }
        }
    }
}

/// Relevance of every renderable field.
pub fn resolve_visibility(form: &CompiledForm, answers: &AnswerSet) -> VisibilityMap {
    form.fields
        .iter()
        .map(|field| (field.name.clone(), is_relevant(field, answers)))
        .collect()
}

/// Visible fields in form order.
pub fn visible_fields<'f>(form: &'f CompiledForm, answers: &AnswerSet) -> Vec<&'f FieldDefinition> {
    form.fields
        .iter()
        .filter(|field| is_relevant(field, answers))
        .collect()
}
