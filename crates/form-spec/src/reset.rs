//! Clearing of answers that depend on a changed field.
//!
//! A field depends on `X` when its `depends_on` names `X` or when its
//! `relevant` expression contains the text `X`. The containment test is
//! textual, so `zone` also matches an expression mentioning `zone_id`.

use std::collections::{BTreeSet, VecDeque};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::answers::AnswerSet;
use crate::spec::field::FieldDefinition;
use crate::spec::form::CompiledForm;

/// How far clearing propagates from the changed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Direct dependents only.
    #[default]
    Direct,
    /// Dependents of dependents as well.
    Transitive,
}

/// Names of fields directly depending on `changed`, in form order.
pub fn dependents_of<'f>(
    changed: &str,
    fields: impl IntoIterator<Item = &'f FieldDefinition>,
) -> Vec<&'f str> {
    if changed.trim().is_empty() {
        return Vec::new();
    }
    fields
        .into_iter()
        .filter(|field| field.name != changed)
        .filter(|field| {
            field.depends_on_field() == Some(changed)
                || field
                    .relevant_expr()
                    .is_some_and(|expr| expr.contains(changed))
        })
        .map(|field| field.name.as_str())
        .collect()
}

/// Every field whose answer is invalidated by a change to `changed`.
pub fn fields_to_clear<'f>(
    form: &'f CompiledForm,
    changed: &str,
    policy: ResetPolicy,
) -> Vec<&'f str> {
    let direct = dependents_of(changed, form.all_fields());
    if policy == ResetPolicy::Direct {
        return direct;
    }

    let mut seen: BTreeSet<&str> = BTreeSet::from([changed]);
    let mut ordered = Vec::new();
    let mut queue: VecDeque<&str> = direct.into_iter().collect();
    while let Some(name) = queue.pop_front() {
        if !seen.insert(name) {
            continue;
        }
        ordered.push(name);
        queue.extend(dependents_of(name, form.all_fields()));
    }
    ordered
}

/// Removes dependent answers after `changed` was committed.
///
/// Returns the names whose stored answer was actually removed.
pub fn clear_dependents(
    form: &CompiledForm,
    answers: &mut AnswerSet,
    changed: &str,
    policy: ResetPolicy,
) -> Vec<String> {
    let mut cleared = Vec::new();
    for name in fields_to_clear(form, changed, policy) {
        if answers.remove(name).is_some() {
            cleared.push(name.to_string());
        }
    }
    if !cleared.is_empty() {
        debug!(field = %changed, ?cleared, "cleared dependent answers");
    }
    cleared
}
