//! One form-filling session.
//!
//! A [`FormSession`] owns the answer set and is the only place answers change.
//! Every change runs the same sequence: validate the new value and stop on
//! failure, commit it, clear dependent answers, then recompute visibility and
//! options. Changes are applied one at a time through `&mut self`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::answers::{AnswerSet, ValidationError, is_present};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::options::{resolve_all_options, resolve_options};
use crate::reset::clear_dependents;
use crate::spec::field::ChoiceOption;
use crate::spec::form::CompiledForm;
use crate::validate::validate_value;
use crate::visibility::visible_fields;

/// Derived view of a form under one answer set.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Evaluation {
    /// Visible field names in form order.
    pub visible: Vec<String>,
    pub options_by_field: BTreeMap<String, Vec<ChoiceOption>>,
    pub errors_by_field: BTreeMap<String, String>,
}

impl Evaluation {
    pub fn is_visible(&self, name: &str) -> bool {
        self.visible.iter().any(|visible| visible == name)
    }
}

/// Computes visibility, eligible options and stored-value errors.
pub fn evaluate(form: &CompiledForm, answers: &AnswerSet, config: &EngineConfig) -> Evaluation {
    let visible = visible_fields(form, answers);
    let options_by_field = resolve_all_options(form, answers, config);

    let errors_by_field = visible
        .iter()
        .filter_map(|field| {
            let value = answers.present(&field.name)?;
            let eligible = options_by_field.get(&field.name).map(Vec::as_slice);
            validate_value(field, value, answers, eligible)
                .map(|error| (field.name.clone(), error.message))
        })
        .collect();

    Evaluation {
        visible: visible.iter().map(|field| field.name.clone()).collect(),
        options_by_field,
        errors_by_field,
    }
}

/// What happened to a proposed answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Stored; `cleared` lists dependents whose answers were removed.
    Accepted { cleared: Vec<String> },
    /// Discarded; the previous answer is untouched.
    Rejected { error: ValidationError },
}

impl AnswerOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AnswerOutcome::Accepted { .. })
    }
}

/// Result of a single answer change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerUpdate {
    pub outcome: AnswerOutcome,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone)]
pub struct FormSession<'f> {
    form: &'f CompiledForm,
    config: &'f EngineConfig,
    answers: AnswerSet,
    rejected: BTreeMap<String, String>,
}

impl<'f> FormSession<'f> {
    /// Starts a session seeded with the form's default values.
    pub fn new(form: &'f CompiledForm, config: &'f EngineConfig) -> Self {
        Self::with_answers(form, config, AnswerSet::with_defaults(form))
    }

    /// Resumes a session from previously stored answers.
    pub fn with_answers(
        form: &'f CompiledForm,
        config: &'f EngineConfig,
        answers: AnswerSet,
    ) -> Self {
        Self {
            form,
            config,
            answers,
            rejected: BTreeMap::new(),
        }
    }

    pub fn form(&self) -> &'f CompiledForm {
        self.form
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn into_answers(self) -> AnswerSet {
        self.answers
    }

    /// Proposes `value` for field `name`.
    ///
    /// An empty value clears the stored answer. Fails only when `name` is not
    /// a field of the form.
    pub fn set_answer(&mut self, name: &str, value: Value) -> Result<AnswerUpdate, EngineError> {
        let field = self
            .form
            .field(name)
            .ok_or_else(|| EngineError::UnknownField(name.to_string()))?;

        let eligible = field
            .kind
            .is_select()
            .then(|| resolve_options(field, self.form, &self.answers, self.config));
        if let Some(error) = validate_value(field, &value, &self.answers, eligible.as_deref()) {
            self.rejected.insert(name.to_string(), error.message.clone());
            return Ok(AnswerUpdate {
                outcome: AnswerOutcome::Rejected { error },
                evaluation: self.evaluate(),
            });
        }

        self.rejected.remove(name);
        if is_present(&value) {
            self.answers.insert(name, value);
        } else {
            self.answers.remove(name);
        }

        let cleared =
            clear_dependents(self.form, &mut self.answers, name, self.config.reset_policy);
        for dependent in &cleared {
            self.rejected.remove(dependent);
        }

        Ok(AnswerUpdate {
            outcome: AnswerOutcome::Accepted { cleared },
            evaluation: self.evaluate(),
        })
    }

    /// Current evaluation, including the messages of rejected proposals.
    pub fn evaluate(&self) -> Evaluation {
        let mut evaluation = evaluate(self.form, &self.answers, self.config);
        for (name, message) in &self.rejected {
            if evaluation.is_visible(name) {
                evaluation.errors_by_field.insert(name.clone(), message.clone());
            }
        }
        evaluation
    }

    /// First visible field without an answer, in form order.
    pub fn next_unanswered(&self) -> Option<&'f str> {
        visible_fields(self.form, &self.answers)
            .into_iter()
            .find(|field| self.answers.present(&field.name).is_none())
            .map(|field| field.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile_value;
    use serde_json::json;

    fn form() -> CompiledForm {
        compile_value(&json!({
            "properties": {
                "phone": { "type": "string", "x-constraint": "regex(., '^[0-9]{10}$')" },
                "a": { "type": "string" },
                "b": { "type": "string", "x-depends-on": "a", "x-depends-value": "first" },
                "count": { "type": "integer", "default": 1 }
            }
        }))
    }

    #[test]
    fn rejected_value_keeps_previous_answer() {
        let form = form();
        let config = EngineConfig::default();
        let mut session = FormSession::new(&form, &config);
        let update = session.set_answer("phone", json!("0991234567")).expect("known");
        assert!(update.outcome.is_accepted());

        let update = session.set_answer("phone", json!("12345")).expect("known");
        assert!(!update.outcome.is_accepted());
        assert_eq!(session.answers().get("phone"), Some(&json!("0991234567")));
        assert_eq!(
            update.evaluation.errors_by_field.get("phone").map(String::as_str),
            Some("value does not match pattern ^[0-9]{10}$")
        );

        session.set_answer("phone", json!("0811111111")).expect("known");
        assert!(session.evaluate().errors_by_field.is_empty());
    }

    #[test]
    fn padded_value_is_checked_as_entered() {
        let form = form();
        let config = EngineConfig::default();
        let mut session = FormSession::new(&form, &config);
        let update = session.set_answer("phone", json!(" 0991234567 ")).expect("known");
        assert!(!update.outcome.is_accepted());
        assert!(!session.answers().contains("phone"));
    }

    #[test]
    fn dependents_are_cleared_even_when_still_visible() {
        let form = form();
        let config = EngineConfig::default();
        let mut session = FormSession::new(&form, &config);
        session.set_answer("a", json!("first")).expect("known");
        session.set_answer("b", json!("kept?")).expect("known");
        let update = session.set_answer("a", json!("first")).expect("known");
        assert_eq!(update.outcome, AnswerOutcome::Accepted { cleared: vec!["b".into()] });
        assert!(!session.answers().contains("b"));
        assert!(update.evaluation.is_visible("b"));
    }

    #[test]
    fn defaults_seed_new_sessions() {
        let form = form();
        let config = EngineConfig::default();
        let session = FormSession::new(&form, &config);
        assert_eq!(session.answers().get("count"), Some(&json!(1)));
        assert_eq!(session.next_unanswered(), Some("phone"));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let form = form();
        let config = EngineConfig::default();
        let mut session = FormSession::new(&form, &config);
        assert!(matches!(
            session.set_answer("ghost", json!("x")),
            Err(EngineError::UnknownField(name)) if name == "ghost"
        ));
    }

    #[test]
    fn empty_value_clears_answer() {
        let form = form();
        let config = EngineConfig::default();
        let mut session = FormSession::new(&form, &config);
        session.set_answer("a", json!("x")).expect("known");
        session.set_answer("a", json!("")).expect("known");
        assert!(!session.answers().contains("a"));
    }
}
