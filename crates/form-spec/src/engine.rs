use std::collections::BTreeMap;

use serde_json::Value;

use crate::answers::{AnswerSet, ValidationError, ValidationResult};
use crate::compile::{compile, compile_value};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::expr::lint_form;
use crate::options::{resolve_all_options, resolve_options};
use crate::session::{Evaluation, FormSession, evaluate};
use crate::spec::field::{ChoiceOption, FieldDefinition};
use crate::spec::form::{CompiledForm, Diagnostic};
use crate::spec::schema::SchemaDocument;
use crate::validate::{validate, validate_value};
use crate::visibility::{VisibilityMap, resolve_visibility, visible_fields};

/// A compiled form bundled with its configuration.
///
/// This is the single entry point every consuming surface goes through.
#[derive(Debug, Clone, Default)]
pub struct FormEngine {
    form: CompiledForm,
    config: EngineConfig,
}

impl FormEngine {
    pub fn compile(document: &SchemaDocument, config: EngineConfig) -> Self {
        Self {
            form: compile(document),
            config,
        }
    }

    pub fn from_value(schema: &Value, config: EngineConfig) -> Self {
        Self {
            form: compile_value(schema),
            config,
        }
    }

    /// Parses a schema document from JSON text.
    ///
    /// Only invalid JSON is an error; structural problems inside the document
    /// become diagnostics.
    pub fn from_json(schema_json: &str, config: EngineConfig) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(schema_json).map_err(EngineError::SchemaJson)?;
        Ok(Self::from_value(&value, config))
    }

    pub fn form(&self) -> &CompiledForm {
        &self.form
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluate_visibility(&self, answers: &AnswerSet) -> VisibilityMap {
        resolve_visibility(&self.form, answers)
    }

    pub fn visible_fields(&self, answers: &AnswerSet) -> Vec<&FieldDefinition> {
        visible_fields(&self.form, answers)
    }

    /// Eligible options of one field; unknown names yield `None`.
    pub fn resolve_options(&self, name: &str, answers: &AnswerSet) -> Option<Vec<ChoiceOption>> {
        let field = self.form.field(name)?;
        Some(resolve_options(field, &self.form, answers, &self.config))
    }

    pub fn resolve_all_options(&self, answers: &AnswerSet) -> BTreeMap<String, Vec<ChoiceOption>> {
        resolve_all_options(&self.form, answers, &self.config)
    }

    pub fn validate(&self, answers: &AnswerSet) -> ValidationResult {
        validate(&self.form, answers, &self.config)
    }

    /// Checks a proposed answer without storing it.
    pub fn validate_answer(
        &self,
        name: &str,
        value: &Value,
        answers: &AnswerSet,
    ) -> Result<Option<ValidationError>, EngineError> {
        let field = self
            .form
            .field(name)
            .ok_or_else(|| EngineError::UnknownField(name.to_string()))?;
        let eligible = field
            .kind
            .is_select()
            .then(|| resolve_options(field, &self.form, answers, &self.config));
        Ok(validate_value(field, value, answers, eligible.as_deref()))
    }

    pub fn evaluate(&self, answers: &AnswerSet) -> Evaluation {
        evaluate(&self.form, answers, &self.config)
    }

    /// Writes the compiled form back as a schema document.
    pub fn decompile(&self) -> SchemaDocument {
        self.form.to_document()
    }

    pub fn session(&self) -> FormSession<'_> {
        FormSession::new(&self.form, &self.config)
    }

    pub fn session_with(&self, answers: AnswerSet) -> FormSession<'_> {
        FormSession::with_answers(&self.form, &self.config, answers)
    }

    /// Compilation diagnostics followed by expression lint findings.
    pub fn lint(&self) -> Vec<Diagnostic> {
        let mut diagnostics = self.form.diagnostics.clone();
        diagnostics.extend(lint_form(&self.form));
        diagnostics
    }
}
