//! JSON-string surface over the form engine.
//!
//! The authoring preview, the authenticated preview and the public submission
//! endpoint all call these functions, so every context compiles, evaluates and
//! validates through the same code. The [`Surface`] argument only selects
//! which extra outputs are attached.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use form_spec::{
    AnswerOutcome, AnswerSet, EngineConfig, EngineError, FormEngine, RenderPayload,
    build_render_payload, render_json_ui as form_render_json_ui,
    render_text as form_render_text,
};

const DEFAULT_SCHEMA: &str = include_str!("../../form-spec/tests/fixtures/household_visit.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse value: {0}")]
    ValueParse(#[source] serde_json::Error),
    #[error("failed to parse answers: {0}")]
    AnswersParse(#[source] serde_json::Error),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Presentation context calling the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Form designer preview; responses carry lint diagnostics.
    #[default]
    AuthoringPreview,
    /// Logged-in preview of a published form.
    AuthenticatedPreview,
    /// Anonymous submission; `submit_all` rejects missing required answers.
    PublicSubmission,
}

impl Surface {
    fn attaches_diagnostics(&self) -> bool {
        matches!(self, Surface::AuthoringPreview)
    }

    fn enforces_required(&self) -> bool {
        matches!(self, Surface::PublicSubmission)
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    schema_json: Option<String>,
    #[serde(default)]
    engine: EngineConfig,
}

fn load_engine(config_json: &str) -> Result<FormEngine, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let schema_json = config.schema_json.as_deref().unwrap_or(DEFAULT_SCHEMA);
    Ok(FormEngine::from_json(schema_json, config.engine)?)
}

/// Blank input is an empty answer set; anything else must be valid JSON.
fn parse_answers(answers_json: &str) -> Result<AnswerSet, ComponentError> {
    if answers_json.trim().is_empty() {
        return Ok(AnswerSet::new());
    }
    let value: Value = serde_json::from_str(answers_json).map_err(ComponentError::AnswersParse)?;
    Ok(AnswerSet::from_value(&value))
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

/// Compiled field list, group order and compile diagnostics.
pub fn describe(config_json: &str) -> String {
    respond(load_engine(config_json).and_then(|engine| to_json(engine.form())))
}

/// Schema document rebuilt from the compiled form.
pub fn decompile(config_json: &str) -> String {
    respond(load_engine(config_json).and_then(|engine| to_json(&engine.decompile())))
}

pub fn lint(config_json: &str) -> String {
    respond(load_engine(config_json).and_then(|engine| {
        let diagnostics = to_json(&engine.lint())?;
        Ok(json!({ "diagnostics": diagnostics }))
    }))
}

/// Visible fields, eligible options and errors for the given answers.
pub fn evaluate(config_json: &str, answers_json: &str) -> String {
    respond(load_engine(config_json).and_then(|engine| {
        let answers = parse_answers(answers_json)?;
        to_json(&engine.evaluate(&answers))
    }))
}

fn render_payload(engine: &FormEngine, answers: &AnswerSet) -> RenderPayload {
    build_render_payload(engine.form(), answers, &engine.evaluate(answers))
}

pub fn render_text(config_json: &str, answers_json: &str) -> String {
    respond_string(load_engine(config_json).and_then(|engine| {
        let answers = parse_answers(answers_json)?;
        Ok(form_render_text(&render_payload(&engine, &answers)))
    }))
}

pub fn render_json_ui(surface: Surface, config_json: &str, answers_json: &str) -> String {
    respond(load_engine(config_json).and_then(|engine| {
        let answers = parse_answers(answers_json)?;
        let mut ui = form_render_json_ui(&render_payload(&engine, &answers));
        if surface.attaches_diagnostics() {
            ui["diagnostics"] = to_json(&engine.lint())?;
        }
        Ok(ui)
    }))
}

fn progress_value(payload: &RenderPayload) -> Value {
    json!({
        "answered": payload.progress.answered,
        "total": payload.progress.total,
    })
}

/// Applies one answer change through the engine's set-answer sequence.
pub fn submit_patch(
    surface: Surface,
    config_json: &str,
    answers_json: &str,
    field: &str,
    value_json: &str,
) -> String {
    respond(load_engine(config_json).and_then(|engine| {
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::ValueParse)?;
        let mut session = engine.session_with(parse_answers(answers_json)?);
        let update = session.set_answer(field, value)?;
        let payload = build_render_payload(engine.form(), session.answers(), &update.evaluation);

        let status = match &update.outcome {
            AnswerOutcome::Accepted { .. } => payload.status.as_str(),
            AnswerOutcome::Rejected { .. } => "error",
        };
        let mut response = json!({
            "status": status,
            "next_field": payload.next_field,
            "progress": progress_value(&payload),
            "answers": session.answers().to_value(),
            "outcome": to_json(&update.outcome)?,
            "evaluation": to_json(&update.evaluation)?,
        });
        if surface.attaches_diagnostics() {
            response["diagnostics"] = to_json(&engine.lint())?;
        }
        Ok(response)
    }))
}

/// Validates a whole submission.
///
/// Only [`Surface::PublicSubmission`] treats missing required answers as
/// failure; previews report them without failing.
pub fn submit_all(surface: Surface, config_json: &str, answers_json: &str) -> String {
    respond(load_engine(config_json).and_then(|engine| {
        let answers = parse_answers(answers_json)?;
        let mut validation = engine.validate(&answers);
        if !surface.enforces_required() {
            validation.valid = validation.errors.is_empty() && validation.unknown_fields.is_empty();
        }
        let payload = render_payload(&engine, &answers);
        debug!(?surface, valid = validation.valid, "submission validated");

        let status = if validation.valid {
            payload.status.as_str()
        } else {
            "error"
        };
        Ok(json!({
            "status": status,
            "next_field": payload.next_field,
            "progress": progress_value(&payload),
            "answers": answers.to_value(),
            "validation": to_json(&validation)?,
        }))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(response: &str) -> Value {
        serde_json::from_str(response).expect("json")
    }

    #[test]
    fn describe_returns_compiled_form() {
        let form = parsed(&describe(""));
        assert_eq!(form["title"], "Household visit");
        assert_eq!(form["fields"][0]["name"], "province");
        assert_eq!(form["group_order"], json!(["Location", "Household", "Visit"]));
    }

    #[test]
    fn decompile_round_trips_through_config() {
        let document = decompile("");
        let config = json!({ "schema_json": document });
        let again = parsed(&decompile(&config.to_string()));
        assert_eq!(parsed(&document), again);
    }

    #[test]
    fn invalid_schema_json_is_reported() {
        let config = json!({ "schema_json": "{ not json" });
        let response = parsed(&describe(&config.to_string()));
        assert!(
            response["error"]
                .as_str()
                .is_some_and(|error| error.contains("schema"))
        );
    }

    #[test]
    fn evaluate_filters_options() {
        let response = parsed(&evaluate("", r#"{"province":"kwilu"}"#));
        let zones: Vec<_> = response["options_by_field"]["zone"]
            .as_array()
            .expect("zone options")
            .iter()
            .map(|option| option["value"].clone())
            .collect();
        assert_eq!(zones, [json!("kikwit"), json!("unlisted")]);
    }

    #[test]
    fn render_text_outputs_summary() {
        let output = render_text("", "{}");
        assert!(output.contains("Form: Household visit"));
        assert!(output.contains("[Household]"));
    }

    #[test]
    fn authoring_preview_attaches_diagnostics() {
        let schema = json!({
            "properties": { "a": { "type": "string", "x-relevant": "frobnicate(x)" } }
        });
        let config = json!({ "schema_json": schema.to_string() });
        let authoring = parsed(&render_json_ui(
            Surface::AuthoringPreview,
            &config.to_string(),
            "{}",
        ));
        assert_eq!(authoring["diagnostics"][0]["field"], "a");
        let public = parsed(&render_json_ui(
            Surface::PublicSubmission,
            &config.to_string(),
            "{}",
        ));
        assert!(public.get("diagnostics").is_none());
        assert_eq!(public["groups"][0]["fields"][0]["name"], "a");
    }

    #[test]
    fn submit_patch_clears_dependents() {
        let answers = json!({ "members": 3, "children_under_five": 2 });
        let response = parsed(&submit_patch(
            Surface::AuthenticatedPreview,
            "",
            &answers.to_string(),
            "members",
            "1",
        ));
        assert_eq!(response["outcome"]["status"], "accepted");
        assert_eq!(response["outcome"]["cleared"], json!(["children_under_five"]));
        assert!(response["answers"].get("children_under_five").is_none());
    }

    #[test]
    fn submit_patch_rejects_constraint_violation() {
        let answers = json!({ "phone": "0991234567" });
        let response = parsed(&submit_patch(
            Surface::PublicSubmission,
            "",
            &answers.to_string(),
            "phone",
            r#""12345""#,
        ));
        assert_eq!(response["status"], "error");
        assert_eq!(response["outcome"]["error"]["code"], "constraint");
        assert_eq!(response["answers"]["phone"], "0991234567");
    }

    #[test]
    fn malformed_answers_are_reported_not_dropped() {
        let answers = r#"{"province":"kinshasa","head_name":"Ada",}"#;
        let patch = parsed(&submit_patch(Surface::PublicSubmission, "", answers, "members", "2"));
        assert!(
            patch["error"]
                .as_str()
                .is_some_and(|error| error.starts_with("failed to parse answers"))
        );
        assert!(patch.get("answers").is_none());

        let all = parsed(&submit_all(Surface::PublicSubmission, "", answers));
        assert!(all["error"].is_string());
        assert!(all.get("validation").is_none());
    }

    #[test]
    fn blank_answers_mean_nothing_answered() {
        let response = parsed(&submit_all(Surface::AuthenticatedPreview, "", "  "));
        assert_eq!(response["status"], "need_input");
    }

    #[test]
    fn submit_patch_unknown_field_is_an_error() {
        let response = parsed(&submit_patch(Surface::PublicSubmission, "", "{}", "ghost", "1"));
        assert_eq!(response["error"], "unknown field 'ghost'");
    }

    #[test]
    fn only_public_submission_requires_fields() {
        let answers = json!({ "province": "kinshasa" }).to_string();
        let preview = parsed(&submit_all(Surface::AuthenticatedPreview, "", &answers));
        assert_eq!(preview["status"], "need_input");
        assert_eq!(
            preview["validation"]["missing_required"],
            json!(["zone", "head_name", "members"])
        );
        let public = parsed(&submit_all(Surface::PublicSubmission, "", &answers));
        assert_eq!(public["status"], "error");
        assert_eq!(public["validation"]["valid"], false);
    }

    #[test]
    fn submit_all_completes_with_valid_answers() {
        let answers = json!({
            "province": "kinshasa",
            "zone": "gombe",
            "head_name": "Mbuyi Kalala",
            "members": 1
        });
        let response = parsed(&submit_all(
            Surface::PublicSubmission,
            "",
            &answers.to_string(),
        ));
        assert_eq!(response["status"], "complete");
        assert_eq!(response["validation"]["valid"], true);
    }
}
