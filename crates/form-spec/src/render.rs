use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::answers::AnswerSet;
use crate::session::Evaluation;
use crate::spec::field::{ChoiceOption, FieldType};
use crate::spec::form::CompiledForm;

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    /// A visible required field is unanswered or a stored answer is invalid.
    NeedInput,
    /// Every visible required field holds a valid answer.
    Complete,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
        }
    }
}

/// Progress counters exposed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// Describes a single visible field for render outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderField {
    pub name: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Value>,
    /// Eligible options only; `None` for non-select fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ChoiceOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Visible fields sharing a group; `name` is `None` for ungrouped fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderGroup {
    pub name: Option<String>,
    pub fields: Vec<RenderField>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPayload {
    pub title: Option<String>,
    pub status: RenderStatus,
    pub next_field: Option<String>,
    pub progress: RenderProgress,
    pub groups: Vec<RenderGroup>,
}

/// Build the renderer payload from a compiled form, its answers and their evaluation.
pub fn build_render_payload(
    form: &CompiledForm,
    answers: &AnswerSet,
    evaluation: &Evaluation,
) -> RenderPayload {
    let mut groups: Vec<RenderGroup> = Vec::new();
    let mut answered = 0;
    let mut total = 0;
    let mut next_field = None;
    let mut complete = evaluation.errors_by_field.is_empty();

    for field in form.fields.iter().filter(|field| evaluation.is_visible(&field.name)) {
        total += 1;
        let current_value = answers.present(&field.name).cloned();
        if current_value.is_some() {
            answered += 1;
        } else {
            if next_field.is_none() {
                next_field = Some(field.name.clone());
            }
            if field.required {
                complete = false;
            }
        }

        let rendered = RenderField {
            name: field.name.clone(),
            label: field.label.clone(),
            hint: field.hint.clone(),
            kind: field.kind,
            required: field.required,
            appearance: field.appearance.clone(),
            current_value,
            options: evaluation.options_by_field.get(&field.name).cloned(),
            error: evaluation.errors_by_field.get(&field.name).cloned(),
        };

        match groups.iter_mut().find(|group| group.name == field.group) {
            Some(group) => group.fields.push(rendered),
            None => groups.push(RenderGroup {
                name: field.group.clone(),
                fields: vec![rendered],
            }),
        }
    }

    let status = if complete {
        RenderStatus::Complete
    } else {
        RenderStatus::NeedInput
    };

    RenderPayload {
        title: form.title.clone(),
        status,
        next_field,
        progress: RenderProgress { answered, total },
        groups,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let groups = payload
        .groups
        .iter()
        .map(|group| {
            let fields = group
                .fields
                .iter()
                .map(|field| {
                    let mut map = Map::new();
                    map.insert("name".into(), Value::String(field.name.clone()));
                    map.insert("label".into(), Value::String(field.label.clone()));
                    map.insert("type".into(), Value::String(field.kind.as_str().to_string()));
                    map.insert("required".into(), Value::Bool(field.required));
                    if let Some(hint) = &field.hint {
                        map.insert("hint".into(), Value::String(hint.clone()));
                    }
                    if let Some(appearance) = &field.appearance {
                        map.insert("appearance".into(), Value::String(appearance.clone()));
                    }
                    if let Some(current_value) = &field.current_value {
                        map.insert("current_value".into(), current_value.clone());
                    }
                    if let Some(options) = &field.options {
                        map.insert(
                            "options".into(),
                            Value::Array(
                                options
                                    .iter()
                                    .map(|option| {
                                        json!({ "label": option.label, "value": option.value })
                                    })
                                    .collect(),
                            ),
                        );
                    }
                    if let Some(error) = &field.error {
                        map.insert("error".into(), Value::String(error.clone()));
                    }
                    Value::Object(map)
                })
                .collect::<Vec<_>>();
            json!({ "name": group.name, "fields": fields })
        })
        .collect::<Vec<_>>();

    json!({
        "title": payload.title,
        "status": payload.status.as_str(),
        "next_field": payload.next_field,
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
        },
        "groups": groups,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    if let Some(title) = &payload.title {
        lines.push(format!("Form: {}", title));
    }
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status.as_str(),
        payload.progress.answered,
        payload.progress.total
    ));
    match &payload.next_field {
        Some(next) => lines.push(format!("Next field: {}", next)),
        None => lines.push("All visible fields are answered.".to_string()),
    }

    for group in &payload.groups {
        if let Some(name) = &group.name {
            lines.push(format!("[{}]", name));
        }
        for field in &group.fields {
            let mut entry = format!(" - {} ({})", field.name, field.label);
            if field.required {
                entry.push_str(" [required]");
            }
            if let Some(current_value) = &field.current_value {
                entry.push_str(&format!(" = {}", value_to_display(current_value)));
            }
            if let Some(error) = &field.error {
                entry.push_str(&format!(" ! {}", error));
            }
            lines.push(entry);
            if let Some(options) = &field.options
                && field.current_value.is_none()
            {
                let values: Vec<&str> =
                    options.iter().map(|option| option.value.as_str()).collect();
                lines.push(format!("     options: {}", values.join(", ")));
            }
        }
    }

    lines.join("\n")
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => num.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_display)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
