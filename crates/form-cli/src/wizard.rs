use std::fmt::Write;

use form_spec::{AnswerSet, FieldType, RenderField, RenderPayload, RenderProgress, RenderStatus};
use serde_json::{Number, Value, json};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: status, visible fields, error details.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and state while a form is being filled.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, payload: &RenderPayload) {
        if self.header_printed {
            return;
        }
        println!(
            "Form: {}",
            payload.title.as_deref().unwrap_or("(untitled form)")
        );
        self.header_printed = true;
    }

    pub fn show_status(&self, payload: &RenderPayload) {
        if self.verbosity.is_verbose() {
            println!(
                "Status: {} ({}/{})",
                payload.status.as_str(),
                payload.progress.answered,
                payload.progress.total
            );
            println!("Visible fields:");
            for field in payload.groups.iter().flat_map(|group| group.fields.iter()) {
                let mut entry = format!(" - {} ({})", field.name, field.label);
                if field.required {
                    entry.push_str(" [required]");
                }
                println!("{}", entry);
            }
        } else if payload.status == RenderStatus::NeedInput && payload.progress.total == 0 {
            println!("No visible fields are available; check the relevance expressions.");
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.label)
        } else {
            format!("{} {}", prompt.index, prompt.label)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.type_hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if let Some(hint) = &prompt.hint {
            println!("{}", hint);
        }
        if self.verbosity.is_verbose() && !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_rejection(&self, message: &str) {
        eprintln!("Answer rejected: {}", message);
    }

    pub fn show_cleared(&self, cleared: &[String]) {
        if !cleared.is_empty() {
            println!("Cleared dependent answers: {}", cleared.join(", "));
        }
    }

    pub fn show_completion(&self, answer_set: &AnswerSet) {
        println!("Done ✅");
        match answer_set.to_cbor() {
            Ok(bytes) => {
                println!("Answers (CBOR hex): {}", encode_hex(&bytes));
            }
            Err(err) => {
                eprintln!("Failed to serialize answers to CBOR: {}", err);
            }
        }
        if self.show_answers_json {
            match answer_set.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => {
                    eprintln!("Failed to serialize answers to JSON: {}", err);
                }
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub label: String,
    pub hint: Option<String>,
    pub required: bool,
    pub type_hint: Option<String>,
    pub choices: Vec<String>,
}

impl PromptContext {
    pub fn new(field: &RenderField, progress: &RenderProgress) -> Self {
        let choices: Vec<String> = field
            .options
            .as_ref()
            .map(|options| options.iter().map(|option| option.value.clone()).collect())
            .unwrap_or_default();
        Self {
            index: (progress.answered + 1).max(1),
            total: progress.total,
            label: field.label.clone(),
            hint: field.hint.clone(),
            required: field.required,
            type_hint: type_hint(field.kind, &choices),
            choices,
        }
    }
}

fn type_hint(kind: FieldType, choices: &[String]) -> Option<String> {
    match kind {
        FieldType::Acknowledge => Some("(yes/no)".to_string()),
        FieldType::Integer => Some("(integer)".to_string()),
        FieldType::Decimal => Some("(number)".to_string()),
        FieldType::Date => Some("(YYYY-MM-DD)".to_string()),
        FieldType::Geopoint => Some("(latitude,longitude)".to_string()),
        FieldType::SelectOne if !choices.is_empty() => Some(format!("({})", choices.join("/"))),
        FieldType::SelectMultiple if !choices.is_empty() => {
            Some(format!("(one or more of {})", choices.join("/")))
        }
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Converts typed input into the JSON value stored for `field`.
///
/// Empty input on an optional field yields `Value::Null`.
pub fn parse_answer(field: &RenderField, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if field.required {
            return Err(AnswerParseError::new("This field requires an answer.", None));
        }
        return Ok(Value::Null);
    }

    match field.kind {
        FieldType::Acknowledge => parse_acknowledge(raw),
        FieldType::Integer => parse_integer(raw),
        FieldType::Decimal => parse_number(raw),
        FieldType::SelectOne => parse_choice(field, raw).map(Value::String),
        FieldType::SelectMultiple => raw
            .split([',', ' '])
            .filter(|part| !part.trim().is_empty())
            .map(|part| parse_choice(field, part.trim()).map(Value::String))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        FieldType::Geopoint => parse_geopoint(raw),
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn parse_acknowledge(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "ok" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_integer(raw: &str) -> Result<Value, AnswerParseError> {
    raw.parse::<i64>()
        .map(Number::from)
        .map(Value::Number)
        .map_err(|_| {
            AnswerParseError::new(
                "Please enter a whole number.",
                Some("expected integer".to_string()),
            )
        })
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    raw.parse::<f64>()
        .map_err(|_| {
            AnswerParseError::new(
                "Please enter a number.",
                Some("expected number".to_string()),
            )
        })
        .and_then(|value| {
            Number::from_f64(value).map(Value::Number).ok_or_else(|| {
                AnswerParseError::new(
                    "Please enter a finite number.",
                    Some("number must be finite".to_string()),
                )
            })
        })
}

/// Matches an option by value, label, or 1-based position.
fn parse_choice(field: &RenderField, raw: &str) -> Result<String, AnswerParseError> {
    let options = field.options.as_deref().unwrap_or_default();
    let by_text = options.iter().find(|option| {
        option.value.eq_ignore_ascii_case(raw) || option.label.eq_ignore_ascii_case(raw)
    });
    let by_index = raw
        .parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| options.get(index));

    by_text
        .or(by_index)
        .map(|option| option.value.clone())
        .ok_or_else(|| {
            let allowed: Vec<&str> = options.iter().map(|option| option.value.as_str()).collect();
            AnswerParseError::new(
                format!("Choose one of: {}.", allowed.join(", ")),
                Some(format!("allowed values: {}", allowed.join(", "))),
            )
        })
}

fn parse_geopoint(raw: &str) -> Result<Value, AnswerParseError> {
    let invalid = || {
        AnswerParseError::new(
            "Please enter coordinates as latitude,longitude.",
            Some("expected two numbers separated by a comma".to_string()),
        )
    };
    let (latitude, longitude) = raw.split_once(',').ok_or_else(invalid)?;
    let latitude = latitude.trim().parse::<f64>().map_err(|_| invalid())?;
    let longitude = longitude.trim().parse::<f64>().map_err(|_| invalid())?;
    Ok(json!({ "latitude": latitude, "longitude": longitude }))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut encoded, "{:02x}", byte);
    }
    encoded
}
