use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::{CompareOp, Expr, FieldRef, Literal, parse};
use crate::answers::{AnswerSet, answer_texts, as_number, entered_text, is_present, scalar_text};
use crate::spec::field::FieldDefinition;

/// What an expression can see while it is evaluated.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    answers: &'a AnswerSet,
    current_field: Option<&'a str>,
    current: Option<&'a Value>,
}

impl<'a> EvalContext<'a> {
    /// Context for `relevant` expressions: `.` resolves to nothing.
    pub fn relevance(answers: &'a AnswerSet) -> Self {
        Self {
            answers,
            current_field: None,
            current: None,
        }
    }

    /// Context for a constraint on `field`: `.` and `${field}` resolve to `value`.
    pub fn constraint(answers: &'a AnswerSet, field: &'a str, value: &'a Value) -> Self {
        Self {
            answers,
            current_field: Some(field),
            current: Some(value),
        }
    }

    /// Unknown fields resolve to `None`.
    fn resolve(&self, field: &FieldRef) -> Option<&'a Value> {
        match field {
            FieldRef::Current => self.current,
            FieldRef::Named(name) if Some(name.as_str()) == self.current_field => self.current,
            FieldRef::Named(name) => self.answers.get(name),
        }
    }
}

impl Expr {
    /// Evaluates to a boolean; [`Expr::Unknown`] is `true`.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Expr::Not(inner) => !inner.evaluate(ctx),
            Expr::Selected { field, value } => ctx
                .resolve(field)
                .map(|answer| answer_texts(answer).iter().any(|text| text == value))
                .unwrap_or(false),
            Expr::CountSelected { field, op, count } => {
                let cardinality = ctx.resolve(field).map(cardinality).unwrap_or(0);
                op.holds(cardinality.cmp(count))
            }
            Expr::Compare { field, op, literal } => compare(ctx.resolve(field), *op, literal),
            Expr::Presence { field, present } => {
                ctx.resolve(field).is_some_and(is_present) == *present
            }
            Expr::Field(field) => ctx.resolve(field).is_some_and(is_present),
            Expr::Regex { pattern } => {
                let Some(text) = ctx.current.and_then(entered_text) else {
                    return true;
                };
                match Regex::new(pattern) {
                    Ok(regex) => regex.is_match(&text),
                    Err(err) => {
                        warn!(%pattern, %err, "invalid constraint pattern; constraint skipped");
                        true
                    }
                }
            }
            Expr::StringLength { op, length } => {
                let Some(text) = ctx.current.and_then(entered_text) else {
                    return true;
                };
                op.holds(text.chars().count().cmp(length))
            }
            Expr::Unknown { .. } => true,
        }
    }
}

/// Array length, `1` for a non-empty scalar, `0` otherwise.
fn cardinality(value: &Value) -> i64 {
    match value {
        Value::Array(items) => items.len() as i64,
        other if is_present(other) => 1,
        _ => 0,
    }
}

fn compare(answer: Option<&Value>, op: CompareOp, literal: &Literal) -> bool {
    // Missing or unreadable operands compare like NaN: only `!=` holds.
    let unordered = op == CompareOp::Ne;
    let Some(answer) = answer.filter(|value| !value.is_null()) else {
        return unordered;
    };
    match literal {
        Literal::Number(expected) => as_number(answer)
            .and_then(|actual| actual.partial_cmp(expected))
            .map(|ordering| op.holds(ordering))
            .unwrap_or(unordered),
        Literal::Text(expected) => {
            if let Value::Array(_) = answer {
                let contained = answer_texts(answer).iter().any(|text| text == expected);
                return match op {
                    CompareOp::Eq => contained,
                    CompareOp::Ne => !contained,
                    _ => false,
                };
            }
            let Some(actual) = scalar_text(answer) else {
                return unordered;
            };
            if matches!(op, CompareOp::Eq | CompareOp::Ne) {
                return op.holds(actual.as_str().cmp(expected.as_str()));
            }
            let ordering = match (actual.parse::<f64>(), expected.trim().parse::<f64>()) {
                (Ok(left), Ok(right)) => left.partial_cmp(&right),
                _ => Some(actual.as_str().cmp(expected.as_str())),
            };
            ordering.map(|ordering| op.holds(ordering)).unwrap_or(false)
        }
    }
}

/// Evaluates a `relevant` expression. Unparseable input is visible.
pub fn evaluate_relevance(expression: &str, answers: &AnswerSet) -> bool {
    parse(expression).evaluate(&EvalContext::relevance(answers))
}

/// Checks `value` against the field's `constraint`.
///
/// Returns the violation message, or `None` when the value passes, the value
/// is empty, or the constraint cannot be parsed.
pub fn evaluate_constraint(
    field: &FieldDefinition,
    value: &Value,
    answers: &AnswerSet,
) -> Option<String> {
    let source = field.constraint_expr()?;
    if !is_present(value) {
        return None;
    }
    let expr = parse(source);
    if let Expr::Unknown { reason, .. } = &expr {
        debug!(field = %field.name, %reason, "constraint ignored");
        return None;
    }
    if expr.evaluate(&EvalContext::constraint(answers, &field.name, value)) {
        return None;
    }
    let message = field
        .constraint_message
        .as_deref()
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(String::from)
        .unwrap_or_else(|| default_message(&expr, source));
    Some(message)
}

fn default_message(expr: &Expr, source: &str) -> String {
    match expr {
        Expr::Regex { pattern } => format!("value does not match pattern {}", pattern),
        Expr::StringLength { op, length } => format!("length must be {} {}", op.symbol(), length),
        _ => format!("value violates constraint {}", source),
    }
}
