use tracing::debug;

use super::{CompareOp, Expr, FieldRef, Literal};
use crate::error::ExprError;

const COUNT_OPERATORS: [CompareOp; 5] = [
    CompareOp::Ge,
    CompareOp::Le,
    CompareOp::Gt,
    CompareOp::Lt,
    CompareOp::Eq,
];

const LENGTH_OPERATORS: [CompareOp; 3] = [CompareOp::Ge, CompareOp::Le, CompareOp::Eq];

/// Parses an expression. Never fails: unrecognised input becomes [`Expr::Unknown`].
pub fn parse(source: &str) -> Expr {
    let text = source.trim();
    match parse_expr(text) {
        Ok(expr) => expr,
        Err(reason) => {
            debug!(expression = %text, %reason, "expression falls open");
            Expr::Unknown {
                source: text.to_string(),
                reason,
            }
        }
    }
}

/// Tries each production in a fixed order; the first one that claims the input decides it.
fn parse_expr(text: &str) -> Result<Expr, ExprError> {
    if text.is_empty() {
        return Err(ExprError::Empty);
    }
    if let Some(inner) = call_body(text, "not")? {
        return Ok(Expr::Not(Box::new(parse(inner))));
    }
    if let Some(inner) = call_body(text, "selected")? {
        return parse_selected(inner);
    }
    if let Some((inner, rest)) = call_prefix(text, "count-selected")? {
        let field = parse_field_ref(inner.trim())?;
        let (op, operand) = split_leading_operator(rest, &COUNT_OPERATORS, "count-selected")?;
        let count = operand
            .parse::<i64>()
            .map_err(|_| ExprError::InvalidCount(operand.to_string()))?;
        return Ok(Expr::CountSelected { field, op, count });
    }
    if let Some(inner) = call_body(text, "regex")? {
        return parse_regex(inner);
    }
    if let Some((inner, rest)) = call_prefix(text, "string-length")? {
        parse_field_ref(inner.trim())?;
        let (op, operand) = split_leading_operator(rest, &LENGTH_OPERATORS, "string-length")?;
        let length = operand
            .parse::<usize>()
            .map_err(|_| ExprError::InvalidCount(operand.to_string()))?;
        return Ok(Expr::StringLength { op, length });
    }
    for op in CompareOp::PRECEDENCE {
        if let Some(position) = text.find(op.symbol()) {
            let left = text[..position].trim();
            let right = text[position + op.symbol().len()..].trim();
            return parse_comparison(left, op, right);
        }
    }
    parse_field_ref(text)
        .map(Expr::Field)
        .map_err(|_| ExprError::Unrecognized)
}

fn parse_selected(inner: &str) -> Result<Expr, ExprError> {
    let args = split_arguments(inner);
    let [field, value] = args.as_slice() else {
        return Err(ExprError::ArgumentCount {
            function: "selected",
            expected: 2,
        });
    };
    let field = parse_field_ref(field)?;
    let value = parse_literal(value)?.as_text();
    Ok(Expr::Selected { field, value })
}

fn parse_regex(inner: &str) -> Result<Expr, ExprError> {
    let args = split_arguments(inner);
    let [field, pattern] = args.as_slice() else {
        return Err(ExprError::ArgumentCount {
            function: "regex",
            expected: 2,
        });
    };
    parse_field_ref(field)?;
    match parse_literal(pattern)? {
        Literal::Text(pattern) => Ok(Expr::Regex { pattern }),
        Literal::Number(_) => Err(ExprError::InvalidLiteral(pattern.to_string())),
    }
}

fn parse_comparison(left: &str, op: CompareOp, right: &str) -> Result<Expr, ExprError> {
    let field = parse_field_ref(left)?;
    let literal = parse_literal(right)?;
    match (&literal, op) {
        (Literal::Text(text), CompareOp::Eq | CompareOp::Ne) if text.is_empty() => {
            Ok(Expr::Presence {
                field,
                present: op == CompareOp::Ne,
            })
        }
        _ => Ok(Expr::Compare { field, op, literal }),
    }
}

/// `name(...)` spanning the whole input; returns the argument text.
fn call_body<'a>(text: &'a str, name: &str) -> Result<Option<&'a str>, ExprError> {
    match call_prefix(text, name)? {
        Some((inner, rest)) if rest.is_empty() => Ok(Some(inner)),
        _ => Ok(None),
    }
}

/// `name(...)` at the start of the input; returns the argument text and the trimmed remainder.
fn call_prefix<'a>(text: &'a str, name: &str) -> Result<Option<(&'a str, &'a str)>, ExprError> {
    let Some(after_name) = text.strip_prefix(name) else {
        return Ok(None);
    };
    let after_name = after_name.trim_start();
    if !after_name.starts_with('(') {
        return Ok(None);
    }
    let open = text.len() - after_name.len();
    let close = matching_close(text, open).ok_or(ExprError::UnbalancedParentheses)?;
    Ok(Some((&text[open + 1..close], text[close + 1..].trim())))
}

/// Index of the `)` closing the `(` at `open`, skipping quoted text.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (index, ch) in text[open..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + index);
                }
            }
            (None, _) => {}
        }
    }
    None
}

/// Splits on top-level commas outside quotes and parentheses.
fn split_arguments(text: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                args.push(text[start..index].trim());
                start = index + 1;
            }
            (None, _) => {}
        }
    }
    args.push(text[start..].trim());
    args
}

fn split_leading_operator<'a>(
    rest: &'a str,
    operators: &[CompareOp],
    function: &'static str,
) -> Result<(CompareOp, &'a str), ExprError> {
    operators
        .iter()
        .find_map(|op| {
            rest.strip_prefix(op.symbol())
                .map(|operand| (*op, operand.trim()))
        })
        .ok_or_else(|| ExprError::UnsupportedComparison {
            function,
            comparison: rest.to_string(),
        })
}

/// `${name}`, a bare identifier, or `.`.
pub(crate) fn parse_field_ref(text: &str) -> Result<FieldRef, ExprError> {
    let text = text.trim();
    if text == "." {
        return Ok(FieldRef::Current);
    }
    let name = text
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .map(str::trim)
        .unwrap_or(text);
    if is_identifier(name) {
        Ok(FieldRef::Named(name.to_string()))
    } else {
        Err(ExprError::InvalidFieldReference(text.to_string()))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-'))
}

/// A quoted string (single or double quotes) or a finite number.
fn parse_literal(text: &str) -> Result<Literal, ExprError> {
    let text = text.trim();
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            let inner = &text[1..text.len() - 1];
            if inner.contains(quote) {
                return Err(ExprError::InvalidLiteral(text.to_string()));
            }
            return Ok(Literal::Text(inner.to_string()));
        }
    }
    text.parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .map(Literal::Number)
        .ok_or_else(|| ExprError::InvalidLiteral(text.to_string()))
}
