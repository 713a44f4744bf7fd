use thiserror::Error;

/// Errors surfaced by the engine's mutating and loading entry points.
///
/// Evaluation itself never fails: unparseable expressions fall open instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("failed to parse schema document: {0}")]
    SchemaJson(#[source] serde_json::Error),
}

/// Why an expression could not be parsed strictly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("expression is empty")]
    Empty,
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("{function}() expects {expected} argument(s)")]
    ArgumentCount {
        function: &'static str,
        expected: usize,
    },
    #[error("'{0}' is not a field reference")]
    InvalidFieldReference(String),
    #[error("'{0}' is not a quoted string or a number")]
    InvalidLiteral(String),
    #[error("'{0}' is not a whole number")]
    InvalidCount(String),
    #[error("{function}() does not support the comparison '{comparison}'")]
    UnsupportedComparison {
        function: &'static str,
        comparison: String,
    },
    #[error("unrecognized expression")]
    Unrecognized,
}
