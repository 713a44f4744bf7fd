//! Relevance and constraint mini-language.
//!
//! The language is closed: negation, `selected`, `count-selected`, a single
//! comparison against a literal, a bare field reference, and the constraint
//! helpers `regex` and `string-length`. There is no conjunction, no nesting
//! other than `not(..)`, and nothing that can loop.
//!
//! Comparison operators overlap (`!=` and `>=` both contain `=`), so a
//! comparison is split at the first operator found in the fixed order
//! `!=, >=, <=, >, <, =`. That order decides the parse even when the operator
//! text sits inside a quoted literal.
//!
//! Anything that does not parse becomes [`Expr::Unknown`], which evaluates to
//! `true`: an unreadable `relevant` keeps the field visible and an unreadable
//! `constraint` accepts the value.

mod eval;
mod lint;
mod parser;

use std::cmp::Ordering;

pub use eval::{EvalContext, evaluate_constraint, evaluate_relevance};
pub use lint::{lint_expression, lint_form};
pub use parser::parse;

use crate::error::ExprError;

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `not(EXPR)`
    Not(Box<Expr>),
    /// `selected(FIELD, 'VALUE')`
    Selected { field: FieldRef, value: String },
    /// `count-selected(FIELD) OP N`
    CountSelected {
        field: FieldRef,
        op: CompareOp,
        count: i64,
    },
    /// `${FIELD} OP LITERAL`
    Compare {
        field: FieldRef,
        op: CompareOp,
        literal: Literal,
    },
    /// `${FIELD} = ''` (`present == false`) or `${FIELD} != ''` (`present == true`).
    Presence { field: FieldRef, present: bool },
    /// Bare `${FIELD}` or `FIELD`.
    Field(FieldRef),
    /// `regex(., 'PATTERN')`
    Regex { pattern: String },
    /// `string-length(.) OP N`
    StringLength { op: CompareOp, length: usize },
    /// Fail-open fallback for anything the grammar does not recognise.
    Unknown { source: String, reason: ExprError },
}

impl Expr {
    /// Named fields referenced anywhere in the expression.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_fields(&mut names);
        names
    }

    fn collect_fields<'a>(&'a self, names: &mut Vec<&'a str>) {
        let field = match self {
            Expr::Not(inner) => return inner.collect_fields(names),
            Expr::Selected { field, .. }
            | Expr::CountSelected { field, .. }
            | Expr::Compare { field, .. }
            | Expr::Presence { field, .. }
            | Expr::Field(field) => field,
            Expr::Regex { .. } | Expr::StringLength { .. } | Expr::Unknown { .. } => return,
        };
        if let FieldRef::Named(name) = field
            && !names.contains(&name.as_str())
        {
            names.push(name.as_str());
        }
    }

    /// First parse failure inside the expression, if any.
    pub fn first_error(&self) -> Option<&ExprError> {
        match self {
            Expr::Not(inner) => inner.first_error(),
            Expr::Unknown { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Left-hand side of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    /// `${name}` or a bare `name`.
    Named(String),
    /// `.`: the value being entered.
    Current,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

impl CompareOp {
    /// Order in which comparison operators are searched for.
    pub const PRECEDENCE: [CompareOp; 6] = [
        CompareOp::Ne,
        CompareOp::Ge,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Lt,
        CompareOp::Eq,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Ne => "!=",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Eq => "=",
        }
    }

    /// Whether `ordering` (left compared to right) satisfies the operator.
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Eq => ordering == Ordering::Equal,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(f64),
}

impl Literal {
    /// Textual form used when a literal is matched against an answer.
    pub fn as_text(&self) -> String {
        match self {
            Literal::Text(text) => text.clone(),
            Literal::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                format!("{}", *number as i64)
            }
            Literal::Number(number) => number.to_string(),
        }
    }
}
