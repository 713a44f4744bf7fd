use super::{Expr, parse};
use crate::error::ExprError;
use crate::spec::form::{CompiledForm, Diagnostic};

/// Strict parse: reports why an expression would fall open.
pub fn lint_expression(source: &str) -> Result<Expr, ExprError> {
    let expr = parse(source);
    match expr.first_error() {
        Some(reason) => Err(reason.clone()),
        None => Ok(expr),
    }
}

/// Authoring-time checks over every expression of a compiled form.
///
/// Reports unparseable `relevant`/`constraint` strings and references to
/// fields the form does not define. Evaluation is unaffected.
pub fn lint_form(form: &CompiledForm) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for field in form.all_fields() {
        let expressions = [
            ("relevant", field.relevant_expr()),
            ("constraint", field.constraint_expr()),
        ];
        for (attribute, source) in expressions {
            let Some(source) = source else {
                continue;
            };
            match lint_expression(source) {
                Ok(expr) => {
                    for name in expr.referenced_fields() {
                        if !form.contains(name) {
                            diagnostics.push(Diagnostic::new(
                                &field.name,
                                format!("{} references unknown field '{}'", attribute, name),
                            ));
                        }
                    }
                }
                Err(reason) => diagnostics.push(Diagnostic::new(
                    &field.name,
                    format!("{} '{}' is ignored: {}", attribute, source, reason),
                )),
            }
        }
        if let Some(parent) = field.depends_on_field()
            && !form.contains(parent)
        {
            diagnostics.push(Diagnostic::new(
                &field.name,
                format!("depends_on references unknown field '{}'", parent),
            ));
        }
    }
    diagnostics
}
