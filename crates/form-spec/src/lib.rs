#![allow(missing_docs)]

pub mod answers;
pub mod compile;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod options;
pub mod render;
pub mod reset;
pub mod session;
pub mod spec;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerSet, ValidationError, ValidationResult, is_present};
pub use compile::{compile, compile_value, decompile, derive_group_order};
pub use config::{DEFAULT_GEO_HIERARCHY, EngineConfig};
pub use engine::FormEngine;
pub use error::{EngineError, ExprError};
pub use expr::{
    EvalContext, Expr, evaluate_constraint, evaluate_relevance, lint_expression, lint_form, parse,
};
pub use options::{resolve_all_options, resolve_options, resolve_parent_field};
pub use render::{
    RenderField, RenderGroup, RenderPayload, RenderProgress, RenderStatus, build_render_payload,
    render_json_ui, render_text,
};
pub use reset::{ResetPolicy, clear_dependents, dependents_of, fields_to_clear};
pub use session::{AnswerOutcome, AnswerUpdate, Evaluation, FormSession, evaluate};
pub use spec::{
    ChoiceOption, CompiledForm, DependsOperator, Diagnostic, FieldDefinition, FieldType,
    FieldValidation, ItemsDescriptor, PropertyDescriptor, SchemaDocument,
};
pub use validate::{validate, validate_value};
pub use visibility::{VisibilityMap, is_relevant, resolve_visibility, visible_fields};
