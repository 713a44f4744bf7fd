pub mod field;
pub mod form;
pub mod schema;

pub use field::{ChoiceOption, DependsOperator, FieldDefinition, FieldType, FieldValidation};
pub use form::{CompiledForm, Diagnostic};
pub use schema::{ItemsDescriptor, PropertyDescriptor, SchemaDocument};
