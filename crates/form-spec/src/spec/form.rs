use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::field::FieldDefinition;

/// Problem found while compiling or linting a schema. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostic {
    pub field: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Output of compiling one schema version.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CompiledForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Renderable fields sorted by `order`, ties in declaration order.
    pub fields: Vec<FieldDefinition>,
    /// Hidden, metadata, display-only and calculated fields, in the same order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<FieldDefinition>,
    /// Group names by first appearance among `fields`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledForm {
    /// Renderable fields followed by excluded ones.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().chain(self.excluded.iter())
    }

    /// Looks a field up by name, excluded fields included.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.all_fields().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}
