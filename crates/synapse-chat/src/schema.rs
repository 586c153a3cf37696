//! Shape checks for tool arguments and tool results.
//!
//! A [`Schema`] is the validation contract only: field names, whether each is
//! required, and a primitive type tag. Human-readable field documentation is
//! kept apart (see [`crate::registry::ToolDeclaration::with_parameters_doc`])
//! and never takes part in validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Primitive type tag for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Object,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Object => "object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// Declared shape of a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// An object with no declared fields. Any object passes.
    pub fn object() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    /// Bare JSON Schema for this shape, used when a tool has no richer
    /// documentation to offer the model.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(
                field.name.clone(),
                serde_json::json!({ "type": field.kind.as_str() }),
            );
        }

        let required: Vec<Value> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| Value::String(f.name.clone()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// The first reason a value does not fit a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected an object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' should be {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },
}

impl ValidationError {
    /// Name of the offending field, when the failure is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::NotAnObject { .. } => None,
            ValidationError::MissingField { field } => Some(field),
            ValidationError::TypeMismatch { field, .. } => Some(field),
        }
    }
}

/// JSON type name used in error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `value` against `schema`, returning the value unchanged on success.
///
/// Fields are checked in declaration order and the first offence is
/// reported. A `null` counts as absent. Undeclared fields are allowed.
pub fn validate<'a>(value: &'a Value, schema: &Schema) -> Result<&'a Value, ValidationError> {
    let object = value.as_object().ok_or(ValidationError::NotAnObject {
        found: json_type_name(value),
    })?;

    for field in &schema.fields {
        match object.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(ValidationError::MissingField {
                        field: field.name.clone(),
                    });
                }
            }
            Some(v) if !field.kind.matches(v) => {
                return Err(ValidationError::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.kind,
                    found: json_type_name(v),
                });
            }
            Some(_) => {}
        }
    }

    Ok(value)
}
