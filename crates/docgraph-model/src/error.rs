//! Error types for schema construction and graph mutation.

use thiserror::Error;

/// Errors raised while building a [`Schema`](crate::Schema).
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Two entity types share a wire name.
    #[error("duplicate entity type: {name}")]
    DuplicateType { name: String },

    /// A type name is referenced but never declared.
    #[error("unknown type '{name}' referenced by {referenced_by}")]
    UnknownType { name: String, referenced_by: String },

    /// A field name or wire name occurs twice in one flattened type.
    #[error("duplicate field '{field}' on {type_name}")]
    DuplicateField { type_name: String, field: String },

    /// A field kind cannot be written with the requested placement.
    #[error("field {type_name}.{field} cannot use {placement} placement")]
    InvalidPlacement {
        type_name: String,
        field: String,
        placement: &'static str,
    },

    /// The supertype chain loops back on itself.
    #[error("inheritance cycle through {type_name}")]
    InheritanceCycle { type_name: String },

    /// An inverse declaration does not match its direct field.
    #[error("inverse field {type_name}.{field}: {reason}")]
    InverseMismatch {
        type_name: String,
        field: String,
        reason: String,
    },

    /// Hidden inverse members are written as top-level elements named by their type,
    /// which would be read back as a field of the owner with that wire name.
    #[error("{type_name}.{field} keeps hidden {element} members, but {element} is also a field of {type_name}")]
    AmbiguousElement {
        type_name: String,
        field: String,
        element: String,
    },

    /// A key or name field is not a string field of the type.
    #[error("{type_name} names '{field}' as its key or name field, but no such string field exists")]
    InvalidKeyField { type_name: String, field: String },

    /// No root type was configured.
    #[error("schema has no root type")]
    MissingRoot,

    /// A JSON schema definition could not be parsed.
    #[error("invalid schema definition: {0}")]
    Definition(#[from] serde_json::Error),
}

/// Errors raised by [`Graph`](crate::Graph) operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No entity type with this name exists in the schema.
    #[error("unknown entity type: {name}")]
    UnknownType { name: String },

    /// The entity's type has no field with this name.
    #[error("{type_name} has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    /// The value does not have the shape the field kind requires.
    #[error("{type_name}.{field} expects {expected}, got {found}")]
    ShapeMismatch {
        type_name: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// An entity of the wrong type was assigned to a reference field.
    #[error("{type_name}.{field} expects {expected}, got {found}")]
    TypeMismatch {
        type_name: String,
        field: String,
        expected: String,
        found: String,
    },

    /// Inverse fields are derived and cannot be assigned directly.
    #[error("{type_name}.{field} is an inverse field and is maintained by the graph")]
    InverseNotSettable { type_name: String, field: String },

    /// A collection operation was applied to a non-collection field.
    #[error("{type_name}.{field} is not an entity collection")]
    NotACollection { type_name: String, field: String },

    /// The requested root entity is not of the schema's root type.
    #[error("{type_name} cannot be the graph root (expected {expected})")]
    InvalidRoot { type_name: String, expected: String },

    /// An entity handle does not belong to this graph.
    #[error("unknown entity {id}")]
    UnknownEntity { id: String },
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, ModelError>;

impl ModelError {
    /// Create an UnknownField error.
    pub fn unknown_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    /// Whether this error comes from a schema/type disagreement rather than misuse.
    ///
    /// Readers use this to decide which failures can be skipped per item.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. } | Self::TypeMismatch { .. } | Self::NotACollection { .. }
        )
    }
}
