//! Error types for XML graph operations.

use std::path::PathBuf;
use thiserror::Error;

use docgraph_model::ModelError;

/// Errors that can occur when reading or writing graph documents.
#[derive(Debug, Error)]
pub enum XmlError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Malformed document structure.
    #[error("invalid document at byte {position}: {message}")]
    Format { message: String, position: u64 },

    /// A wire type name has no schema mapping.
    #[error("unknown type '{name}' at byte {position}")]
    UnknownType { name: String, position: u64 },

    /// Two entities in one session declare the same identifier.
    #[error("duplicate identifier '{id}' at byte {position}")]
    DuplicateId { id: String, position: u64 },

    /// A reference was never satisfied by the end of input.
    #[error("unresolved reference '{id}' from {field} ({count} unresolved in total)")]
    DanglingReference {
        id: String,
        field: String,
        count: usize,
    },

    /// The graph nests deeper than the configured limit.
    #[error("nesting deeper than {limit} levels at {type_name}")]
    DepthLimitExceeded { limit: usize, type_name: String },

    /// No entity of the schema's root type was found.
    #[error("document contains no {expected} root entity")]
    MissingRoot { expected: String },

    /// The graph has no root to write.
    #[error("graph has no root entity")]
    NoRoot,

    /// A value could not be applied to the graph.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Low-level XML syntax or encoding error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for XML graph operations.
pub type Result<T> = std::result::Result<T, XmlError>;

impl XmlError {
    /// Create a Format error.
    pub fn format(message: impl Into<String>, position: u64) -> Self {
        Self::Format {
            message: message.into(),
            position,
        }
    }

    /// Create an UnknownType error.
    pub fn unknown_type(name: impl Into<String>, position: u64) -> Self {
        Self::UnknownType {
            name: name.into(),
            position,
        }
    }

    /// Wrap any error quick-xml can convert.
    pub(crate) fn xml(err: impl Into<quick_xml::Error>) -> Self {
        Self::Xml(err.into())
    }
}
