//! Folder codec error types.

use std::path::PathBuf;
use thiserror::Error;

use docgraph_model::ModelError;
use docgraph_xml::XmlError;

/// Folder codec operation error.
#[derive(Debug, Error)]
pub enum FolderError {
    /// File system operation failed.
    #[error("failed to {operation}: {path}")]
    Filesystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path exists but is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// An object folder has no document.
    #[error("no document in {path}")]
    MissingDocument { path: PathBuf },

    /// An object folder has more than one document.
    #[error("{count} documents in {path}, expected one")]
    MultipleDocuments { path: PathBuf, count: usize },

    /// The target cannot receive a graph.
    #[error("cannot write to {path}: {reason}")]
    InvalidTarget { path: PathBuf, reason: String },

    /// Atomic write failed (temp file couldn't be renamed).
    #[error("failed to complete write of {target_path}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be read or written.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// A value could not be applied to the graph.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl FolderError {
    /// Wrap an I/O error with the operation and path it came from.
    pub(crate) fn filesystem(operation: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Filesystem {
            operation,
            path,
            source,
        }
    }
}

/// Result type alias for folder operations.
pub type Result<T> = std::result::Result<T, FolderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FolderError::MultipleDocuments {
            path: PathBuf::from("/data/Items/door"),
            count: 2,
        };
        assert_eq!(err.to_string(), "2 documents in /data/Items/door, expected one");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = FolderError::filesystem("read directory", "/data")(io);
        assert_eq!(err.to_string(), "failed to read directory: /data");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_xml_error_conversion() {
        let err: FolderError = XmlError::NoRoot.into();
        assert_eq!(err.to_string(), "graph has no root entity");
    }
}
