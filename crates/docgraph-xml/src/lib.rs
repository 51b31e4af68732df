//! Streaming XML reader and writer for docgraph object graphs.
//!
//! Graphs are written as one element tree rooted at the graph's root entity. Entities
//! appear inline where they are first met; an entity met again is written as an empty
//! element carrying `href`, and only entities that are referenced that way carry an
//! `id`. Reading is a single pass that defers references to identifiers declared later
//! in the document.
//!
//! # Features
//!
//! - Two-pass writer that only assigns identifiers where they are needed
//! - Streaming reader with forward references and document-order collections
//! - Inverse fields rebuilt from their direct counterparts
//! - `xsi:type` subtype overrides, `<name>-wrapper` values and an optional header block
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use docgraph_model::{EntityType, FieldDescriptor, Graph, ScalarKind, Schema};
//! use docgraph_xml::{XmlReader, XmlWriter};
//!
//! let schema = Arc::new(
//!     Schema::builder()
//!         .entity(
//!             EntityType::new("Project")
//!                 .field(FieldDescriptor::scalar("Name", ScalarKind::String))
//!                 .field(FieldDescriptor::entities("Items", "Item")),
//!         )
//!         .entity(EntityType::new("Item").field(FieldDescriptor::scalar("Name", ScalarKind::String)))
//!         .root("Project")
//!         .build()
//!         .unwrap(),
//! );
//!
//! let mut graph = Graph::new(Arc::clone(&schema));
//! let project = graph.create("Project").unwrap();
//! graph.set_root(project).unwrap();
//! let item = graph.create("Item").unwrap();
//! graph.set(item, "Name", "A").unwrap();
//! graph.push(project, "Items", item).unwrap();
//!
//! let mut buffer = Vec::new();
//! XmlWriter::new(&mut buffer).write_graph(&graph).unwrap();
//!
//! let copy = XmlReader::new(buffer.as_slice()).read(schema).unwrap();
//! assert!(graph.equivalent(&copy));
//! ```

mod error;
pub mod header;
pub mod identity;
mod options;
pub mod pending;
mod reader;
pub mod value_codec;
mod writer;

// Re-export error types
pub use error::{Result, XmlError};

pub use header::DocumentHeader;
pub use identity::IdentityStore;
pub use options::{DEFAULT_MAX_DEPTH, XmlReaderOptions, XmlWriterOptions};
pub use pending::ForwardReferenceQueue;

// Re-export reader functionality
pub use reader::{ReadSession, XmlDocument, XmlReader, read_xml, read_xml_with_options};

// Re-export writer functionality
pub use writer::{WriteSession, XSI_NAMESPACE, XmlWriter, write_xml, write_xml_with_options};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
