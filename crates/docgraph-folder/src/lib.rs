//! Folder-of-files projection of docgraph object graphs.
//!
//! A graph is stored as a directory tree. The root entity and every member of an
//! externalized collection get a folder of their own holding one XML document; long
//! text, markup and binary fields are stored next to that document as `.txt`, `.html`
//! and `.bin` files.
//!
//! # Layout
//!
//! ```text
//! Demo/
//!   Demo.xml
//!   Notes.txt
//!   Items/
//!     door/
//!       door.xml
//!     window/
//!       window.xml
//! ```
//!
//! An entity collection is spread over member folders when every member has a distinct
//! natural key (or, failing that, a distinct name). Collections with more than
//! [`DEFAULT_GROUP_THRESHOLD`] members are split further into single-character group
//! folders. Documents reference each other by identifier, and the parent document lists
//! its externalized members so their order survives.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use docgraph_folder::{read_folder, write_folder};
//! # fn demo(graph: &docgraph_model::Graph, schema: Arc<docgraph_model::Schema>) -> docgraph_folder::Result<()> {
//! write_folder(Path::new("out/demo"), graph)?;
//! let copy = read_folder(Path::new("out/demo"), schema)?;
//! assert!(graph.equivalent(&copy));
//! # Ok(())
//! # }
//! ```

mod error;
mod naming;
mod options;
mod plan;
mod reader;
mod writer;

// Re-export error types
pub use error::{FolderError, Result};

pub use naming::sanitize;
pub use options::{DEFAULT_GROUP_THRESHOLD, FolderOptions};

// Re-export reader functionality
pub use reader::{FolderReader, read_folder, read_folder_with_options};

// Re-export writer functionality
pub use writer::{FolderWriter, write_folder, write_folder_with_options};
