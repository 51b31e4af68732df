//! Entity type model and arena object graph.
//!
//! This crate holds the data side of docgraph: a static [`Schema`] describing every
//! entity type as an ordered table of [`FieldDescriptor`]s, and a [`Graph`] that owns
//! the entities of one session and keeps inverse relationships consistent.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use docgraph_model::{EntityType, FieldDescriptor, Graph, ScalarKind, Schema};
//!
//! let schema = Schema::builder()
//!     .entity(
//!         EntityType::new("Project")
//!             .field(FieldDescriptor::scalar("Name", ScalarKind::String))
//!             .field(FieldDescriptor::entities("Items", "Item"))
//!             .field(FieldDescriptor::inverse("Children", "Item", "Parent")),
//!     )
//!     .entity(EntityType::new("Item").field(FieldDescriptor::entity("Parent", "Project")))
//!     .root("Project")
//!     .build()
//!     .unwrap();
//!
//! let mut graph = Graph::new(Arc::new(schema));
//! let project = graph.create("Project").unwrap();
//! let item = graph.create("Item").unwrap();
//! graph.set(item, "Parent", project).unwrap();
//!
//! // The inverse collection follows the direct reference.
//! assert_eq!(graph.members(project, "Children"), &[item]);
//! ```

mod compare;
mod definition;
mod error;
mod graph;
mod schema;
mod value;

pub use definition::{FieldDefinition, SchemaDefinition, TypeDefinition};
pub use error::{ModelError, Result, SchemaError};
pub use graph::{Entity, EntityId, Graph};
pub use schema::{
    ContentHint, Counterpart, DefinedType, EntityType, EnumType, FieldDescriptor, FieldKind,
    Placement, ScalarKind, Schema, SchemaBuilder, TypeKey,
};
pub use value::{Scalar, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
