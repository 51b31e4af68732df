//! Serializable schema definitions.
//!
//! The JSON form mirrors the builder API:
//!
//! ```json
//! {
//!   "root": "Project",
//!   "types": [
//!     { "name": "Project", "key_field": "id",
//!       "fields": [
//!         { "name": "id", "kind": { "scalar": "string" } },
//!         { "name": "Items", "kind": { "entity_list": "Item" } },
//!         { "name": "Children", "kind": { "inverse": { "source": "Item", "via": "Parent" } } }
//!       ] },
//!     { "name": "Item",
//!       "fields": [ { "name": "Parent", "kind": { "entity": "Project" } } ] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::schema::{ContentHint, EntityType, FieldDescriptor, FieldKind, Placement, Schema};

/// A complete schema table in serializable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub root: String,
    pub types: Vec<TypeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supertype: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_name: Option<String>,
    /// Defaults to the kind's usual placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: ContentHint,
}

impl From<FieldDefinition> for FieldDescriptor {
    fn from(def: FieldDefinition) -> Self {
        let mut field = FieldDescriptor::new(def.name, def.kind).with_content(def.content);
        if let Some(wire_name) = def.wire_name {
            field = field.with_wire_name(wire_name);
        }
        if let Some(placement) = def.placement {
            field = field.with_placement(placement);
        }
        if def.required {
            field = field.required();
        }
        field
    }
}

impl From<TypeDefinition> for EntityType {
    fn from(def: TypeDefinition) -> Self {
        let mut ty = EntityType::new(def.name);
        if let Some(sup) = def.supertype {
            ty = ty.extends(sup);
        }
        if def.is_abstract {
            ty = ty.abstract_type();
        }
        if let Some(key) = def.key_field {
            ty = ty.with_key_field(key);
        }
        if let Some(name) = def.name_field {
            ty = ty.with_name_field(name);
        }
        def.fields
            .into_iter()
            .fold(ty, |ty, field| ty.field(field.into()))
    }
}

impl SchemaDefinition {
    /// Validate and build the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        self.types
            .into_iter()
            .fold(Schema::builder().root(self.root), |builder, ty| {
                builder.entity(ty.into())
            })
            .build()
    }
}

impl Schema {
    /// Load a schema table from its JSON definition.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let definition: SchemaDefinition = serde_json::from_str(json)?;
        definition.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT_SCHEMA: &str = r#"{
        "root": "Project",
        "types": [
            { "name": "Project", "key_field": "id",
              "fields": [
                { "name": "id", "kind": { "scalar": "string" } },
                { "name": "Items", "kind": { "entity_list": "Item" }, "required": true },
                { "name": "Children", "kind": { "inverse": { "source": "Item", "via": "Parent" } } }
              ] },
            { "name": "Item",
              "fields": [
                { "name": "Parent", "kind": { "entity": "Project" } },
                { "name": "Notes", "kind": { "scalar": "string" }, "placement": "element",
                  "content": "long_text" }
              ] }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let schema = Schema::from_json(PROJECT_SCHEMA).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.type_name(schema.root_type()), "Project");

        let item = schema.entity_type(schema.type_key("Item").unwrap());
        let notes = item.field_at(item.slot("Notes").unwrap()).unwrap();
        assert_eq!(notes.placement, Placement::Element);
        assert_eq!(notes.content, ContentHint::LongText);

        let project = schema.entity_type(schema.type_key("Project").unwrap());
        let items = project.field_at(project.slot("Items").unwrap()).unwrap();
        assert!(items.required);
        let children = project.field_at(project.slot("Children").unwrap()).unwrap();
        assert_eq!(children.placement, Placement::Hidden);
    }

    #[test]
    fn test_invalid_json() {
        let err = Schema::from_json("{ \"root\": 1 }").unwrap_err();
        assert!(matches!(err, SchemaError::Definition(_)));
    }
}
