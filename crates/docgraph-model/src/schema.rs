//! Entity type model: the static field descriptor table.
//!
//! A [`Schema`] is built once from [`EntityType`] declarations (in code through
//! [`SchemaBuilder`], or from JSON through [`Schema::from_json`]) and never changes
//! afterwards. Each type's field list is flattened with inherited fields first, so an
//! inherited field occupies the same slot in every subtype.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::value::Value;

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Integer,
    Real,
    Boolean,
    String,
    Timestamp,
    Binary,
}

impl ScalarKind {
    /// Name used for `<kind>-wrapper` elements.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "double",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Timestamp => "dateTime",
            Self::Binary => "hexBinary",
        }
    }

    /// Look up a kind by its wire name.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        [
            Self::Integer,
            Self::Real,
            Self::Boolean,
            Self::String,
            Self::Timestamp,
            Self::Binary,
        ]
        .into_iter()
        .find(|kind| kind.wire_name() == name)
    }

    /// Strings and binary values, which may contain or encode to arbitrary text and so
    /// cannot share a whitespace separated attribute.
    #[must_use]
    pub const fn is_text_like(self) -> bool {
        matches!(self, Self::String | Self::Binary)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A named single-value wrapper over a primitive (e.g. `Label` over string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedType {
    pub name: String,
    pub scalar: ScalarKind,
}

impl DefinedType {
    pub fn new(name: impl Into<String>, scalar: ScalarKind) -> Self {
        Self {
            name: name.into(),
            scalar,
        }
    }

    /// The anonymous defined type for a bare primitive.
    #[must_use]
    pub fn primitive(scalar: ScalarKind) -> Self {
        Self::new(scalar.wire_name(), scalar)
    }
}

/// An enumeration and its symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub symbols: Vec<String>,
}

impl EnumType {
    pub fn new<S: Into<String>>(name: impl Into<String>, symbols: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    /// Find the schema spelling of a symbol, ignoring case.
    pub fn symbol(&self, text: &str) -> Option<&str> {
        self.symbols
            .iter()
            .find(|s| s.eq_ignore_ascii_case(text))
            .map(String::as_str)
    }
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar(ScalarKind),
    Defined(DefinedType),
    Enum(EnumType),
    /// One of several defined types; the chosen type travels with the value.
    Select(Vec<DefinedType>),
    /// Reference to an entity of the named type (or a subtype).
    Entity(String),
    ScalarList(DefinedType),
    /// Fixed-width rows of scalars, flattened one level on the wire.
    ScalarMatrix { item: DefinedType, columns: usize },
    EntityList(String),
    /// Derived collection of `source` entities whose `via` field points here.
    Inverse { source: String, via: String },
}

impl FieldKind {
    /// Whether this field refers to entities.
    #[must_use]
    pub const fn is_entity(&self) -> bool {
        matches!(
            self,
            Self::Entity(_) | Self::EntityList(_) | Self::Inverse { .. }
        )
    }

    /// Whether the slot holds a collection that is pre-instantiated on allocation.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::ScalarList(_)
                | Self::ScalarMatrix { .. }
                | Self::EntityList(_)
                | Self::Inverse { .. }
        )
    }

    /// Whether this is a derived inverse field.
    #[must_use]
    pub const fn is_inverse(&self) -> bool {
        matches!(self, Self::Inverse { .. })
    }

    /// Name of the entity type this field refers to.
    pub fn target_name(&self) -> Option<&str> {
        match self {
            Self::Entity(t) | Self::EntityList(t) => Some(t),
            Self::Inverse { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The empty collection value a freshly allocated entity holds.
    #[must_use]
    pub fn empty_value(&self) -> Option<Value> {
        match self {
            Self::ScalarList(_) => Some(Value::List(Vec::new())),
            Self::ScalarMatrix { .. } => Some(Value::Matrix(Vec::new())),
            Self::EntityList(_) | Self::Inverse { .. } => Some(Value::Entities(Vec::new())),
            _ => None,
        }
    }

    /// Short description of the accepted value shape.
    #[must_use]
    pub const fn expected_shape(&self) -> &'static str {
        match self {
            Self::Scalar(_) | Self::Defined(_) => "scalar",
            Self::Enum(_) => "enumeration",
            Self::Select(_) => "selected value",
            Self::Entity(_) => "entity reference",
            Self::ScalarList(_) => "scalar list",
            Self::ScalarMatrix { .. } => "scalar matrix",
            Self::EntityList(_) | Self::Inverse { .. } => "entity collection",
        }
    }

    /// Check the value's shape against this kind (entity types are checked by the graph).
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Scalar(kind), Value::Scalar(s)) => s.kind() == *kind,
            (Self::Defined(def), Value::Scalar(s)) => s.kind() == def.scalar,
            (Self::Enum(e), Value::Enum(symbol)) => e.symbols.iter().any(|s| s == symbol),
            (Self::Select(options), Value::Selected { type_name, value }) => options
                .iter()
                .any(|d| &d.name == type_name && d.scalar == value.kind()),
            (Self::Entity(_), Value::Entity(_)) => true,
            (Self::ScalarList(item), Value::List(items)) => {
                items.iter().all(|s| s.kind() == item.scalar)
            }
            (Self::ScalarMatrix { item, columns }, Value::Matrix(rows)) => rows
                .iter()
                .all(|row| row.len() == *columns && row.iter().all(|s| s.kind() == item.scalar)),
            (Self::EntityList(_) | Self::Inverse { .. }, Value::Entities(_)) => true,
            _ => false,
        }
    }

    fn default_placement(&self) -> Placement {
        match self {
            Self::Scalar(_) | Self::Defined(_) | Self::Enum(_) => Placement::Attribute,
            Self::ScalarList(item) | Self::ScalarMatrix { item, .. } => {
                if item.scalar.is_text_like() {
                    Placement::Element
                } else {
                    Placement::Attribute
                }
            }
            Self::Select(_) | Self::Entity(_) | Self::EntityList(_) => Placement::Element,
            Self::Inverse { .. } => Placement::Hidden,
        }
    }
}

/// Where a field appears in the XML stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Written as an attribute of the entity element. For a single entity reference,
    /// the field element itself carries the entity.
    Attribute,
    /// Written as a nested element.
    Element,
    /// Never written directly.
    Hidden,
}

impl Placement {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Attribute => "attribute",
            Self::Element => "element",
            Self::Hidden => "hidden",
        }
    }
}

/// How the folder codec stores a field's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentHint {
    #[default]
    Plain,
    /// Multi-line text, externalized as `.txt`.
    LongText,
    /// Markup, externalized as `.html`.
    Markup,
    /// Binary payload, externalized as `.bin`.
    Blob,
}

/// Opaque handle of an entity type within one [`Schema`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u32);

impl TypeKey {
    fn new(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

/// The other end of an inverse relationship.
///
/// On a direct field this names the inverse field (type and slot) that lists the
/// referrers; on an inverse field it names the direct field it is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counterpart {
    pub owner: TypeKey,
    pub slot: usize,
}

/// Descriptor of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub wire_name: String,
    pub kind: FieldKind,
    pub placement: Placement,
    pub required: bool,
    pub content: ContentHint,
    target: Option<TypeKey>,
    counterpart: Option<Counterpart>,
}

impl FieldDescriptor {
    /// Create a field with the kind's default placement.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            wire_name: name.clone(),
            name,
            placement: kind.default_placement(),
            kind,
            required: false,
            content: ContentHint::Plain,
            target: None,
            counterpart: None,
        }
    }

    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self::new(name, FieldKind::Scalar(kind))
    }

    pub fn defined(name: impl Into<String>, defined: DefinedType) -> Self {
        Self::new(name, FieldKind::Defined(defined))
    }

    pub fn enumeration(name: impl Into<String>, enumeration: EnumType) -> Self {
        Self::new(name, FieldKind::Enum(enumeration))
    }

    pub fn select(name: impl Into<String>, options: Vec<DefinedType>) -> Self {
        Self::new(name, FieldKind::Select(options))
    }

    pub fn entity(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Entity(target.into()))
    }

    pub fn list(name: impl Into<String>, item: DefinedType) -> Self {
        Self::new(name, FieldKind::ScalarList(item))
    }

    pub fn matrix(name: impl Into<String>, item: DefinedType, columns: usize) -> Self {
        Self::new(name, FieldKind::ScalarMatrix { item, columns })
    }

    pub fn entities(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldKind::EntityList(target.into()))
    }

    /// Inverse of `source.via`.
    pub fn inverse(
        name: impl Into<String>,
        source: impl Into<String>,
        via: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Inverse {
                source: source.into(),
                via: via.into(),
            },
        )
    }

    #[must_use]
    pub fn with_wire_name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = wire_name.into();
        self
    }

    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: ContentHint) -> Self {
        self.content = content;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Resolved entity type this field refers to.
    pub fn target(&self) -> Option<TypeKey> {
        self.target
    }

    /// The inverse link, if this field participates in one.
    pub fn counterpart(&self) -> Option<Counterpart> {
        self.counterpart
    }
}

/// Declaration of an entity type.
#[derive(Debug, Clone)]
pub struct EntityType {
    name: String,
    supertype_name: Option<String>,
    is_abstract: bool,
    key_field: Option<String>,
    name_field: Option<String>,
    own_fields: Vec<FieldDescriptor>,
    // Resolved by SchemaBuilder::build.
    supertype: Option<TypeKey>,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    by_wire: HashMap<String, usize>,
    inverse_by_wire: HashMap<String, usize>,
    key_slot: Option<usize>,
    name_slot: Option<usize>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertype_name: None,
            is_abstract: false,
            key_field: None,
            name_field: None,
            own_fields: Vec::new(),
            supertype: None,
            fields: Vec::new(),
            by_name: HashMap::new(),
            by_wire: HashMap::new(),
            inverse_by_wire: HashMap::new(),
            key_slot: None,
            name_slot: None,
        }
    }

    #[must_use]
    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertype_name = Some(supertype.into());
        self
    }

    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Field holding the natural unique identifier.
    #[must_use]
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = Some(field.into());
        self
    }

    /// Field holding the human-readable name.
    #[must_use]
    pub fn with_name_field(mut self, field: impl Into<String>) -> Self {
        self.name_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.own_fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supertype(&self) -> Option<TypeKey> {
        self.supertype
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// All fields, inherited first.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Descriptor at a slot.
    pub fn field_at(&self, slot: usize) -> Option<&FieldDescriptor> {
        self.fields.get(slot)
    }

    /// Slot of the field with this (programmatic) name.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Slot of the field with this wire name: direct fields first, then inverse fields.
    pub fn find_field(&self, wire_name: &str) -> Option<usize> {
        self.by_wire
            .get(wire_name)
            .or_else(|| self.inverse_by_wire.get(wire_name))
            .copied()
    }

    /// Slot of the natural-key field.
    pub fn key_slot(&self) -> Option<usize> {
        self.key_slot
    }

    /// Slot of the name field.
    pub fn name_slot(&self) -> Option<usize> {
        self.name_slot
    }
}

/// Immutable table of entity types.
#[derive(Debug, Clone)]
pub struct Schema {
    types: Vec<EntityType>,
    by_name: HashMap<String, TypeKey>,
    root: TypeKey,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up a type by its wire name.
    pub fn type_key(&self, name: &str) -> Option<TypeKey> {
        self.by_name.get(name).copied()
    }

    /// # Panics
    ///
    /// Panics if `key` was issued by a different schema.
    pub fn entity_type(&self, key: TypeKey) -> &EntityType {
        &self.types[key.index()]
    }

    pub fn type_name(&self, key: TypeKey) -> &str {
        self.entity_type(key).name()
    }

    /// The type whose first instance becomes the graph root.
    pub fn root_type(&self) -> TypeKey {
        self.root
    }

    /// Whether `ty` is `of` or inherits from it.
    pub fn is_subtype(&self, ty: TypeKey, of: TypeKey) -> bool {
        let mut current = Some(ty);
        while let Some(key) = current {
            if key == of {
                return true;
            }
            current = self.entity_type(key).supertype();
        }
        false
    }

    pub fn types(&self) -> impl Iterator<Item = (TypeKey, &EntityType)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeKey::new(i), ty))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Collects type declarations and validates them into a [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<EntityType>,
    root: Option<String>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn entity(mut self, ty: EntityType) -> Self {
        self.types.push(ty);
        self
    }

    #[must_use]
    pub fn root(mut self, name: impl Into<String>) -> Self {
        self.root = Some(name.into());
        self
    }

    /// Resolve names, flatten inheritance and link inverse fields.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut types = self.types;

        let mut by_name = HashMap::new();
        for (i, ty) in types.iter().enumerate() {
            if by_name.insert(ty.name.clone(), TypeKey::new(i)).is_some() {
                return Err(SchemaError::DuplicateType {
                    name: ty.name.clone(),
                });
            }
        }
        let lookup = |name: &str, referenced_by: String| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| SchemaError::UnknownType {
                    name: name.to_string(),
                    referenced_by,
                })
        };

        for ty in &mut types {
            if let Some(sup) = &ty.supertype_name {
                ty.supertype = Some(lookup(sup, ty.name.clone())?);
            }
            for field in &mut ty.own_fields {
                validate_placement(&ty.name, field)?;
                if let Some(target) = field.kind.target_name() {
                    field.target = Some(lookup(target, format!("{}.{}", ty.name, field.name))?);
                }
            }
        }

        // Ancestor chains, root-most first.
        let mut chains = Vec::with_capacity(types.len());
        for (i, ty) in types.iter().enumerate() {
            let mut chain = vec![i];
            let mut current = ty.supertype;
            while let Some(key) = current {
                if chain.contains(&key.index()) {
                    return Err(SchemaError::InheritanceCycle {
                        type_name: ty.name.clone(),
                    });
                }
                chain.push(key.index());
                current = types[key.index()].supertype;
            }
            chain.reverse();
            chains.push(chain);
        }

        // Slot of a type's first own field, identical in every subtype.
        let bases: Vec<usize> = chains
            .iter()
            .map(|chain| {
                chain[..chain.len() - 1]
                    .iter()
                    .map(|&t| types[t].own_fields.len())
                    .sum()
            })
            .collect();

        link_inverses(&mut types, &chains, &bases)?;

        for (i, chain) in chains.iter().enumerate() {
            let fields: Vec<FieldDescriptor> = chain
                .iter()
                .flat_map(|&t| types[t].own_fields.iter().cloned())
                .collect();
            // Nearest declaration wins, starting with the type itself.
            let key_field = chain.iter().rev().find_map(|&t| types[t].key_field.clone());
            let name_field = chain.iter().rev().find_map(|&t| types[t].name_field.clone());
            let ty = &mut types[i];
            ty.by_name.clear();
            ty.by_wire.clear();
            ty.inverse_by_wire.clear();
            for (slot, field) in fields.iter().enumerate() {
                let wire_map = if field.kind.is_inverse() {
                    &mut ty.inverse_by_wire
                } else {
                    &mut ty.by_wire
                };
                if ty.by_name.insert(field.name.clone(), slot).is_some()
                    || wire_map.insert(field.wire_name.clone(), slot).is_some()
                {
                    return Err(SchemaError::DuplicateField {
                        type_name: ty.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
            ty.key_slot = resolve_text_field(&ty.name, key_field.as_deref(), &fields, &ty.by_name)?;
            ty.name_slot =
                resolve_text_field(&ty.name, name_field.as_deref(), &fields, &ty.by_name)?;
            ty.fields = fields;
        }
        check_hidden_members(&types, &chains)?;

        let root_name = self.root.ok_or(SchemaError::MissingRoot)?;
        let root = lookup(&root_name, "root".to_string())?;

        Ok(Schema {
            types,
            by_name,
            root,
        })
    }
}

fn validate_placement(type_name: &str, field: &FieldDescriptor) -> Result<(), SchemaError> {
    let valid = match (&field.kind, field.placement) {
        (FieldKind::EntityList(_) | FieldKind::Select(_), Placement::Attribute) => false,
        (FieldKind::Inverse { .. }, Placement::Attribute) => false,
        // Attribute lists are whitespace separated.
        (FieldKind::ScalarList(item), Placement::Attribute) => !item.scalar.is_text_like(),
        (FieldKind::ScalarMatrix { item, columns }, placement) => {
            *columns > 0 && !(placement == Placement::Attribute && item.scalar.is_text_like())
        }
        _ => true,
    };
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidPlacement {
            type_name: type_name.to_string(),
            field: field.name.clone(),
            placement: field.placement.as_str(),
        })
    }
}

/// Reject types whose hidden inverse members would share an element name with one of
/// the type's own fields.
fn check_hidden_members(types: &[EntityType], chains: &[Vec<usize>]) -> Result<(), SchemaError> {
    for ty in types {
        for field in &ty.fields {
            if !field.kind.is_inverse() || field.placement != Placement::Hidden {
                continue;
            }
            let Some(source) = field.target else {
                continue;
            };
            let clash = chains
                .iter()
                .enumerate()
                .filter(|(_, chain)| chain.contains(&source.index()))
                .map(|(t, _)| &types[t].name)
                .find(|name| ty.by_wire.contains_key(name.as_str()));
            if let Some(element) = clash {
                return Err(SchemaError::AmbiguousElement {
                    type_name: ty.name.clone(),
                    field: field.name.clone(),
                    element: element.clone(),
                });
            }
        }
    }
    Ok(())
}

fn resolve_text_field(
    type_name: &str,
    field: Option<&str>,
    fields: &[FieldDescriptor],
    by_name: &HashMap<String, usize>,
) -> Result<Option<usize>, SchemaError> {
    let Some(field) = field else {
        return Ok(None);
    };
    let slot = by_name
        .get(field)
        .copied()
        .filter(|&slot| match &fields[slot].kind {
            FieldKind::Scalar(kind) => *kind == ScalarKind::String,
            FieldKind::Defined(def) => def.scalar == ScalarKind::String,
            _ => false,
        });
    slot.map(Some).ok_or_else(|| SchemaError::InvalidKeyField {
        type_name: type_name.to_string(),
        field: field.to_string(),
    })
}

/// Connect every inverse field to the direct field it mirrors, in both directions.
fn link_inverses(
    types: &mut [EntityType],
    chains: &[Vec<usize>],
    bases: &[usize],
) -> Result<(), SchemaError> {
    let mut links = Vec::new();
    for (owner, ty) in types.iter().enumerate() {
        for (j, field) in ty.own_fields.iter().enumerate() {
            let (FieldKind::Inverse { via, .. }, Some(source)) = (&field.kind, field.target) else {
                continue;
            };
            let mismatch = |reason: String| SchemaError::InverseMismatch {
                type_name: ty.name.clone(),
                field: field.name.clone(),
                reason,
            };
            let source = source.index();

            // The type along the source's ancestry that declares `via`.
            let (declaring, via_index) = chains[source]
                .iter()
                .find_map(|&t| {
                    types[t]
                        .own_fields
                        .iter()
                        .position(|f| &f.name == via)
                        .map(|k| (t, k))
                })
                .ok_or_else(|| mismatch(format!("{} has no field '{via}'", types[source].name)))?;

            let via_field = &types[declaring].own_fields[via_index];
            let points_back = match (&via_field.kind, via_field.target) {
                (FieldKind::Entity(_) | FieldKind::EntityList(_), Some(target)) => {
                    chains[owner].contains(&target.index())
                }
                _ => false,
            };
            if !points_back {
                return Err(mismatch(format!(
                    "{}.{via} does not refer to {}",
                    types[declaring].name, ty.name
                )));
            }
            links.push((owner, j, declaring, via_index, source));
        }
    }

    for (owner, j, declaring, via_index, source) in links {
        let via_field = &mut types[declaring].own_fields[via_index];
        if via_field.counterpart.is_some() {
            let via_name = via_field.name.clone();
            return Err(SchemaError::InverseMismatch {
                type_name: types[owner].name.clone(),
                field: types[owner].own_fields[j].name.clone(),
                reason: format!("{}.{via_name} already has an inverse", types[declaring].name),
            });
        }
        via_field.counterpart = Some(Counterpart {
            owner: TypeKey::new(owner),
            slot: bases[owner] + j,
        });
        types[owner].own_fields[j].counterpart = Some(Counterpart {
            owner: TypeKey::new(source),
            slot: bases[declaring] + via_index,
        });
    }
    Ok(())
}
