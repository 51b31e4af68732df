//! Arena-owned object graph.
//!
//! Every entity of a session lives in one [`Graph`]; references between entities are
//! [`EntityId`] handles into it, so cyclic and shared structures need no reference
//! counting. Assigning a direct field that has an inverse counterpart keeps the
//! counterpart collection on the target in step.

use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, Result};
use crate::schema::{FieldDescriptor, FieldKind, Schema, TypeKey};
use crate::value::Value;

/// Handle of an entity within its [`Graph`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns the raw arena index.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One entity: its type and one optional value per flattened field.
#[derive(Debug, Clone)]
pub struct Entity {
    type_key: TypeKey,
    slots: Vec<Option<Value>>,
}

impl Entity {
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Value at a field slot.
    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Populated slots in field order.
    pub fn values(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }
}

/// All entities of one session.
#[derive(Debug, Clone)]
pub struct Graph {
    schema: Arc<Schema>,
    entities: Vec<Entity>,
    root: Option<EntityId>,
}

impl Graph {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            entities: Vec::new(),
            root: None,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entity handles in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.entities.len()).map(EntityId::new)
    }

    /// Allocate an entity of the named type.
    pub fn create(&mut self, type_name: &str) -> Result<EntityId> {
        let key = self
            .schema
            .type_key(type_name)
            .ok_or_else(|| ModelError::UnknownType {
                name: type_name.to_string(),
            })?;
        Ok(self.allocate(key))
    }

    /// Allocate an uninitialized entity: every field unset except collections,
    /// which start out empty.
    pub fn allocate(&mut self, type_key: TypeKey) -> EntityId {
        let slots = self
            .schema
            .entity_type(type_key)
            .fields()
            .iter()
            .map(|f| f.kind.empty_value())
            .collect();
        let id = EntityId::new(self.entities.len());
        self.entities.push(Entity { type_key, slots });
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())
    }

    /// # Panics
    ///
    /// Panics if `id` was not allocated by this graph.
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    pub fn type_of(&self, id: EntityId) -> TypeKey {
        self.entity(id).type_key
    }

    pub fn type_name(&self, id: EntityId) -> &str {
        self.schema.type_name(self.type_of(id))
    }

    pub fn root(&self) -> Option<EntityId> {
        self.root
    }

    /// Make `id` the root; it must be an instance of the schema's root type.
    pub fn set_root(&mut self, id: EntityId) -> Result<()> {
        self.check_id(id)?;
        let root_type = self.schema.root_type();
        if !self.schema.is_subtype(self.type_of(id), root_type) {
            return Err(ModelError::InvalidRoot {
                type_name: self.type_name(id).to_string(),
                expected: self.schema.type_name(root_type).to_string(),
            });
        }
        self.root = Some(id);
        Ok(())
    }

    /// Slot of a field by name on the entity's type.
    pub fn slot_of(&self, id: EntityId, field: &str) -> Result<usize> {
        self.check_id(id)?;
        self.schema
            .entity_type(self.type_of(id))
            .slot(field)
            .ok_or_else(|| ModelError::unknown_field(self.type_name(id), field))
    }

    pub fn field(&self, id: EntityId, slot: usize) -> Option<&FieldDescriptor> {
        self.schema.entity_type(self.type_of(id)).field_at(slot)
    }

    pub fn value(&self, id: EntityId, field: &str) -> Option<&Value> {
        let slot = self.slot_of(id, field).ok()?;
        self.value_at(id, slot)
    }

    pub fn value_at(&self, id: EntityId, slot: usize) -> Option<&Value> {
        self.get(id).and_then(|e| e.get(slot))
    }

    /// String content of a scalar field.
    pub fn text(&self, id: EntityId, field: &str) -> Option<&str> {
        self.value(id, field).and_then(Value::as_str)
    }

    /// Target of a single entity reference.
    pub fn reference(&self, id: EntityId, field: &str) -> Option<EntityId> {
        self.value(id, field).and_then(Value::as_entity)
    }

    /// Members of an entity collection (direct or inverse).
    pub fn members(&self, id: EntityId, field: &str) -> &[EntityId] {
        self.value(id, field)
            .and_then(Value::as_entities)
            .unwrap_or(&[])
    }

    pub fn members_at(&self, id: EntityId, slot: usize) -> &[EntityId] {
        self.value_at(id, slot)
            .and_then(Value::as_entities)
            .unwrap_or(&[])
    }

    /// The entity's natural unique identifier, if its type declares one and it is set.
    pub fn natural_key(&self, id: EntityId) -> Option<&str> {
        let slot = self.schema.entity_type(self.type_of(id)).key_slot()?;
        self.value_at(id, slot).and_then(Value::as_str)
    }

    /// The entity's human-readable name, if its type declares one and it is set.
    pub fn display_name(&self, id: EntityId) -> Option<&str> {
        let slot = self.schema.entity_type(self.type_of(id)).name_slot()?;
        self.value_at(id, slot).and_then(Value::as_str)
    }

    pub fn set(&mut self, id: EntityId, field: &str, value: impl Into<Value>) -> Result<()> {
        let slot = self.slot_of(id, field)?;
        self.set_at(id, slot, value.into())
    }

    /// Assign a field, replacing any previous value and updating inverse fields.
    pub fn set_at(&mut self, id: EntityId, slot: usize, value: Value) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let descriptor = self.descriptor(&schema, id, slot)?;
        if descriptor.kind.is_inverse() {
            return Err(ModelError::InverseNotSettable {
                type_name: self.type_name(id).to_string(),
                field: descriptor.name.clone(),
            });
        }
        if !descriptor.kind.accepts(&value) {
            return Err(ModelError::ShapeMismatch {
                type_name: self.type_name(id).to_string(),
                field: descriptor.name.clone(),
                expected: descriptor.kind.expected_shape(),
                found: value.shape_name(),
            });
        }
        for &target in value.referenced_entities() {
            self.check_target(id, descriptor, target)?;
        }

        let previous = self.entities[id.index()].slots[slot].replace(value);
        if let Some(previous) = previous {
            for &old in previous.referenced_entities() {
                self.unlink(id, slot, old);
            }
        }
        let current: Vec<EntityId> = self
            .value_at(id, slot)
            .map(|v| v.referenced_entities().to_vec())
            .unwrap_or_default();
        for target in current {
            self.link(id, slot, target);
        }
        Ok(())
    }

    /// Unset a field; collections become empty.
    pub fn clear(&mut self, id: EntityId, field: &str) -> Result<()> {
        let slot = self.slot_of(id, field)?;
        let schema = Arc::clone(&self.schema);
        let descriptor = self.descriptor(&schema, id, slot)?;
        match descriptor.kind.empty_value() {
            Some(empty) => self.set_at(id, slot, empty),
            None => {
                if descriptor.kind.is_inverse() {
                    return Err(ModelError::InverseNotSettable {
                        type_name: self.type_name(id).to_string(),
                        field: descriptor.name.clone(),
                    });
                }
                if let Some(previous) = self.entities[id.index()].slots[slot].take() {
                    for &old in previous.referenced_entities() {
                        self.unlink(id, slot, old);
                    }
                }
                Ok(())
            }
        }
    }

    /// Append to an entity collection.
    pub fn push(&mut self, id: EntityId, field: &str, member: EntityId) -> Result<()> {
        let slot = self.slot_of(id, field)?;
        self.insert_at(id, slot, usize::MAX, member)
    }

    /// Insert into an entity collection; positions past the end append.
    pub fn insert_at(
        &mut self,
        id: EntityId,
        slot: usize,
        position: usize,
        member: EntityId,
    ) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let descriptor = self.descriptor(&schema, id, slot)?;
        if !matches!(descriptor.kind, FieldKind::EntityList(_)) {
            return Err(ModelError::NotACollection {
                type_name: self.type_name(id).to_string(),
                field: descriptor.name.clone(),
            });
        }
        self.check_target(id, descriptor, member)?;

        let Some(list) = self.entity_list_mut(id, slot) else {
            return Err(ModelError::NotACollection {
                type_name: self.type_name(id).to_string(),
                field: descriptor.name.clone(),
            });
        };
        let position = position.min(list.len());
        list.insert(position, member);
        self.link(id, slot, member);
        Ok(())
    }

    /// Remove the first occurrence of `member` from an entity collection.
    pub fn remove_member(&mut self, id: EntityId, field: &str, member: EntityId) -> Result<bool> {
        let slot = self.slot_of(id, field)?;
        let schema = Arc::clone(&self.schema);
        let descriptor = self.descriptor(&schema, id, slot)?;
        if !matches!(descriptor.kind, FieldKind::EntityList(_)) {
            return Err(ModelError::NotACollection {
                type_name: self.type_name(id).to_string(),
                field: descriptor.name.clone(),
            });
        }
        let Some(list) = self.entity_list_mut(id, slot) else {
            return Ok(false);
        };
        let Some(pos) = list.iter().position(|&m| m == member) else {
            return Ok(false);
        };
        list.remove(pos);
        self.unlink(id, slot, member);
        Ok(true)
    }

    fn check_id(&self, id: EntityId) -> Result<()> {
        if id.index() < self.entities.len() {
            Ok(())
        } else {
            Err(ModelError::UnknownEntity { id: id.to_string() })
        }
    }

    fn descriptor<'s>(
        &self,
        schema: &'s Schema,
        id: EntityId,
        slot: usize,
    ) -> Result<&'s FieldDescriptor> {
        self.check_id(id)?;
        schema
            .entity_type(self.type_of(id))
            .field_at(slot)
            .ok_or_else(|| ModelError::unknown_field(self.type_name(id), format!("#{slot}")))
    }

    fn check_target(&self, id: EntityId, descriptor: &FieldDescriptor, target: EntityId) -> Result<()> {
        self.check_id(target)?;
        let Some(expected) = descriptor.target() else {
            return Ok(());
        };
        if self.schema.is_subtype(self.type_of(target), expected) {
            Ok(())
        } else {
            Err(ModelError::TypeMismatch {
                type_name: self.type_name(id).to_string(),
                field: descriptor.name.clone(),
                expected: self.schema.type_name(expected).to_string(),
                found: self.type_name(target).to_string(),
            })
        }
    }

    fn entity_list_mut(&mut self, id: EntityId, slot: usize) -> Option<&mut Vec<EntityId>> {
        match self.entities.get_mut(id.index())?.slots.get_mut(slot)? {
            Some(Value::Entities(list)) => Some(list),
            _ => None,
        }
    }

    /// Whether `source.slot` currently refers to `target`.
    fn refers_to(&self, source: EntityId, slot: usize, target: EntityId) -> bool {
        self.value_at(source, slot)
            .is_some_and(|v| v.referenced_entities().contains(&target))
    }

    /// Record `source` in the inverse collection of `target`.
    fn link(&mut self, source: EntityId, slot: usize, target: EntityId) {
        let Some(cp) = self.field(source, slot).and_then(FieldDescriptor::counterpart) else {
            return;
        };
        if !self.schema.is_subtype(self.type_of(target), cp.owner) {
            return;
        }
        if let Some(list) = self.entity_list_mut(target, cp.slot) {
            if !list.contains(&source) {
                list.push(source);
            }
        }
    }

    /// Drop `source` from the inverse collection of `target` once nothing links them.
    fn unlink(&mut self, source: EntityId, slot: usize, target: EntityId) {
        let Some(cp) = self.field(source, slot).and_then(FieldDescriptor::counterpart) else {
            return;
        };
        if self.refers_to(source, slot, target)
            || !self.schema.is_subtype(self.type_of(target), cp.owner)
        {
            return;
        }
        if let Some(list) = self.entity_list_mut(target, cp.slot) {
            list.retain(|&m| m != source);
        }
    }
}
