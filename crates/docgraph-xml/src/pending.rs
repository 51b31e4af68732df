//! Deferred assignments for references that appear before their target.
//!
//! A reader that meets `href="x"` before the element declaring `id="x"` parks the
//! assignment here. When the identifier is registered the queue replays every parked
//! assignment in the order it was enqueued.
//!
//! Collection members keep their document order: each member token reserves a slot
//! through a [`CollectionCursor`], and a member that resolves late is inserted at the
//! position its token had, not at the end.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use docgraph_model::{EntityId, FieldKind, Graph, ModelError, Value};

/// One parked assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAssignment {
    /// Entity whose field receives the reference.
    pub target: EntityId,
    /// Field slot on `target`.
    pub slot: usize,
    /// Document-order token for collection members.
    pub token: Option<usize>,
}

/// Slot bookkeeping for one collection being read.
#[derive(Debug, Default, Clone)]
struct CollectionCursor {
    issued: usize,
    gaps: BTreeSet<usize>,
}

impl CollectionCursor {
    fn reserve(&mut self) -> usize {
        let token = self.issued;
        self.issued += 1;
        token
    }

    /// List position of a token, given that all gaps are absent from the list.
    fn position(&self, token: usize) -> usize {
        token - self.gaps.range(..token).count()
    }
}

/// Identifier-keyed queue of parked assignments.
#[derive(Debug, Default)]
pub struct ForwardReferenceQueue {
    pending: BTreeMap<String, Vec<PendingAssignment>>,
    cursors: HashMap<(EntityId, usize), CollectionCursor>,
}

impl ForwardReferenceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next document-order token of a collection.
    pub fn reserve(&mut self, owner: EntityId, slot: usize) -> usize {
        self.cursors.entry((owner, slot)).or_default().reserve()
    }

    /// Current insert position of a reserved token.
    pub fn position(&self, owner: EntityId, slot: usize, token: usize) -> usize {
        self.cursors
            .get(&(owner, slot))
            .map_or(token, |cursor| cursor.position(token))
    }

    /// Mark a reserved token as not (yet) present in the collection.
    pub fn leave_gap(&mut self, owner: EntityId, slot: usize, token: usize) {
        self.cursors
            .entry((owner, slot))
            .or_default()
            .gaps
            .insert(token);
    }

    /// Park an assignment until `id` is registered.
    pub fn enqueue(&mut self, id: &str, target: EntityId, slot: usize, token: Option<usize>) {
        tracing::debug!(id, %target, slot, "deferring forward reference");
        if let Some(token) = token {
            self.leave_gap(target, slot, token);
        }
        self.pending
            .entry(id.to_string())
            .or_default()
            .push(PendingAssignment {
                target,
                slot,
                token,
            });
    }

    /// Replay every assignment waiting on `id`.
    ///
    /// Assignments the schema rejects are reported through `on_mismatch`; returning an
    /// error from it stops the replay.
    pub fn resolve<F>(
        &mut self,
        id: &str,
        entity: EntityId,
        graph: &mut Graph,
        mut on_mismatch: F,
    ) -> Result<usize, ModelError>
    where
        F: FnMut(ModelError) -> Result<(), ModelError>,
    {
        let Some(waiting) = self.pending.remove(id) else {
            return Ok(0);
        };
        tracing::debug!(id, count = waiting.len(), "resolving forward references");
        let count = waiting.len();
        for assignment in waiting {
            let position = assignment.token.map(|token| {
                let cursor = self
                    .cursors
                    .entry((assignment.target, assignment.slot))
                    .or_default();
                cursor.gaps.remove(&token);
                cursor.position(token)
            });
            if let Err(err) = apply_assignment(graph, assignment.target, assignment.slot, entity, position) {
                if let Some(token) = assignment.token {
                    self.leave_gap(assignment.target, assignment.slot, token);
                }
                on_mismatch(err)?;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of distinct identifiers still awaited.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Identifiers still awaited, with their parked assignments.
    pub fn unresolved(&self) -> impl Iterator<Item = (&str, &[PendingAssignment])> {
        self.pending
            .iter()
            .map(|(id, waiting)| (id.as_str(), waiting.as_slice()))
    }

    /// Drop every parked assignment; the tokens stay gaps.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Assign `entity` to a field of `owner`.
///
/// A collection field receives it at `position` (or at the end). An inverse field
/// cannot be assigned directly: the direct field it is derived from is set on `entity`
/// instead, and inverse synchronization produces the membership.
pub fn apply_assignment(
    graph: &mut Graph,
    owner: EntityId,
    slot: usize,
    entity: EntityId,
    position: Option<usize>,
) -> Result<(), ModelError> {
    let schema = std::sync::Arc::clone(graph.schema());
    let descriptor = schema
        .entity_type(graph.type_of(owner))
        .field_at(slot)
        .ok_or_else(|| ModelError::unknown_field(graph.type_name(owner), format!("#{slot}")))?;

    match &descriptor.kind {
        FieldKind::EntityList(_) => {
            graph.insert_at(owner, slot, position.unwrap_or(usize::MAX), entity)
        }
        FieldKind::Entity(_) => graph.set_at(owner, slot, Value::Entity(entity)),
        FieldKind::Inverse { source, .. } => {
            let Some(counterpart) = descriptor.counterpart() else {
                return Err(ModelError::InverseNotSettable {
                    type_name: graph.type_name(owner).to_string(),
                    field: descriptor.name.clone(),
                });
            };
            if !schema.is_subtype(graph.type_of(entity), counterpart.owner) {
                return Err(ModelError::TypeMismatch {
                    type_name: graph.type_name(owner).to_string(),
                    field: descriptor.name.clone(),
                    expected: source.clone(),
                    found: graph.type_name(entity).to_string(),
                });
            }
            let via = counterpart.slot;
            match graph.field(entity, via).map(|f| &f.kind) {
                Some(FieldKind::EntityList(_)) if graph.members_at(entity, via).contains(&owner) => {
                    Ok(())
                }
                Some(FieldKind::EntityList(_)) => graph.insert_at(entity, via, usize::MAX, owner),
                _ => graph.set_at(entity, via, Value::Entity(owner)),
            }
        }
        other => Err(ModelError::ShapeMismatch {
            type_name: graph.type_name(owner).to_string(),
            field: descriptor.name.clone(),
            expected: other.expected_shape(),
            found: "entity reference",
        }),
    }
}
