//! Identity store for the two-pass writer.
//!
//! The discovery pass marks every entity it visits and, when it sees an entity a second
//! time, allocates a wire identifier for it. The write pass then reuses those
//! identifiers: only entities that discovery found more than once get an `id`, and every
//! later sighting becomes a reference.

use std::collections::{HashMap, HashSet};

use docgraph_model::EntityId;

/// Per-session bookkeeping of wire identifiers.
#[derive(Debug, Default)]
pub struct IdentityStore {
    prefer_natural_keys: bool,
    next_id: u64,
    ids: HashMap<EntityId, String>,
    used: HashSet<String>,
    encountered: HashSet<EntityId>,
    referenced: HashSet<EntityId>,
}

impl IdentityStore {
    pub fn new(prefer_natural_keys: bool) -> Self {
        Self {
            prefer_natural_keys,
            ..Self::default()
        }
    }

    /// Whether the entity was written in the current pass.
    pub fn is_encountered(&self, entity: EntityId) -> bool {
        self.encountered.contains(&entity)
    }

    /// Identifier of an entity written in the current pass, if it has one.
    pub fn encountered_id(&self, entity: EntityId) -> Option<&str> {
        if self.is_encountered(entity) {
            self.ids.get(&entity).map(String::as_str)
        } else {
            None
        }
    }

    /// Record the entity as written and make sure it has an identifier.
    pub fn mark_encountered(&mut self, entity: EntityId, natural_key: Option<&str>) -> String {
        self.encountered.insert(entity);
        self.assign(entity, natural_key)
    }

    /// Record the entity as written without giving it an identifier.
    pub(crate) fn mark_seen(&mut self, entity: EntityId) {
        self.encountered.insert(entity);
    }

    /// Identifier to use for a reference or an `id` attribute.
    ///
    /// During discovery this is called for repeat sightings: it allocates (once) and
    /// remembers that the entity needs an identifier. During the write pass it returns
    /// the identifier allocated by discovery, or `None` for entities seen only once.
    pub fn identify_for_reference(
        &mut self,
        entity: EntityId,
        discovery: bool,
        natural_key: Option<&str>,
    ) -> Option<String> {
        if discovery {
            self.referenced.insert(entity);
            Some(self.assign(entity, natural_key))
        } else if self.referenced.contains(&entity) {
            self.ids.get(&entity).cloned()
        } else {
            None
        }
    }

    /// Whether discovery saw the entity more than once.
    pub fn is_referenced(&self, entity: EntityId) -> bool {
        self.referenced.contains(&entity)
    }

    /// Forget which entities were written; identifiers stay assigned.
    pub fn clear_encountered(&mut self) {
        self.encountered.clear();
    }

    fn assign(&mut self, entity: EntityId, natural_key: Option<&str>) -> String {
        if let Some(id) = self.ids.get(&entity) {
            return id.clone();
        }
        let natural = natural_key
            .filter(|_| self.prefer_natural_keys)
            .filter(|key| !key.is_empty())
            .map(wire_key)
            .filter(|key| !self.used.contains(key));
        let id = match natural {
            Some(id) => id,
            None => loop {
                self.next_id += 1;
                let candidate = format!("i{}", self.next_id);
                if !self.used.contains(&candidate) {
                    break candidate;
                }
            },
        };
        self.used.insert(id.clone());
        self.ids.insert(entity, id.clone());
        id
    }
}

/// Make a natural key usable as an XML identifier.
fn wire_key(key: &str) -> String {
    let key: String = key
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if key.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        format!("x{key}")
    } else {
        key
    }
}
