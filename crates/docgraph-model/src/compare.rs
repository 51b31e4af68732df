//! Structural comparison of two graphs.
//!
//! Two graphs are equivalent when their roots can be paired up field by field:
//! equal scalars, equal types, and entity references that map one-to-one. Entity
//! handles themselves never matter, and inverse collections are compared as multisets
//! since their order depends on the order assignments happened in.

use std::collections::{HashMap, VecDeque};

use crate::graph::{EntityId, Graph};
use crate::value::Value;

impl Graph {
    /// Whether `other` holds the same object structure as `self`.
    pub fn equivalent(&self, other: &Graph) -> bool {
        self.difference(other).is_none()
    }

    /// Describe the first structural difference found, if any.
    pub fn difference(&self, other: &Graph) -> Option<String> {
        match (self.root(), other.root()) {
            (None, None) => None,
            (Some(a), Some(b)) => Pairing::new(self, other).run(a, b).err(),
            (Some(_), None) => Some("right graph has no root".to_string()),
            (None, Some(_)) => Some("left graph has no root".to_string()),
        }
    }
}

struct Pairing<'a> {
    left: &'a Graph,
    right: &'a Graph,
    forward: HashMap<EntityId, EntityId>,
    backward: HashMap<EntityId, EntityId>,
    queue: VecDeque<(EntityId, EntityId)>,
    inverses: Vec<(EntityId, String, Vec<EntityId>, Vec<EntityId>)>,
}

impl<'a> Pairing<'a> {
    fn new(left: &'a Graph, right: &'a Graph) -> Self {
        Self {
            left,
            right,
            forward: HashMap::new(),
            backward: HashMap::new(),
            queue: VecDeque::new(),
            inverses: Vec::new(),
        }
    }

    fn run(mut self, a: EntityId, b: EntityId) -> Result<(), String> {
        self.pair(a, b)?;
        while let Some((a, b)) = self.queue.pop_front() {
            self.compare_entity(a, b)?;
        }
        for (owner, field, left, right) in std::mem::take(&mut self.inverses) {
            let mut mapped: Vec<EntityId> = left
                .iter()
                .map(|m| self.forward.get(m).copied().ok_or_else(|| {
                    format!("{owner}.{field}: member {m} is unreachable")
                }))
                .collect::<Result<_, _>>()?;
            let mut right = right;
            mapped.sort_unstable();
            right.sort_unstable();
            if mapped != right {
                return Err(format!("{owner}.{field}: inverse members differ"));
            }
        }
        Ok(())
    }

    fn pair(&mut self, a: EntityId, b: EntityId) -> Result<(), String> {
        match (self.forward.get(&a), self.backward.get(&b)) {
            (Some(&mapped), _) if mapped == b => Ok(()),
            (None, None) => {
                self.forward.insert(a, b);
                self.backward.insert(b, a);
                self.queue.push_back((a, b));
                Ok(())
            }
            _ => Err(format!("{a} and {b} are not the same object on both sides")),
        }
    }

    fn compare_entity(&mut self, a: EntityId, b: EntityId) -> Result<(), String> {
        let (left_graph, right_graph) = (self.left, self.right);
        let left_type = left_graph.type_name(a);
        if left_type != right_graph.type_name(b) {
            return Err(format!(
                "{a}: type {left_type} vs {}",
                right_graph.type_name(b)
            ));
        }
        let ty = left_graph.schema().entity_type(left_graph.type_of(a));
        let right_ty = right_graph.schema().entity_type(right_graph.type_of(b));

        for (slot, field) in ty.fields().iter().enumerate() {
            let Some(right_slot) = right_ty.slot(&field.name) else {
                return Err(format!("{left_type}.{} missing on right", field.name));
            };
            let left = left_graph.value_at(a, slot);
            let right = right_graph.value_at(b, right_slot);
            let context = || format!("{left_type} {a}.{}", field.name);

            if field.kind.is_inverse() {
                let left = left.and_then(Value::as_entities).unwrap_or(&[]).to_vec();
                let right = right.and_then(Value::as_entities).unwrap_or(&[]).to_vec();
                if left.len() != right.len() {
                    return Err(format!(
                        "{}: {} vs {} members",
                        context(),
                        left.len(),
                        right.len()
                    ));
                }
                // Pair members not reached any other way in their relative order.
                let fresh_left = left.iter().filter(|m| !self.forward.contains_key(*m));
                let fresh_right: Vec<_> = right
                    .iter()
                    .filter(|m| !self.backward.contains_key(*m))
                    .copied()
                    .collect();
                let fresh: Vec<_> = fresh_left.copied().zip(fresh_right).collect();
                for (x, y) in fresh {
                    self.pair(x, y)?;
                }
                self.inverses.push((a, field.name.clone(), left, right));
                continue;
            }

            match (left, right) {
                (None, None) => {}
                (Some(l), Some(r)) => self
                    .compare_value(l, r)
                    .map_err(|e| format!("{}: {e}", context()))?,
                (Some(_), None) => return Err(format!("{}: missing on right", context())),
                (None, Some(_)) => return Err(format!("{}: missing on left", context())),
            }
        }
        Ok(())
    }

    fn compare_value(&mut self, left: &Value, right: &Value) -> Result<(), String> {
        match (left, right) {
            (Value::Scalar(l), Value::Scalar(r)) if l.same(r) => Ok(()),
            (Value::List(l), Value::List(r))
                if l.len() == r.len() && l.iter().zip(r).all(|(x, y)| x.same(y)) =>
            {
                Ok(())
            }
            (Value::Matrix(l), Value::Matrix(r))
                if l.len() == r.len()
                    && l.iter().zip(r).all(|(lr, rr)| {
                        lr.len() == rr.len() && lr.iter().zip(rr).all(|(x, y)| x.same(y))
                    }) =>
            {
                Ok(())
            }
            (Value::Enum(l), Value::Enum(r)) if l == r => Ok(()),
            (
                Value::Selected {
                    type_name: lt,
                    value: lv,
                },
                Value::Selected {
                    type_name: rt,
                    value: rv,
                },
            ) if lt == rt && lv.same(rv) => Ok(()),
            (Value::Entity(l), Value::Entity(r)) => self.pair(*l, *r),
            (Value::Entities(l), Value::Entities(r)) if l.len() == r.len() => {
                l.iter().zip(r).try_for_each(|(x, y)| self.pair(*x, *y))
            }
            _ => Err(format!("{left:?} vs {right:?}")),
        }
    }
}
