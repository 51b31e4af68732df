//! Field values stored in graph entities.

use chrono::NaiveDateTime;

use crate::graph::EntityId;
use crate::schema::ScalarKind;

/// A single primitive value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
    Timestamp(NaiveDateTime),
    Binary(Vec<u8>),
}

impl Scalar {
    /// The primitive kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ScalarKind {
        match self {
            Self::Integer(_) => ScalarKind::Integer,
            Self::Real(_) => ScalarKind::Real,
            Self::Boolean(_) => ScalarKind::Boolean,
            Self::String(_) => ScalarKind::String,
            Self::Timestamp(_) => ScalarKind::Timestamp,
            Self::Binary(_) => ScalarKind::Binary,
        }
    }

    /// Get the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Bitwise equality: treats NaN as equal to itself.
    pub(crate) fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits() || a == b,
            _ => self == other,
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<NaiveDateTime> for Scalar {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

/// The value held by one field slot of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Scalar or defined-wrapper value.
    Scalar(Scalar),
    /// Enumeration symbol, in the schema's spelling.
    Enum(String),
    /// A defined value tagged with the defined type it was chosen as.
    Selected { type_name: String, value: Scalar },
    /// Reference to another entity.
    Entity(EntityId),
    List(Vec<Scalar>),
    Matrix(Vec<Vec<Scalar>>),
    /// Ordered entity collection (direct or inverse).
    Entities(Vec<EntityId>),
}

impl Value {
    /// Short name of the value's shape, for error messages.
    #[must_use]
    pub const fn shape_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Enum(_) => "enumeration",
            Self::Selected { .. } => "selected value",
            Self::Entity(_) => "entity reference",
            Self::List(_) => "scalar list",
            Self::Matrix(_) => "scalar matrix",
            Self::Entities(_) => "entity collection",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Self::Entity(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_entities(&self) -> Option<&[EntityId]> {
        match self {
            Self::Entities(ids) => Some(ids),
            _ => None,
        }
    }

    /// Whether this is a collection with no members.
    #[must_use]
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Matrix(rows) => rows.is_empty(),
            Self::Entities(ids) => ids.is_empty(),
            _ => false,
        }
    }

    /// Entities referenced directly by this value.
    pub fn referenced_entities(&self) -> &[EntityId] {
        match self {
            Self::Entity(id) => std::slice::from_ref(id),
            Self::Entities(ids) => ids,
            _ => &[],
        }
    }
}

macro_rules! scalar_value_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Self::Scalar(Scalar::from(v))
            }
        })*
    };
}

scalar_value_from!(i64, i32, f64, bool, &str, String, NaiveDateTime, Vec<u8>);

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Self::Scalar(v)
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl From<Vec<EntityId>> for Value {
    fn from(ids: Vec<EntityId>) -> Self {
        Self::Entities(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_kind() {
        assert_eq!(Scalar::from(3).kind(), ScalarKind::Integer);
        assert_eq!(Scalar::from("x").kind(), ScalarKind::String);
        assert_eq!(Scalar::from(vec![1u8]).kind(), ScalarKind::Binary);
    }

    #[test]
    fn test_nan_same() {
        let a = Scalar::Real(f64::NAN);
        assert!(a.same(&a.clone()));
        assert!(!Scalar::Real(1.0).same(&Scalar::Real(2.0)));
    }

    #[test]
    fn test_empty_collection() {
        assert!(Value::Entities(vec![]).is_empty_collection());
        assert!(!Value::from("text").is_empty_collection());
    }
}
