//! Statement values: parameters, literals, sharding keys.

use std::cmp::Ordering;
use std::fmt::Display;

use uuid::Uuid;

use crate::util::escape_literal;

/// A resolved SQL value.
///
/// This is what the binder hands us for positional parameters and
/// what predicate literals resolve to. Only types that can carry a
/// sharding key get a variant; everything else arrives as `Null`
/// from the extractor's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Text(String),
    Uuid(Uuid),
    Null,
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(int) => Some(*int),
            Value::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(uuid) => Some(*uuid),
            _ => None,
        }
    }

    /// Bytes fed to hashing algorithms.
    pub fn hash_bytes(&self) -> Vec<u8> {
        match self {
            Value::Int(int) => int.to_be_bytes().to_vec(),
            Value::Text(text) => text.as_bytes().to_vec(),
            Value::Uuid(uuid) => uuid.as_bytes().to_vec(),
            Value::Null => vec![],
        }
    }
}

/// Comparison is defined within a variant only. Mixed-type bounds
/// are the extractor's cue to degrade, not to guess.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(int) => write!(f, "{}", int),
            Value::Text(text) => write!(f, "'{}'", escape_literal(text)),
            Value::Uuid(uuid) => write!(f, "'{}'", uuid),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}
