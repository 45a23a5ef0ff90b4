//! Structured record model.
//!
//! Unlike `serde_json::Value`, the model keeps fixed-precision decimals,
//! timestamps and opaque identifiers apart from plain strings and floats, so
//! the encoder can give each its own deterministic textual form.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::canonicalizer::CanonicalizationError;
use crate::decimal::Decimal;

/// Insertion-ordered mapping. Ordering carries no meaning for hashing.
pub type Map = IndexMap<String, Value>;

/// A single value inside a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent/null value.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Exact integer.
    Integer(i128),
    /// Binary floating-point number.
    Float(f64),
    /// Fixed-precision decimal in exact textual form.
    Decimal(Decimal),
    /// Point in time, always UTC.
    Timestamp(DateTime<Utc>),
    /// Opaque identifier.
    Id(Uuid),
    /// UTF-8 text.
    String(String),
    /// Ordered sequence.
    Seq(Vec<Value>),
    /// Nested mapping.
    Map(Map),
}

impl Value {
    /// Short name of the value kind, used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Timestamp(_) => "timestamp",
            Value::Id(_) => "id",
            Value::String(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "map",
        }
    }

    /// Returns the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested mapping, if this is a map.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the elements, if this is a sequence.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view over integers, floats and decimals.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }

    /// True for null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for null, empty strings, empty sequences and empty maps.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Seq(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Follows a chain of map keys.
    pub fn lookup<'a, I>(&self, keys: I) -> Option<&Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self;
        for key in keys {
            current = current.as_map()?.get(key)?;
        }
        Some(current)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i as i128)
                } else if let Some(u) = n.as_u64() {
                    Value::Integer(u as i128)
                } else {
                    // serde_json numbers are always one of the three.
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

value_from!(
    bool => Bool,
    i32 => Integer as i128,
    i64 => Integer as i128,
    u32 => Integer as i128,
    u64 => Integer as i128,
    f64 => Float,
    Decimal => Decimal,
    DateTime<Utc> => Timestamp,
    Uuid => Id,
    String => String,
    Vec<Value> => Seq,
    Map => Map,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A record: the top-level mapping handed to the core.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Map);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Converts a JSON document; anything but an object is rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CanonicalizationError> {
        match Value::from(value) {
            Value::Map(map) => Ok(Self(map)),
            other => Err(CanonicalizationError::NotAMapping(other.kind())),
        }
    }

    /// Converts any serializable type through its JSON representation.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, CanonicalizationError> {
        let json = serde_json::to_value(value)
            .map_err(|e| CanonicalizationError::Unrepresentable(e.to_string()))?;
        Self::from_json(json)
    }

    /// Returns a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Resolves a dotted path such as `audit_data.reputation_index.R_d`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut keys = path.split('.');
        let first = keys.next()?;
        self.0.get(first)?.lookup(keys)
    }

    /// Inserts or replaces a top-level field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a top-level field, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates top-level fields in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &Map {
        &self.0
    }

    /// Wraps the record as a map value.
    pub fn into_value(self) -> Value {
        Value::Map(self.0)
    }
}

impl From<Map> for Record {
    fn from(map: Map) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
