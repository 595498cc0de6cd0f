//! Core value types carried by graph events.
//!
//! Identifiers and attribute maps are the only data a streaming client
//! handles; it keeps no graph state of its own.

use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::error::{Result, StreamError};
use crate::finite;

// ── Identifiers ───────────────────────────────────────────────────

/// Identifier of a node or edge, either textual or numeric.
///
/// Ids become JSON object keys on the wire, so numeric ids are rendered
/// the way JSON writes them: integers of either sign up to 64 bits, or
/// finite floats (`1.5`, `2.0`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ElementId {
    Text(String),
    Number(Number),
}

impl ElementId {
    /// The id as it appears as a key in an envelope.
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ElementId {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

macro_rules! integer_ids {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ElementId {
                fn from(value: $ty) -> Self {
                    Self::Number(value.into())
                }
            }
        )*
    };
}

integer_ids!(i32, i64, u32, u64, usize);

impl From<Number> for ElementId {
    fn from(value: Number) -> Self {
        Self::Number(value)
    }
}

impl TryFrom<f64> for ElementId {
    type Error = StreamError;

    /// Float ids must be finite; NaN and infinity have no JSON form.
    fn try_from(value: f64) -> Result<Self> {
        Number::from_f64(value)
            .map(Self::Number)
            .ok_or_else(|| StreamError::NonFiniteNumber {
                key: "id".to_string(),
                value,
            })
    }
}

impl From<ElementId> for Value {
    fn from(value: ElementId) -> Self {
        match value {
            ElementId::Text(s) => Value::String(s),
            ElementId::Number(n) => Value::Number(n),
        }
    }
}

// ── Attribute values ──────────────────────────────────────────────

/// A float JSON cannot represent: NaN or an infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonFinite(pub f64);

/// Conversion of a Rust value into an attribute value.
///
/// Floats are the only fallible case. Everything else maps onto JSON
/// exactly as `serde_json::Value::from` does.
pub trait IntoAttributeValue {
    fn into_attribute_value(self) -> std::result::Result<Value, NonFinite>;
}

macro_rules! exact_attribute_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoAttributeValue for $ty {
                fn into_attribute_value(self) -> std::result::Result<Value, NonFinite> {
                    Ok(Value::from(self))
                }
            }
        )*
    };
}

exact_attribute_values!(
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    &str,
    String,
    Value,
    Map<String, Value>,
    ElementId,
);

impl IntoAttributeValue for f64 {
    fn into_attribute_value(self) -> std::result::Result<Value, NonFinite> {
        Number::from_f64(self)
            .map(Value::Number)
            .ok_or(NonFinite(self))
    }
}

impl IntoAttributeValue for f32 {
    fn into_attribute_value(self) -> std::result::Result<Value, NonFinite> {
        f64::from(self).into_attribute_value()
    }
}

impl<T: IntoAttributeValue> IntoAttributeValue for Option<T> {
    fn into_attribute_value(self) -> std::result::Result<Value, NonFinite> {
        match self {
            Some(value) => value.into_attribute_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: IntoAttributeValue> IntoAttributeValue for Vec<T> {
    fn into_attribute_value(self) -> std::result::Result<Value, NonFinite> {
        self.into_iter()
            .map(T::into_attribute_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

impl IntoAttributeValue for Attributes {
    fn into_attribute_value(self) -> std::result::Result<Value, NonFinite> {
        match self.rejected.first() {
            Some((_, value)) => Err(NonFinite(*value)),
            None => Ok(Value::Object(self.map)),
        }
    }
}

// ── Attributes ────────────────────────────────────────────────────

/// Ordered mapping of attribute names to arbitrary JSON values.
///
/// Anything JSON can represent (scalars, lists, nested objects) is passed
/// through unchanged. A NaN or infinite float cannot be represented: the
/// builder methods record the offending key instead of storing a value,
/// and [`check`](Self::check), serialization and event encoding fail on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    map: Map<String, Value>,
    rejected: Vec<(String, f64)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl IntoAttributeValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the previous one for that key.
    ///
    /// Replacing an existing key keeps its original position. A non-finite
    /// float removes the key and is reported by [`check`](Self::check).
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl IntoAttributeValue,
    ) -> Option<Value> {
        let key = key.into();
        self.rejected.retain(|(k, _)| *k != key);
        match value.into_attribute_value() {
            Ok(value) => self.map.insert(key, value),
            Err(NonFinite(value)) => {
                let previous = self.map.shift_remove(&key);
                self.rejected.push((key, value));
                previous
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.rejected.retain(|(k, _)| k != key);
        self.map.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.map.iter()
    }

    /// Fails on the first inserted value that JSON cannot represent.
    pub fn check(&self) -> Result<()> {
        match self.rejected.first() {
            Some((key, value)) => Err(StreamError::NonFiniteNumber {
                key: key.clone(),
                value: *value,
            }),
            None => Ok(()),
        }
    }

    /// Convert any serializable value (usually a struct or map) into attributes.
    ///
    /// NaN and infinite floats anywhere in `value` are an error rather
    /// than becoming `null`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        finite::check(value)?;
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self::from(map)),
            other => Err(StreamError::InvalidAttributes(json_kind(&other).to_string())),
        }
    }

    /// The stored values. Rejected keys are not part of the map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    /// Like [`as_map`](Self::as_map), failing instead when a value was rejected.
    pub fn try_into_map(self) -> Result<Map<String, Value>> {
        self.check()?;
        Ok(self.map)
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if let Some((key, value)) = self.rejected.first() {
            return Err(S::Error::custom(format_args!(
                "attribute {key:?} is {value}, which JSON cannot represent"
            )));
        }
        self.map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from)
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            map,
            rejected: Vec::new(),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: IntoAttributeValue,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (key, value) in iter {
            attrs.insert(key, value);
        }
        attrs
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
