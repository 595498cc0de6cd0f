//! Finiteness check over any `Serialize` value.
//!
//! `serde_json::to_value` turns NaN and infinity into `null`. Walking the
//! value with [`FiniteCheck`] first catches them before that happens.

use std::fmt;

use serde::ser::{self, Serialize};

use crate::error::StreamError;

/// Fail with [`StreamError::NonFiniteNumber`] if `value` holds a NaN or
/// infinite float anywhere. The key is the dotted path to the float.
///
/// Other serialization failures pass through untouched; `serde_json`
/// reports them when the value is actually converted.
pub(crate) fn check<T: Serialize + ?Sized>(value: &T) -> Result<(), StreamError> {
    match value.serialize(FiniteCheck) {
        Err(Rejection::NonFinite { mut path, value }) => {
            path.reverse();
            Err(StreamError::NonFiniteNumber {
                key: path.join("."),
                value,
            })
        }
        Ok(()) | Err(Rejection::Other(_)) => Ok(()),
    }
}

#[derive(Debug)]
enum Rejection {
    /// `path` is innermost segment first.
    NonFinite { path: Vec<String>, value: f64 },
    Other(String),
}

impl Rejection {
    fn at(self, segment: impl fmt::Display) -> Self {
        match self {
            Self::NonFinite { mut path, value } => {
                path.push(segment.to_string());
                Self::NonFinite { path, value }
            }
            other => other,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite { value, .. } => write!(f, "non-finite number {value}"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Rejection {}

impl ser::Error for Rejection {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Other(msg.to_string())
    }
}

// ── Serializer ────────────────────────────────────────────────────

struct FiniteCheck;

impl ser::Serializer for FiniteCheck {
    type Ok = ();
    type Error = Rejection;
    type SerializeSeq = Walk;
    type SerializeTuple = Walk;
    type SerializeTupleStruct = Walk;
    type SerializeTupleVariant = Walk;
    type SerializeMap = Walk;
    type SerializeStruct = Walk;
    type SerializeStructVariant = Walk;

    fn serialize_bool(self, _: bool) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_i8(self, _: i8) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_i16(self, _: i16) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_i32(self, _: i32) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_i64(self, _: i64) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_i128(self, _: i128) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_u8(self, _: u8) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_u16(self, _: u16) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_u32(self, _: u32) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_u64(self, _: u64) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_u128(self, _: u128) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), Rejection> {
        ser::Serializer::serialize_f64(self, f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), Rejection> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(Rejection::NonFinite {
                path: Vec::new(),
                value: v,
            })
        }
    }

    fn serialize_char(self, _: char) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_str(self, _: &str) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_none(self) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), Rejection> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<(), Rejection> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<(), Rejection> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), Rejection> {
        value.serialize(self).map_err(|e| e.at(variant))
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Walk, Rejection> {
        Ok(Walk::default())
    }

    fn serialize_tuple(self, _: usize) -> Result<Walk, Rejection> {
        Ok(Walk::default())
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Walk, Rejection> {
        Ok(Walk::default())
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Walk, Rejection> {
        Ok(Walk::within(variant))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Walk, Rejection> {
        Ok(Walk::default())
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Walk, Rejection> {
        Ok(Walk::default())
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Walk, Rejection> {
        Ok(Walk::within(variant))
    }
}

// ── Compound values ───────────────────────────────────────────────

/// Visits the members of a sequence, map or struct, tracking where the
/// current member sits so a rejection can name it.
#[derive(Default)]
struct Walk {
    index: usize,
    key: Option<String>,
    variant: Option<&'static str>,
}

impl Walk {
    fn within(variant: &'static str) -> Self {
        Self {
            variant: Some(variant),
            ..Self::default()
        }
    }

    fn element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejection> {
        let index = self.index;
        self.index += 1;
        self.member(index, value)
    }

    fn member<T: ?Sized + Serialize>(
        &self,
        segment: impl fmt::Display,
        value: &T,
    ) -> Result<(), Rejection> {
        value.serialize(FiniteCheck).map_err(|e| {
            let e = e.at(segment);
            match self.variant {
                Some(variant) => e.at(variant),
                None => e,
            }
        })
    }
}

fn key_label<T: ?Sized + Serialize>(key: &T) -> String {
    match serde_json::to_value(key) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => "?".to_string(),
    }
}

impl ser::SerializeSeq for Walk {
    type Ok = ();
    type Error = Rejection;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejection> {
        self.element(value)
    }

    fn end(self) -> Result<(), Rejection> {
        Ok(())
    }
}

impl ser::SerializeTuple for Walk {
    type Ok = ();
    type Error = Rejection;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejection> {
        self.element(value)
    }

    fn end(self) -> Result<(), Rejection> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for Walk {
    type Ok = ();
    type Error = Rejection;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejection> {
        self.element(value)
    }

    fn end(self) -> Result<(), Rejection> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for Walk {
    type Ok = ();
    type Error = Rejection;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejection> {
        self.element(value)
    }

    fn end(self) -> Result<(), Rejection> {
        Ok(())
    }
}

impl ser::SerializeMap for Walk {
    type Ok = ();
    type Error = Rejection;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Rejection> {
        self.key = Some(key_label(key));
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejection> {
        let key = self.key.take().unwrap_or_default();
        self.member(key, value)
    }

    fn end(self) -> Result<(), Rejection> {
        Ok(())
    }
}

impl ser::SerializeStruct for Walk {
    type Ok = ();
    type Error = Rejection;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Rejection> {
        self.member(key, value)
    }

    fn end(self) -> Result<(), Rejection> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for Walk {
    type Ok = ();
    type Error = Rejection;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Rejection> {
        self.member(key, value)
    }

    fn end(self) -> Result<(), Rejection> {
        Ok(())
    }
}
