//! Attribute values and their JSON encoding
//!
//! Attributes are key/value pairs attached to a metric or to a batch's common block.
//! They can be supplied either as a map of [`AttributeValue`]s or as a pre-serialized
//! JSON object ([`RawAttributes`]). When both are present the raw JSON wins and the map
//! is ignored.

use bytes::Bytes;
use std::collections::HashMap;
use std::io;

use crate::json::{self, ObjectWriter};

/// Map of attribute names to values
///
/// Key order in the encoded output follows the map's iteration order and is not
/// guaranteed to be stable.
pub type Attributes = HashMap<String, AttributeValue>;

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    /// A value of an unsupported type, recorded as its type name
    Other(String),
}

impl AttributeValue {
    /// Describe a value of an unsupported type as text
    ///
    /// The value is not inspected; the attribute records its type name, so a closure
    /// renders as its type descriptor.
    pub fn describe<T: ?Sized>(value: &T) -> Self {
        AttributeValue::Other(std::any::type_name_of_val(value).to_string())
    }

    fn write_json(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match self {
            AttributeValue::String(s) | AttributeValue::Other(s) => json::write_string(buf, s),
            AttributeValue::Bool(true) => {
                buf.extend_from_slice(b"true");
                Ok(())
            }
            AttributeValue::Bool(false) => {
                buf.extend_from_slice(b"false");
                Ok(())
            }
            AttributeValue::Int(i) => json::write_int(buf, i),
            AttributeValue::UInt(u) => json::write_int(buf, u),
            AttributeValue::F32(f) => json::write_f32(buf, *f),
            AttributeValue::F64(f) => json::write_f64(buf, *f),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::F32(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::F64(value)
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for AttributeValue {
            fn from(value: $t) -> Self {
                AttributeValue::Int(value as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for AttributeValue {
            fn from(value: $t) -> Self {
                AttributeValue::UInt(value as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64, isize);
impl_from_unsigned!(u8, u16, u32, u64, usize);

/// A pre-serialized JSON object of attributes
///
/// The bytes are trusted and copied into the payload verbatim. They are not validated:
/// malformed JSON here produces a malformed request body rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawAttributes(Bytes);

impl RawAttributes {
    /// Wrap already-encoded JSON object bytes
    pub fn new(json: impl Into<Bytes>) -> Self {
        RawAttributes(json.into())
    }

    /// Encode a `serde_json::Value` once so it can be reused across batches
    pub fn from_value(value: &serde_json::Value) -> serde_json::Result<Self> {
        Ok(RawAttributes(Bytes::from(serde_json::to_vec(value)?)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&'static str> for RawAttributes {
    fn from(value: &'static str) -> Self {
        RawAttributes(Bytes::from_static(value.as_bytes()))
    }
}

impl From<String> for RawAttributes {
    fn from(value: String) -> Self {
        RawAttributes(Bytes::from(value))
    }
}

impl From<Vec<u8>> for RawAttributes {
    fn from(value: Vec<u8>) -> Self {
        RawAttributes(Bytes::from(value))
    }
}

impl From<Bytes> for RawAttributes {
    fn from(value: Bytes) -> Self {
        RawAttributes(value)
    }
}

/// Write an `"attributes"` field if the attribute set is non-empty.
///
/// Raw JSON takes precedence over the map; an empty raw blob falls back to the map.
pub(crate) fn write_attributes_field(
    w: &mut ObjectWriter<'_>,
    map: Option<&Attributes>,
    raw: Option<&RawAttributes>,
) -> io::Result<()> {
    if let Some(raw) = raw.filter(|r| !r.is_empty()) {
        return w.raw_field("attributes", raw.as_bytes());
    }

    match map {
        Some(map) if !map.is_empty() => {
            let buf = w.key("attributes")?;
            write_map(buf, map)
        }
        _ => Ok(()),
    }
}

fn write_map(buf: &mut Vec<u8>, map: &Attributes) -> io::Result<()> {
    buf.push(b'{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        json::write_string(buf, key)?;
        buf.push(b':');
        value.write_json(buf)?;
    }
    buf.push(b'}');
    Ok(())
}
