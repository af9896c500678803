//! The five wire-representable value types.
//!
//! ```text
//! +--------+------------+------------------------------+
//! | marker | length     | payload                      |
//! | M/I/D/ | u32 LE     | Null: empty                  |
//! | S/V    |            | Integer/Double: 8 bytes LE   |
//! |        |            | Text: UTF-8, Blob: raw bytes |
//! +--------+------------+------------------------------+
//! ```

use crate::codec::Codec;
use crate::error::ProtocolError;
use crate::wire::{checked_u32, hex_list, Marker, Reader, HEADER_SIZE};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed database value.
///
/// Equality is structural: the variant and the payload bytes must match, so
/// `Double(NAN) == Double(NAN)` while `Double(0.0) != Double(-0.0)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Double(f64),
    /// Decoding requires valid UTF-8 and rejects the whole unit otherwise,
    /// unlike field names and query commands, which are decoded lossily.
    /// Peers sending other encodings should use `Blob`.
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the wire marker for this variant.
    pub fn marker(&self) -> Marker {
        match self {
            Value::Null => Marker::Null,
            Value::Integer(_) => Marker::Integer,
            Value::Double(_) => Marker::Double,
            Value::Text(_) => Marker::Text,
            Value::Blob(_) => Marker::Blob,
        }
    }

    /// Name of the active variant.
    pub fn type_name(&self) -> &'static str {
        self.marker().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(v) => Some(v),
            _ => None,
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Double(_) => 8,
            Value::Text(v) => v.len(),
            Value::Blob(v) => v.len(),
        }
    }

    fn mismatch(&self, expected: &'static str) -> ProtocolError {
        ProtocolError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }
}

fn fixed_payload(kind: &'static str, payload: &Reader<'_>) -> Result<(), ProtocolError> {
    if payload.remaining() != 8 {
        return Err(ProtocolError::InvalidPayloadSize {
            kind,
            size: payload.remaining(),
        });
    }
    Ok(())
}

impl Codec for Value {
    fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload_len()
    }

    fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let len = checked_u32(self.payload_len(), "value payload")?;

        buf.reserve(self.encoded_len());
        buf.put_u8(self.marker().byte());
        buf.put_u32_le(len);
        match self {
            Value::Null => {}
            Value::Integer(v) => buf.put_i64_le(*v),
            Value::Double(v) => buf.put_f64_le(*v),
            Value::Text(v) => buf.put_slice(v.as_bytes()),
            Value::Blob(v) => buf.put_slice(v),
        }
        Ok(())
    }

    fn try_decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let mut reader = Reader::new(buf);
        let marker = reader.read_marker()?;
        let unexpected = ProtocolError::UnexpectedMarker {
            expected: "value",
            found: marker.byte(),
        };
        if !marker.is_value() {
            return Err(unexpected);
        }

        let len = reader.read_u32()? as usize;
        let mut payload = reader.take(len)?;

        let value = match marker {
            Marker::Null => {
                if len != 0 {
                    return Err(ProtocolError::InvalidPayloadSize {
                        kind: "null",
                        size: len,
                    });
                }
                Value::Null
            }
            Marker::Integer => {
                fixed_payload("integer", &payload)?;
                Value::Integer(payload.read_i64()?)
            }
            Marker::Double => {
                fixed_payload("double", &payload)?;
                Value::Double(payload.read_f64()?)
            }
            Marker::Text => {
                let text = std::str::from_utf8(payload.rest())
                    .map_err(|_| ProtocolError::InvalidUtf8)?;
                Value::Text(text.to_owned())
            }
            Marker::Blob => Value::Blob(payload.rest().to_vec()),
            Marker::Field | Marker::Row | Marker::Result | Marker::Query => return Err(unexpected),
        };

        Ok((value, reader.position()))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "i64{{{}}}", v),
            Value::Double(v) => write!(f, "f64{{{}}}", v),
            Value::Text(v) => write!(f, "string{{{}}}", v),
            Value::Blob(v) => write!(f, "blob{{{}}}", hex_list(v)),
        }
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Integer(v as i64)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, isize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl TryFrom<Value> for i64 {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_integer().ok_or_else(|| value.mismatch("integer"))
    }
}

impl TryFrom<Value> for f64 {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_double().ok_or_else(|| value.mismatch("double"))
    }
}

impl TryFrom<Value> for String {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(other.mismatch("text")),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Blob(v) => Ok(v),
            other => Err(other.mismatch("blob")),
        }
    }
}
