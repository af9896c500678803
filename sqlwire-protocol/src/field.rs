//! Named values.
//!
//! ```text
//! +-----+------------+----------+------------+---------------+
//! | 'F' | chunk_size | name_len | name       | Value         |
//! | 1 B | u32 LE     | u16 LE   | name_len B | self-framed   |
//! +-----+------------+----------+------------+---------------+
//! ```
//!
//! `chunk_size = 2 + name_len + encoded Value length`.

use crate::codec::Codec;
use crate::error::ProtocolError;
use crate::value::Value;
use crate::wire::{self, checked_u16, Chunk, Marker, Reader};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(name, value)` pair, the atomic named unit of wire data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    value: Value,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A field holding `Null`.
    pub fn null(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.name, self.value)
    }
}

impl Chunk for Field {
    const MARKER: Marker = Marker::Field;

    fn body_len(&self) -> usize {
        2 + self.name.len() + self.value.encoded_len()
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u16_le(checked_u16(self.name.len(), "field name")?);
        buf.put_slice(self.name.as_bytes());
        self.value.encode_into(buf)
    }

    fn decode_body(body: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let name_len = body.read_u16()? as usize;
        let name = String::from_utf8_lossy(body.read_bytes(name_len)?).into_owned();
        let value = body.decode::<Value>()?;
        Ok(Self { name, value })
    }
}

impl Codec for Field {
    fn encoded_len(&self) -> usize {
        wire::chunk_encoded_len(self)
    }

    fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        wire::encode_chunk(self, buf)
    }

    fn try_decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        wire::decode_chunk(buf)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}]", self.name, self.value)
    }
}
