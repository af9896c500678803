//! Query results: an ordered sequence of rows.
//!
//! ```text
//! +-----+------------+-----------+---------------------+
//! | 'T' | chunk_size | row_count | Row * row_count     |
//! | 1 B | u32 LE     | u16 LE    | self-framed rows    |
//! +-----+------------+-----------+---------------------+
//! ```

use crate::codec::Codec;
use crate::compress::{self, CompressionPolicy, DEFAULT_LEVEL};
use crate::error::ProtocolError;
use crate::row::Row;
use crate::wire::{self, checked_u16, Chunk, Marker, Reader, MIN_ROW_SIZE};
use crate::MAX_DECOMPRESSED_SIZE;
use bytes::{BufMut, BytesMut};
use serde::Serialize;
use std::fmt;
use std::ops::Index;

/// Rows returned by a query, in order.
///
/// An empty result is valid and distinct from a failed decode, which is
/// signalled by zero consumed bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Encodes the compressed envelope at the default level.
    pub fn encode_compressed(&self) -> Result<BytesMut, ProtocolError> {
        compress::encode_compressed(self, DEFAULT_LEVEL)
    }

    /// Encodes plain or compressed, as the policy decides.
    pub fn encode_with(&self, policy: &CompressionPolicy) -> Result<BytesMut, ProtocolError> {
        compress::encode_with_policy(self, policy)
    }

    /// Decodes either form with an explicit decompression limit.
    pub fn try_decode_with_limit(
        buf: &[u8],
        max_decompressed: usize,
    ) -> Result<(Self, usize), ProtocolError> {
        compress::decode_either(buf, max_decompressed)
    }
}

impl Chunk for ResultSet {
    const MARKER: Marker = Marker::Result;

    fn body_len(&self) -> usize {
        2 + self.rows.iter().map(Codec::encoded_len).sum::<usize>()
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u16_le(checked_u16(self.rows.len(), "result row count")?);
        for row in &self.rows {
            row.encode_into(buf)?;
        }
        Ok(())
    }

    fn decode_body(body: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let count = body.read_u16()? as usize;
        body.check_count("result", count, MIN_ROW_SIZE)?;

        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            rows.push(body.decode::<Row>()?);
        }
        Ok(Self { rows })
    }
}

impl Codec for ResultSet {
    fn encoded_len(&self) -> usize {
        wire::chunk_encoded_len(self)
    }

    fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        wire::encode_chunk(self, buf)
    }

    /// Accepts both the plain and the compressed form.
    fn try_decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        Self::try_decode_with_limit(buf, MAX_DECOMPRESSED_SIZE)
    }
}

/// One canonical row per line, in sequence order.
impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", row)?;
        }
        Ok(())
    }
}

impl Index<usize> for ResultSet {
    type Output = Row;

    fn index(&self, index: usize) -> &Row {
        &self.rows[index]
    }
}

impl From<Vec<Row>> for ResultSet {
    fn from(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

impl FromIterator<Row> for ResultSet {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
