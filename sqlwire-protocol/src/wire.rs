//! Markers, length fields and bounds-checked reading.
//!
//! Every unit on the wire starts with a one byte marker followed by a
//! little-endian `u32` length describing only the bytes after itself:
//!
//! ```text
//! +--------+------------+---------------------------------+
//! | marker | length     | body                            |
//! | 1 byte | 4 bytes LE | length bytes                    |
//! +--------+------------+---------------------------------+
//! ```
//!
//! Setting bit 7 of a Query or Result marker announces the compressed
//! envelope (see [`crate::compress`]).

use crate::codec::Codec;
use crate::error::ProtocolError;
use bytes::{Buf, BufMut, BytesMut};

/// Size of a marker byte plus a `u32` length field.
pub const HEADER_SIZE: usize = 5;

/// Bit set on a marker byte to flag a compressed envelope.
pub const COMPRESSED_FLAG: u8 = 0b1000_0000;

/// Smallest possible encoded Value (`M` + zero length).
pub const MIN_VALUE_SIZE: usize = HEADER_SIZE;

/// Smallest possible encoded Field (empty name, Null value).
pub const MIN_FIELD_SIZE: usize = HEADER_SIZE + 2 + MIN_VALUE_SIZE;

/// Smallest possible encoded Row (no fields).
pub const MIN_ROW_SIZE: usize = HEADER_SIZE + 2;

/// Type marker of a wire unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Marker {
    Null = b'M',
    Integer = b'I',
    Double = b'D',
    Text = b'S',
    Blob = b'V',
    Field = b'F',
    Row = b'R',
    Result = b'T',
    Query = b'Q',
}

impl Marker {
    /// Returns the plain marker byte.
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Returns the marker byte announcing the compressed envelope.
    pub fn compressed(self) -> u8 {
        self as u8 | COMPRESSED_FLAG
    }

    /// Returns the ASCII character of the marker.
    pub fn as_char(self) -> char {
        self as u8 as char
    }

    /// Human-readable unit name.
    pub fn name(self) -> &'static str {
        match self {
            Marker::Null => "null",
            Marker::Integer => "integer",
            Marker::Double => "double",
            Marker::Text => "text",
            Marker::Blob => "blob",
            Marker::Field => "field",
            Marker::Row => "row",
            Marker::Result => "result",
            Marker::Query => "query",
        }
    }

    /// Returns whether this marker introduces a Value.
    pub fn is_value(self) -> bool {
        matches!(
            self,
            Marker::Null | Marker::Integer | Marker::Double | Marker::Text | Marker::Blob
        )
    }
}

impl TryFrom<u8> for Marker {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'M' => Ok(Marker::Null),
            b'I' => Ok(Marker::Integer),
            b'D' => Ok(Marker::Double),
            b'S' => Ok(Marker::Text),
            b'V' => Ok(Marker::Blob),
            b'F' => Ok(Marker::Field),
            b'R' => Ok(Marker::Row),
            b'T' => Ok(Marker::Result),
            b'Q' => Ok(Marker::Query),
            _ => Err(ProtocolError::UnknownMarker(value)),
        }
    }
}

/// Returns whether a leading byte announces a compressed envelope.
pub fn is_compressed(byte: u8) -> bool {
    byte & COMPRESSED_FLAG != 0
}

/// Converts a length into a `u16` count field.
pub(crate) fn checked_u16(len: usize, what: &'static str) -> Result<u16, ProtocolError> {
    u16::try_from(len).map_err(|_| ProtocolError::TooLarge {
        what,
        size: len,
        max: u16::MAX as usize,
    })
}

/// Converts a length into a `u32` length field.
pub(crate) fn checked_u32(len: usize, what: &'static str) -> Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::TooLarge {
        what,
        size: len,
        max: u32::MAX as usize,
    })
}

/// Renders bytes as `0x01,0x02,...`.
pub(crate) fn hex_list(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(",")
}

/// Cursor over a borrowed byte slice.
///
/// Every read is checked against the remaining length before touching the
/// slice, so a malformed length can never cause an out-of-bounds access.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            len: buf.len(),
        }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.len - self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Unread bytes, without consuming them.
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.len() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64_le())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        self.ensure(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Splits off the next `n` bytes as an independent reader.
    pub fn take(&mut self, n: usize) -> Result<Reader<'a>, ProtocolError> {
        Ok(Reader::new(self.read_bytes(n)?))
    }

    pub fn read_marker(&mut self) -> Result<Marker, ProtocolError> {
        Marker::try_from(self.read_u8()?)
    }

    pub fn expect_marker(&mut self, marker: Marker) -> Result<(), ProtocolError> {
        let found = self.read_u8()?;
        if found != marker.byte() {
            return Err(ProtocolError::UnexpectedMarker {
                expected: marker.name(),
                found,
            });
        }
        Ok(())
    }

    /// Decodes a nested self-framed unit and advances past it.
    pub fn decode<T: Codec>(&mut self) -> Result<T, ProtocolError> {
        let (value, consumed) = T::try_decode(self.buf)?;
        self.read_bytes(consumed)?;
        Ok(value)
    }

    /// Rejects a count whose minimal encoding could not fit in the remaining bytes.
    pub fn check_count(
        &self,
        unit: &'static str,
        count: usize,
        min_size: usize,
    ) -> Result<(), ProtocolError> {
        if count.saturating_mul(min_size) > self.buf.len() {
            return Err(ProtocolError::TooManyElements {
                unit,
                count,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Requires that the whole declared extent was consumed.
    pub fn finish(&self, unit: &'static str, declared: usize) -> Result<(), ProtocolError> {
        if !self.buf.is_empty() {
            return Err(ProtocolError::LengthMismatch {
                unit,
                declared,
                actual: declared - self.buf.len(),
            });
        }
        Ok(())
    }
}

/// A unit framed as `[marker][u32 chunk_size][body]`.
///
/// The body is what the compressed envelope wraps for Query and Result.
pub(crate) trait Chunk: Sized {
    const MARKER: Marker;

    /// Number of body bytes, i.e. the value of `chunk_size`.
    fn body_len(&self) -> usize;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError>;

    /// Parses a body. The caller checks that the reader was fully consumed.
    fn decode_body(body: &mut Reader<'_>) -> Result<Self, ProtocolError>;
}

pub(crate) fn chunk_encoded_len<T: Chunk>(chunk: &T) -> usize {
    HEADER_SIZE + chunk.body_len()
}

pub(crate) fn encode_chunk<T: Chunk>(chunk: &T, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let body_len = chunk.body_len();
    let chunk_size = checked_u32(body_len, T::MARKER.name())?;

    buf.reserve(HEADER_SIZE + body_len);
    buf.put_u8(T::MARKER.byte());
    buf.put_u32_le(chunk_size);
    chunk.encode_body(buf)
}

pub(crate) fn decode_chunk<T: Chunk>(buf: &[u8]) -> Result<(T, usize), ProtocolError> {
    let mut reader = Reader::new(buf);
    reader.expect_marker(T::MARKER)?;
    let chunk_size = reader.read_u32()? as usize;
    let mut body = reader.take(chunk_size)?;

    let value = T::decode_body(&mut body)?;
    body.finish(T::MARKER.name(), chunk_size)?;

    Ok((value, reader.position()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_conversion() {
        assert_eq!(Marker::try_from(b'M').unwrap(), Marker::Null);
        assert_eq!(Marker::try_from(b'I').unwrap(), Marker::Integer);
        assert_eq!(Marker::try_from(b'D').unwrap(), Marker::Double);
        assert_eq!(Marker::try_from(b'S').unwrap(), Marker::Text);
        assert_eq!(Marker::try_from(b'V').unwrap(), Marker::Blob);
        assert_eq!(Marker::try_from(b'F').unwrap(), Marker::Field);
        assert_eq!(Marker::try_from(b'R').unwrap(), Marker::Row);
        assert_eq!(Marker::try_from(b'T').unwrap(), Marker::Result);
        assert_eq!(Marker::try_from(b'Q').unwrap(), Marker::Query);
        assert!(matches!(
            Marker::try_from(b'X'),
            Err(ProtocolError::UnknownMarker(b'X'))
        ));
        assert!(Marker::try_from(Marker::Query.compressed()).is_err());
    }

    #[test]
    fn test_compressed_flag() {
        assert_eq!(Marker::Result.compressed(), b'T' | 0x80);
        assert!(is_compressed(Marker::Query.compressed()));
        assert!(!is_compressed(b'Q'));
        assert!(Marker::Blob.is_value());
        assert!(!Marker::Row.is_value());
    }

    #[test]
    fn test_reader_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
        assert_eq!(reader.read_u32().unwrap(), 0x0605_0403);
        assert_eq!(reader.position(), 6);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_truncation() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&data);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated {
                needed: 4,
                available: 3
            }
        ));
        // A failed read must not consume anything.
        assert_eq!(reader.position(), 0);
        assert!(reader.read_bytes(4).is_err());
        assert_eq!(reader.read_bytes(3).unwrap(), &data[..]);
    }

    #[test]
    fn test_reader_take_is_bounded() {
        let data = [1, 2, 3, 4, 5];
        let mut reader = Reader::new(&data);
        let mut sub = reader.take(2).unwrap();
        assert_eq!(sub.read_u8().unwrap(), 1);
        assert_eq!(sub.read_u8().unwrap(), 2);
        assert!(sub.read_u8().is_err());
        assert_eq!(reader.rest(), &[3, 4, 5]);
    }

    #[test]
    fn test_check_count() {
        let data = [0u8; 24];
        let reader = Reader::new(&data);
        assert!(reader.check_count("row", 2, MIN_FIELD_SIZE).is_ok());
        assert!(matches!(
            reader.check_count("row", 3, MIN_FIELD_SIZE),
            Err(ProtocolError::TooManyElements { count: 3, .. })
        ));
        assert!(reader.check_count("row", usize::MAX, MIN_FIELD_SIZE).is_err());
    }

    #[test]
    fn test_expect_marker() {
        let mut reader = Reader::new(b"R");
        assert!(matches!(
            reader.expect_marker(Marker::Field),
            Err(ProtocolError::UnexpectedMarker {
                expected: "field",
                found: b'R'
            })
        ));
    }

    #[test]
    fn test_checked_sizes() {
        assert_eq!(checked_u16(65535, "name").unwrap(), u16::MAX);
        assert!(matches!(
            checked_u16(65536, "name"),
            Err(ProtocolError::TooLarge { max: 65535, .. })
        ));
        assert_eq!(checked_u32(7, "row").unwrap(), 7);
    }

    #[test]
    fn test_hex_list() {
        assert_eq!(hex_list(&[]), "");
        assert_eq!(hex_list(&[0x0a, 0xff]), "0x0a,0xff");
    }
}
