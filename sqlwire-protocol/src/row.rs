//! Rows of named fields.
//!
//! ```text
//! +-----+------------+-------------+-----------------------+
//! | 'R' | chunk_size | field_count | Field * field_count   |
//! | 1 B | u32 LE     | u16 LE      | self-framed fields    |
//! +-----+------------+-------------+-----------------------+
//! ```
//!
//! Fields are written in insertion order.

use crate::codec::Codec;
use crate::error::ProtocolError;
use crate::field::Field;
use crate::value::Value;
use crate::wire::{self, checked_u16, Chunk, Marker, Reader, MIN_FIELD_SIZE};
use bytes::{BufMut, BytesMut};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Delimiter between fields in the canonical text form.
pub const FIELD_DELIMITER: char = ',';

/// A collection of fields with unique names.
///
/// Adding a field whose name already exists replaces the old value in place.
#[derive(Debug, Clone, Default)]
pub struct Row {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, overwriting any field with the same name.
    pub fn add(&mut self, field: Field) -> &mut Self {
        match self.index.get(field.name()) {
            Some(&pos) => self.fields[pos] = field,
            None => {
                self.index.insert(field.name().to_owned(), self.fields.len());
                self.fields.push(field);
            }
        }
        self
    }

    /// Adds a named value. `None` becomes a `Null` field rather than being skipped.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.add(Field::new(name, value))
    }

    /// Builder form of [`Row::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&pos| &self.fields[pos])
    }

    /// Value of the named field.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).map(Field::value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// Splits the row into parallel name and value lists, in insertion order.
    ///
    /// This is the shape used to bind a row into a parameterized statement.
    pub fn split(&self) -> (Vec<String>, Vec<Value>) {
        self.fields
            .iter()
            .map(|f| (f.name().to_owned(), f.value().clone()))
            .unzip()
    }
}

impl Chunk for Row {
    const MARKER: Marker = Marker::Row;

    fn body_len(&self) -> usize {
        2 + self.fields.iter().map(Codec::encoded_len).sum::<usize>()
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u16_le(checked_u16(self.fields.len(), "row field count")?);
        for field in &self.fields {
            field.encode_into(buf)?;
        }
        Ok(())
    }

    fn decode_body(body: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let count = body.read_u16()? as usize;
        body.check_count("row", count, MIN_FIELD_SIZE)?;

        let mut row = Row::new();
        for _ in 0..count {
            row.add(body.decode::<Field>()?);
        }
        Ok(row)
    }
}

impl Codec for Row {
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

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .fields
                .iter()
                .all(|f| other.get(f.name()) == Some(f))
    }
}

impl Eq for Row {}

/// Canonical text form: fields sorted by name.
impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted: Vec<&Field> = self.fields.iter().collect();
        sorted.sort_by(|a, b| a.name().cmp(b.name()));

        for (i, field) in sorted.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", FIELD_DELIMITER)?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(field.name(), field.value())?;
        }
        map.end()
    }
}

impl FromIterator<Field> for Row {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut row = Row::new();
        for field in iter {
            row.add(field);
        }
        row
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for Row {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_overwrites_by_name() {
        let mut row = Row::new();
        row.set("a", 1).set("b", 2).set("a", "again");

        assert_eq!(row.len(), 2);
        assert_eq!(row.value("a"), Some(&Value::from("again")));
        // Overwrite keeps the original position.
        assert_eq!(row.iter().next().unwrap().name(), "a");
    }

    #[test]
    fn test_optional_values_become_null_fields() {
        let mut row = Row::new();
        row.set("nick", None::<String>);
        row.set("age", Some(30));

        assert!(row.contains("nick"));
        assert!(row.value("nick").unwrap().is_null());
        assert_eq!(row.value("age"), Some(&Value::Integer(30)));
    }

    #[test]
    fn test_row_roundtrip_any_order() {
        let row = Row::new().with("id", 7).with("name", "Ann");
        let encoded = row.encode().unwrap();
        let (decoded, consumed) = Row::decode(&encoded);

        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded.value("id"), Some(&Value::Integer(7)));
        assert_eq!(decoded.value("name"), Some(&Value::from("Ann")));

        let reversed = Row::new().with("name", "Ann").with("id", 7);
        assert_eq!(decoded, reversed);
    }

    #[test]
    fn test_wire_order_is_insertion_order() {
        let row = Row::new().with("z", 1).with("a", 2);
        let encoded = row.encode().unwrap();
        // 'R' + chunk + count, then the first field's name
        assert_eq!(&encoded[7..8], b"F");
        assert_eq!(&encoded[14..15], b"z");
    }

    #[test]
    fn test_empty_row() {
        let row = Row::new();
        let encoded = row.encode().unwrap();
        assert_eq!(&encoded[..], b"R\x02\x00\x00\x00\x00\x00");

        let (decoded, consumed) = Row::decode(&encoded);
        assert!(decoded.is_empty());
        assert_eq!(consumed, 7);
    }

    #[test]
    fn test_nested_failure_fails_row() {
        let mut encoded = Row::new().with("a", 1).with("b", 2).encode().unwrap();
        // Corrupt the second field's marker.
        let second = 7 + Field::new("a", 1).encoded_len();
        encoded[second] = b'X';

        let (row, consumed) = Row::decode(&encoded);
        assert_eq!(consumed, 0);
        assert!(row.is_empty());
    }

    #[test]
    fn test_truncated_row() {
        let encoded = Row::new().with("a", 1).with("b", "two").encode().unwrap();
        for k in 0..encoded.len() {
            assert_eq!(Row::decode(&encoded[..k]).1, 0, "prefix of {} bytes", k);
        }
    }

    #[test]
    fn test_huge_field_count_rejected_before_parsing() {
        let mut data = vec![b'R'];
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&u16::MAX.to_le_bytes());
        data.extend_from_slice(&[0, 0]);

        assert!(matches!(
            Row::try_decode(&data),
            Err(ProtocolError::TooManyElements { unit: "row", .. })
        ));
    }

    #[test]
    fn test_canonical_text_is_sorted() {
        let row = Row::new().with("name", "Ann").with("id", 7);
        assert_eq!(row.to_string(), "id:[i64{7}],name:[string{Ann}]");
        assert_eq!(Row::new().to_string(), "");
    }

    #[test]
    fn test_split() {
        let row = Row::new().with("a", 1).with("b", "x");
        let (names, values) = row.split();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(values, vec![Value::Integer(1), Value::from("x")]);
    }

    #[test]
    fn test_equality_requires_same_fields() {
        let a = Row::new().with("a", 1);
        let b = Row::new().with("a", 1).with("b", 2);
        assert_ne!(a, b);
        assert_ne!(b, a);
        assert_ne!(a, Row::new().with("a", 2));
    }

    #[test]
    fn test_from_iterator_and_json() {
        let row: Row = vec![Field::new("a", 1), Field::new("b", "x")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"a":{"type":"integer","value":1},"b":{"type":"text","value":"x"}}"#
        );
        assert_eq!(row.into_iter().count(), 2);
    }
}
