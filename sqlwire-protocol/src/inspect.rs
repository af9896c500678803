//! Annotated hex dumps of encoded data, for debugging.
//!
//! Each wire component is rendered on its own line as its raw bytes followed
//! by the decoded meaning in brackets; nested units are indented:
//!
//! ```text
//! 0x46  [F]
//! 0x12,0x00,0x00,0x00  [18]
//! 0x03,0x00  [name_len 3]
//! 0x61,0x67,0x65  [age]
//!   0x49  [I]
//!   0x08,0x00,0x00,0x00  [8]
//!   0x2a,0x00,0x00,0x00,0x00,0x00,0x00,0x00  [42]
//! ```

use crate::compress::decompress;
use crate::error::ProtocolError;
use crate::wire::{hex_list, is_compressed, Marker, Reader, COMPRESSED_FLAG};
use crate::MAX_DECOMPRESSED_SIZE;
use std::fmt::Display;

/// Renders every unit in `buf`. Malformed input ends the dump with a
/// `<malformed: ...>` line instead of failing.
pub fn dump(buf: &[u8]) -> String {
    dump_with_limit(buf, MAX_DECOMPRESSED_SIZE)
}

/// Like [`dump`], inflating compressed units to at most `max_decompressed` bytes.
pub fn dump_with_limit(buf: &[u8], max_decompressed: usize) -> String {
    let mut dumper = Dumper {
        out: String::new(),
        max_decompressed,
    };
    let mut reader = Reader::new(buf);

    while reader.remaining() > 0 {
        if let Err(e) = dumper.unit(&mut reader, 0, Slot::Top) {
            dumper.note(0, format!("<malformed: {}>", e));
            break;
        }
    }
    dumper.out
}

/// What a position in the stream may hold. Nesting follows the unit
/// grammar, so a dump never goes deeper than Result, Row, Field, Value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Top,
    Value,
    Field,
    Row,
}

impl Slot {
    fn accepts(self, marker: Marker) -> bool {
        match self {
            Slot::Top => true,
            Slot::Value => marker.is_value(),
            Slot::Field => marker == Marker::Field,
            Slot::Row => marker == Marker::Row,
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Slot::Top => "unit",
            Slot::Value => "value",
            Slot::Field => Marker::Field.name(),
            Slot::Row => Marker::Row.name(),
        }
    }
}

struct Dumper {
    out: String,
    max_decompressed: usize,
}

impl Dumper {
    fn line(&mut self, depth: usize, bytes: &[u8], meaning: impl Display) {
        self.out.push_str(&"  ".repeat(depth));
        self.out.push_str(&format!("{}  [{}]\n", hex_list(bytes), meaning));
    }

    fn note(&mut self, depth: usize, text: impl Display) {
        self.out.push_str(&"  ".repeat(depth));
        self.out.push_str(&format!("{}\n", text));
    }

    fn length(&mut self, reader: &mut Reader<'_>, depth: usize) -> Result<usize, ProtocolError> {
        let raw = reader.rest();
        let len = reader.read_u32()? as usize;
        self.line(depth, &raw[..4], len);
        Ok(len)
    }

    fn count(
        &mut self,
        reader: &mut Reader<'_>,
        depth: usize,
        label: &str,
    ) -> Result<usize, ProtocolError> {
        let raw = reader.rest();
        let n = reader.read_u16()? as usize;
        self.line(depth, &raw[..2], format!("{} {}", label, n));
        Ok(n)
    }

    fn unit(
        &mut self,
        reader: &mut Reader<'_>,
        depth: usize,
        slot: Slot,
    ) -> Result<(), ProtocolError> {
        let byte = reader.read_u8()?;
        let unexpected = ProtocolError::UnexpectedMarker {
            expected: slot.expected(),
            found: byte,
        };

        // only top-level Query and Result travel compressed
        if is_compressed(byte) {
            let marker = Marker::try_from(byte & !COMPRESSED_FLAG)?;
            if slot != Slot::Top || !matches!(marker, Marker::Query | Marker::Result) {
                return Err(unexpected);
            }
            self.line(depth, &[byte], format!("{} gzip", marker.as_char()));
            let len = self.length(reader, depth)?;
            let plain = decompress(reader.read_bytes(len)?, self.max_decompressed)?;
            self.note(
                depth + 1,
                format!("<{} compressed bytes, {} plain>", len, plain.len()),
            );
            let mut body = Reader::new(&plain);
            return self.body(marker, &mut body, depth + 1);
        }

        let marker = Marker::try_from(byte)?;
        if !slot.accepts(marker) {
            return Err(unexpected);
        }
        self.line(depth, &[byte], marker.as_char());
        let len = self.length(reader, depth)?;
        let mut body = reader.take(len)?;
        self.body(marker, &mut body, depth)
    }

    fn body(
        &mut self,
        marker: Marker,
        body: &mut Reader<'_>,
        depth: usize,
    ) -> Result<(), ProtocolError> {
        let raw = body.rest();
        match marker {
            Marker::Null => {}
            Marker::Integer => {
                let v = body.read_i64()?;
                self.line(depth, &raw[..8], v);
            }
            Marker::Double => {
                let v = body.read_f64()?;
                self.line(depth, &raw[..8], v);
            }
            Marker::Text => {
                let text = body.read_bytes(raw.len())?;
                self.line(depth, text, String::from_utf8_lossy(text));
            }
            Marker::Blob => {
                let blob = body.read_bytes(raw.len())?;
                self.line(depth, blob, format!("{} bytes", blob.len()));
            }
            Marker::Field => {
                let name_len = self.count(body, depth, "name_len")?;
                let name = body.read_bytes(name_len)?;
                self.line(depth, name, String::from_utf8_lossy(name));
                self.unit(body, depth + 1, Slot::Value)?;
            }
            Marker::Row | Marker::Result => {
                let (label, slot) = if marker == Marker::Row {
                    ("fields", Slot::Field)
                } else {
                    ("rows", Slot::Row)
                };
                let n = self.count(body, depth, label)?;
                for _ in 0..n {
                    self.unit(body, depth + 1, slot)?;
                }
            }
            Marker::Query => {
                let cmd_len = self.count(body, depth, "cmd_len")?;
                let args = self.count(body, depth, "args")?;
                let command = body.read_bytes(cmd_len)?;
                self.line(depth, command, String::from_utf8_lossy(command));
                for _ in 0..args {
                    self.unit(body, depth + 1, Slot::Value)?;
                }
            }
        }

        if body.remaining() > 0 {
            let rest = body.rest();
            self.line(depth, rest, "<trailing bytes>");
        }
        Ok(())
    }
}
