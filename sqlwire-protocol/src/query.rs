//! Parameterized queries.
//!
//! ```text
//! +-----+------------+---------+-----------+---------+-------------------+
//! | 'Q' | chunk_size | cmd_len | arg_count | command | Value * arg_count |
//! | 1 B | u32 LE     | u16 LE  | u16 LE    | cmd_len | self-framed       |
//! +-----+------------+---------+-----------+---------+-------------------+
//! ```

use crate::codec::Codec;
use crate::compress::{self, CompressionPolicy, DEFAULT_LEVEL};
use crate::error::ProtocolError;
use crate::value::Value;
use crate::wire::{self, checked_u16, Chunk, Marker, Reader, MIN_VALUE_SIZE};
use crate::MAX_DECOMPRESSED_SIZE;
use bytes::{BufMut, BytesMut};
use serde::Serialize;
use std::fmt;

/// Positional argument marker in a command.
pub const PLACEHOLDER: char = '?';

/// Builds a [`Query`] from a command and any number of `Into<Value>` arguments.
///
/// ```
/// use sqlwire_protocol::{query, Value};
///
/// let q = query!("SELECT * FROM t WHERE a=? AND b=?", 1, "two");
/// assert!(q.valid());
/// assert_eq!(q.args()[1], Value::from("two"));
/// ```
#[macro_export]
macro_rules! query {
    ($command:expr $(, $arg:expr)* $(,)?) => {
        $crate::Query::with_args($command, vec![$($crate::Value::from($arg)),*])
    };
}

/// A command string plus ordered arguments for its `?` placeholders.
///
/// Validity is checked on demand; an invalid query still encodes and decodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Query {
    command: String,
    args: Vec<Value>,
}

impl Query {
    /// A query without arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(command: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Appends an argument (builder form).
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn push_arg(&mut self, value: impl Into<Value>) {
        self.args.push(value.into());
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.command, self.args)
    }

    /// Number of `?` characters in the command.
    pub fn placeholder_count(&self) -> usize {
        self.command.chars().filter(|&c| c == PLACEHOLDER).count()
    }

    /// Checks that placeholders and arguments match, with a typed error.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let placeholders = self.placeholder_count();
        if placeholders != self.args.len() {
            return Err(ProtocolError::PlaceholderMismatch {
                placeholders,
                arguments: self.args.len(),
            });
        }
        Ok(())
    }

    /// Returns whether placeholders and arguments match, logging a warning if not.
    pub fn valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("invalid query {:?}: {}", self.command, e);
                false
            }
        }
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

impl Chunk for Query {
    const MARKER: Marker = Marker::Query;

    fn body_len(&self) -> usize {
        2 + 2 + self.command.len() + self.args.iter().map(Codec::encoded_len).sum::<usize>()
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u16_le(checked_u16(self.command.len(), "query command")?);
        buf.put_u16_le(checked_u16(self.args.len(), "query argument count")?);
        buf.put_slice(self.command.as_bytes());
        for arg in &self.args {
            arg.encode_into(buf)?;
        }
        Ok(())
    }

    fn decode_body(body: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let cmd_len = body.read_u16()? as usize;
        let arg_count = body.read_u16()? as usize;
        let command = String::from_utf8_lossy(body.read_bytes(cmd_len)?).into_owned();

        body.check_count("query", arg_count, MIN_VALUE_SIZE)?;
        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            args.push(body.decode::<Value>()?);
        }
        Ok(Self { command, args })
    }
}

impl Codec for Query {
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

/// The command, then one argument per line.
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, "\n{}", arg)?;
        }
        Ok(())
    }
}
