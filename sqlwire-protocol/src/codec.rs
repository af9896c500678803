//! The `Codec` trait plus encoder and streaming decoder for Query/Result messages.

use crate::compress::CompressionPolicy;
use crate::error::ProtocolError;
use crate::query::Query;
use crate::result::ResultSet;
use crate::wire::{Marker, COMPRESSED_FLAG, HEADER_SIZE};
use crate::{MAX_DECOMPRESSED_SIZE, MAX_FRAME_SIZE};
use bytes::{Buf, Bytes, BytesMut};

/// Binary encoding of a wire unit.
///
/// `decode` follows the zero-consumed convention: on malformed or truncated
/// input it returns the default value and `0`. `try_decode` reports why.
pub trait Codec: Sized + Default {
    /// Exact number of bytes `encode` produces (plain form).
    fn encoded_len(&self) -> usize;

    /// Appends the plain encoding to `buf`.
    fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError>;

    /// Decodes one unit from the start of `buf`, returning it with the
    /// number of bytes consumed.
    fn try_decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError>;

    /// Encodes into a freshly allocated buffer.
    fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Decodes one unit; `(Self::default(), 0)` means the input is corrupt or short.
    fn decode(buf: &[u8]) -> (Self, usize) {
        match Self::try_decode(buf) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!("decode failed after inspecting {} bytes: {}", buf.len(), e);
                (Self::default(), 0)
            }
        }
    }
}

/// A top-level unit: either a Query or a Result.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Query(Query),
    Result(ResultSet),
}

impl Message {
    /// Decodes a Query or Result, plain or compressed, dispatching on the marker.
    pub fn try_decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        Self::try_decode_with_limit(buf, MAX_DECOMPRESSED_SIZE)
    }

    /// Like [`Message::try_decode`] with an explicit decompression limit.
    pub fn try_decode_with_limit(
        buf: &[u8],
        max_decompressed: usize,
    ) -> Result<(Self, usize), ProtocolError> {
        let first = *buf.first().ok_or(ProtocolError::Truncated {
            needed: 1,
            available: 0,
        })?;

        match Marker::try_from(first & !COMPRESSED_FLAG)? {
            Marker::Query => Query::try_decode_with_limit(buf, max_decompressed)
                .map(|(query, n)| (Message::Query(query), n)),
            Marker::Result => ResultSet::try_decode_with_limit(buf, max_decompressed)
                .map(|(result, n)| (Message::Result(result), n)),
            _ => Err(ProtocolError::UnexpectedMarker {
                expected: "query or result",
                found: first,
            }),
        }
    }

    /// Returns the wire marker of this message.
    pub fn marker(&self) -> Marker {
        match self {
            Message::Query(_) => Marker::Query,
            Message::Result(_) => Marker::Result,
        }
    }
}

impl From<Query> for Message {
    fn from(query: Query) -> Self {
        Message::Query(query)
    }
}

impl From<ResultSet> for Message {
    fn from(result: ResultSet) -> Self {
        Message::Result(result)
    }
}

/// Encodes messages, compressing those the policy selects.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    policy: CompressionPolicy,
}

impl Encoder {
    pub fn new(policy: CompressionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CompressionPolicy {
        &self.policy
    }

    /// Encodes a query.
    pub fn encode_query(&self, query: &Query) -> Result<BytesMut, ProtocolError> {
        query.encode_with(&self.policy)
    }

    /// Encodes a result.
    pub fn encode_result(&self, result: &ResultSet) -> Result<BytesMut, ProtocolError> {
        result.encode_with(&self.policy)
    }

    /// Encodes either kind of message.
    pub fn encode_message(&self, message: &Message) -> Result<BytesMut, ProtocolError> {
        match message {
            Message::Query(query) => self.encode_query(query),
            Message::Result(result) => self.encode_result(result),
        }
    }
}

/// Decodes messages from a stream of concatenated, possibly partial, chunks.
pub struct Decoder {
    buffer: BytesMut,
    max_decompressed: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_decompressed: MAX_DECOMPRESSED_SIZE,
        }
    }

    /// Sets the largest payload a compressed message may expand to.
    pub fn with_max_decompressed(mut self, max: usize) -> Self {
        self.max_decompressed = max;
        self
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Appends bytes to the internal buffer.
    pub fn extend_bytes(&mut self, data: Bytes) {
        self.buffer.extend_from_slice(&data);
    }

    /// Attempts to decode the next message from the buffer.
    ///
    /// Returns `Ok(None)` while the next message is incomplete. Once its full
    /// extent is buffered, any parse failure is an error and the buffer is
    /// left untouched.
    pub fn decode_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        let Some(extent) = Self::message_extent(&self.buffer)? else {
            return Ok(None);
        };

        let (message, consumed) =
            Message::try_decode_with_limit(&self.buffer[..extent], self.max_decompressed)?;
        self.buffer.advance(consumed);
        Ok(Some(message))
    }

    /// Attempts to decode the next message, requiring it to be a query.
    pub fn decode_query(&mut self) -> Result<Option<Query>, ProtocolError> {
        match self.peek_marker()? {
            Some(Marker::Query) => match self.decode_message()? {
                Some(Message::Query(query)) => Ok(Some(query)),
                _ => Ok(None),
            },
            Some(_) => Err(self.wrong_message("query")),
            None => Ok(None),
        }
    }

    /// Attempts to decode the next message, requiring it to be a result.
    pub fn decode_result(&mut self) -> Result<Option<ResultSet>, ProtocolError> {
        match self.peek_marker()? {
            Some(Marker::Result) => match self.decode_message()? {
                Some(Message::Result(result)) => Ok(Some(result)),
                _ => Ok(None),
            },
            Some(_) => Err(self.wrong_message("result")),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn peek_marker(&self) -> Result<Option<Marker>, ProtocolError> {
        match self.buffer.first() {
            Some(&first) => Marker::try_from(first & !COMPRESSED_FLAG).map(Some),
            None => Ok(None),
        }
    }

    fn wrong_message(&self, expected: &'static str) -> ProtocolError {
        ProtocolError::UnexpectedMarker {
            expected,
            found: self.buffer[0],
        }
    }

    /// Total length of the next message if it is fully buffered.
    fn message_extent(buf: &[u8]) -> Result<Option<usize>, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        // Reject garbage before waiting on a bogus length.
        Marker::try_from(buf[0] & !COMPRESSED_FLAG)?;

        let len = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::TooLarge {
                what: "message",
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }

        let total = HEADER_SIZE + len;
        if buf.len() < total {
            return Ok(None);
        }
        Ok(Some(total))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
