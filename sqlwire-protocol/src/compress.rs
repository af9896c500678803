//! gzip envelope for Query and Result.
//!
//! ```text
//! +----------------+----------------+-------------------------------+
//! | marker | 0x80  | compressed_len | gzip(body)                    |
//! | 1 byte         | u32 LE         | compressed_len bytes          |
//! +----------------+----------------+-------------------------------+
//! ```
//!
//! `body` is the plain encoding without the marker and without
//! `chunk_size`, so it starts directly at the count fields.

use crate::error::ProtocolError;
use crate::wire::{self, checked_u32, is_compressed, Chunk, Reader, COMPRESSED_FLAG, HEADER_SIZE};
use bytes::{BufMut, BytesMut};
use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Default gzip level (fastest), matching what the format was tuned for.
pub const DEFAULT_LEVEL: u32 = 1;

/// Default payload size from which compression pays off.
pub const DEFAULT_THRESHOLD: usize = 1024;

/// gzip-compresses `plain`.
pub fn compress(plain: &[u8], level: u32) -> Result<Vec<u8>, ProtocolError> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(plain.len() / 2 + 32),
        Compression::new(level.min(9)),
    );
    encoder.write_all(plain).map_err(ProtocolError::Compress)?;
    encoder.finish().map_err(ProtocolError::Compress)
}

/// Decompresses a single gzip member, refusing to produce more than `max` bytes.
///
/// The member must fill `compressed` exactly.
pub fn decompress(compressed: &[u8], max: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut plain = Vec::new();
    let mut decoder = GzDecoder::new(compressed);
    (&mut decoder)
        .take(max as u64 + 1)
        .read_to_end(&mut plain)
        .map_err(ProtocolError::Decompress)?;

    if plain.len() > max {
        return Err(ProtocolError::DecompressedTooLarge { max });
    }

    let rest = decoder.into_inner();
    if !rest.is_empty() {
        return Err(ProtocolError::LengthMismatch {
            unit: "compressed payload",
            declared: compressed.len(),
            actual: compressed.len() - rest.len(),
        });
    }
    Ok(plain)
}

/// Decides whether an outgoing message is compressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionPolicy {
    /// Whether compression is used at all.
    pub enabled: bool,
    /// Plain encodings shorter than this stay uncompressed.
    pub threshold: usize,
    /// gzip level, 0-9.
    pub level: u32,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
            level: DEFAULT_LEVEL,
        }
    }
}

impl CompressionPolicy {
    /// Never compress.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Compress every message regardless of size.
    pub fn always() -> Self {
        Self {
            threshold: 0,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Returns whether a message with the given plain length should be compressed.
    pub fn should_compress(&self, plain_len: usize) -> bool {
        self.enabled && plain_len >= self.threshold
    }
}

pub(crate) fn encode_compressed<T: Chunk>(chunk: &T, level: u32) -> Result<BytesMut, ProtocolError> {
    let mut body = BytesMut::with_capacity(chunk.body_len());
    chunk.encode_body(&mut body)?;

    let compressed = compress(&body, level)?;
    let len = checked_u32(compressed.len(), "compressed payload")?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + compressed.len());
    buf.put_u8(T::MARKER.compressed());
    buf.put_u32_le(len);
    buf.put_slice(&compressed);
    Ok(buf)
}

pub(crate) fn encode_with_policy<T: Chunk>(
    chunk: &T,
    policy: &CompressionPolicy,
) -> Result<BytesMut, ProtocolError> {
    let plain_len = wire::chunk_encoded_len(chunk);
    if policy.should_compress(plain_len) {
        return encode_compressed(chunk, policy.level);
    }

    let mut buf = BytesMut::with_capacity(plain_len);
    wire::encode_chunk(chunk, &mut buf)?;
    Ok(buf)
}

pub(crate) fn decode_compressed<T: Chunk>(
    buf: &[u8],
    max_decompressed: usize,
) -> Result<(T, usize), ProtocolError> {
    let mut reader = Reader::new(buf);
    let found = reader.read_u8()?;
    if found != T::MARKER.compressed() {
        return Err(ProtocolError::UnexpectedMarker {
            expected: T::MARKER.name(),
            found,
        });
    }

    let len = reader.read_u32()? as usize;
    let compressed = reader.read_bytes(len)?;
    let plain = decompress(compressed, max_decompressed)?;

    let mut body = Reader::new(&plain);
    let value = T::decode_body(&mut body)?;
    body.finish(T::MARKER.name(), plain.len())?;

    Ok((value, reader.position()))
}

/// Decodes the plain or compressed form, dispatching on bit 7 of the first byte.
pub(crate) fn decode_either<T: Chunk>(
    buf: &[u8],
    max_decompressed: usize,
) -> Result<(T, usize), ProtocolError> {
    match buf.first() {
        Some(&first) if is_compressed(first) => decode_compressed(buf, max_decompressed),
        _ => wire::decode_chunk(buf),
    }
}

/// Returns whether `byte` is the compressed form of some marker.
pub fn is_compressed_marker(byte: u8) -> bool {
    is_compressed(byte) && wire::Marker::try_from(byte & !COMPRESSED_FLAG).is_ok()
}
