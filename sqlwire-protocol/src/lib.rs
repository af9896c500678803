//! # sqlwire-protocol
//!
//! Binary wire format for moving SQL queries and their results between
//! processes.
//!
//! This crate provides:
//! - Typed scalar values (null, integer, double, text, blob)
//! - Named fields, rows and result sets built from them
//! - Parameterized queries with `?` placeholders
//! - An optional gzip envelope for queries and results
//! - Streaming encoder/decoder and an annotated hex dump for debugging
//!
//! Every unit is framed as `marker | u32 LE chunk_size | body`. Decoding never
//! panics: [`Codec::decode`] reports failure as zero consumed bytes and
//! [`Codec::try_decode`] returns the typed [`ProtocolError`].

pub mod codec;
pub mod compress;
pub mod error;
pub mod field;
pub mod inspect;
pub mod query;
pub mod result;
pub mod row;
pub mod value;
pub mod wire;

pub use codec::{Codec, Decoder, Encoder, Message};
pub use compress::CompressionPolicy;
pub use error::ProtocolError;
pub use field::Field;
pub use query::Query;
pub use result::ResultSet;
pub use row::Row;
pub use value::Value;
pub use wire::Marker;

/// Maximum size of a single buffered unit in the streaming decoder (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Maximum size a compressed payload may inflate to (16 MiB).
pub const MAX_DECOMPRESSED_SIZE: usize = 16 * 1024 * 1024;
