//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or inspecting wire data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown marker: {0:#04x}")]
    UnknownMarker(u8),

    #[error("unexpected marker: expected {expected}, got {found:#04x}")]
    UnexpectedMarker { expected: &'static str, found: u8 },

    #[error("truncated input: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("{unit} length mismatch: declared {declared} bytes, parsed {actual}")]
    LengthMismatch {
        unit: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("invalid {kind} payload size: {size} bytes")]
    InvalidPayloadSize { kind: &'static str, size: usize },

    #[error("invalid UTF-8 in text value")]
    InvalidUtf8,

    #[error("{unit} declares {count} elements but only {available} bytes remain")]
    TooManyElements {
        unit: &'static str,
        count: usize,
        available: usize,
    },

    #[error("{what} too large: {size} (max {max})")]
    TooLarge {
        what: &'static str,
        size: usize,
        max: usize,
    },

    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("decompressed payload exceeds {max} bytes")]
    DecompressedTooLarge { max: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("placeholder mismatch: {placeholders} placeholder(s), {arguments} argument(s)")]
    PlaceholderMismatch {
        placeholders: usize,
        arguments: usize,
    },
}

impl ProtocolError {
    /// Returns whether this error means the input was incomplete rather than corrupt.
    ///
    /// Only meaningful for the outermost unit: a truncated unit nested inside a
    /// complete chunk is corruption.
    pub fn is_truncated(&self) -> bool {
        matches!(self, ProtocolError::Truncated { .. })
    }

    /// Returns whether this error was caused by malformed wire data.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownMarker(_)
                | ProtocolError::UnexpectedMarker { .. }
                | ProtocolError::Truncated { .. }
                | ProtocolError::LengthMismatch { .. }
                | ProtocolError::InvalidPayloadSize { .. }
                | ProtocolError::InvalidUtf8
                | ProtocolError::TooManyElements { .. }
                | ProtocolError::Decompress(_)
                | ProtocolError::DecompressedTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_classification() {
        assert!(ProtocolError::UnknownMarker(0x00).is_malformed());
        assert!(ProtocolError::InvalidUtf8.is_malformed());
        assert!(ProtocolError::Truncated {
            needed: 4,
            available: 1
        }
        .is_malformed());

        assert!(!ProtocolError::TypeMismatch {
            expected: "integer",
            found: "text"
        }
        .is_malformed());
        assert!(!ProtocolError::PlaceholderMismatch {
            placeholders: 1,
            arguments: 0
        }
        .is_malformed());
        assert!(!ProtocolError::TooLarge {
            what: "name",
            size: 70000,
            max: 65535
        }
        .is_malformed());
    }

    #[test]
    fn test_truncated_classification() {
        assert!(ProtocolError::Truncated {
            needed: 8,
            available: 3
        }
        .is_truncated());
        assert!(!ProtocolError::UnknownMarker(b'X').is_truncated());
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::UnknownMarker(0x58);
        assert!(err.to_string().contains("0x58"));

        let err = ProtocolError::UnexpectedMarker {
            expected: "row",
            found: b'F',
        };
        let msg = err.to_string();
        assert!(msg.contains("row"));
        assert!(msg.contains("0x46"));

        let err = ProtocolError::Truncated {
            needed: 10,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains('3'));

        let err = ProtocolError::LengthMismatch {
            unit: "field",
            declared: 20,
            actual: 18,
        };
        assert!(err.to_string().starts_with("field"));

        let err = ProtocolError::PlaceholderMismatch {
            placeholders: 2,
            arguments: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("2 placeholder"));
        assert!(msg.contains("1 argument"));

        let err = ProtocolError::DecompressedTooLarge { max: 1024 };
        assert!(err.to_string().contains("1024"));
    }
}
