//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when encoding or decoding protocol data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Data is too short to hold the expected field.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length available.
        actual: usize,
    },

    /// The header's total size does not even cover the header itself.
    #[error("message total size ({total_size} bytes) is smaller than the header ({header_size} bytes)")]
    HeaderUnderflow {
        /// Total size field as received.
        total_size: u64,
        /// Fixed header size.
        header_size: usize,
    },

    /// Output buffer cannot hold the encoded data.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes the encoding needs.
        needed: usize,
        /// Bytes the buffer offers.
        available: usize,
    },

    /// A C-string field is missing its NUL terminator.
    #[error("unterminated string at offset {offset}")]
    Unterminated {
        /// Offset where the string starts.
        offset: usize,
    },

    /// A numeric field does not fit its 32-bit model type.
    #[error("field {field} out of range: {value:#x}")]
    FieldOverflow {
        /// Name of the field.
        field: &'static str,
        /// Value as received.
        value: u64,
    },

    /// UTF-8 decoding error.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::HeaderUnderflow {
            total_size: 4,
            header_size: 32,
        };
        assert!(err.to_string().contains("4 bytes"));

        let err = ProtocolError::FieldOverflow {
            field: "address",
            value: 0x1_0000_0000,
        };
        assert!(err.to_string().contains("0x100000000"));
    }
}
