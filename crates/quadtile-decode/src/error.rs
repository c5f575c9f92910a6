//! Error types for decoding operations.

use std::fmt;

/// Errors that can occur while decoding tile imagery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input buffer is too small for the expected data.
    BufferTooSmall { expected: usize, actual: usize },
    /// The data does not start with a known image signature.
    UnknownFormat,
    /// The image codec rejected the data.
    InvalidImage {
        context: &'static str,
        detail: String,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { expected, actual } => {
                write!(
                    f,
                    "buffer too small: expected {expected} bytes, got {actual}"
                )
            }
            Self::UnknownFormat => write!(f, "unknown image format signature"),
            Self::InvalidImage { context, detail } => {
                write!(f, "invalid {context} image: {detail}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
