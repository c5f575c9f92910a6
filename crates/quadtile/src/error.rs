//! Error types for the quadtile crate.

use std::fmt;

/// Result type for quadtile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quadtile operations.
#[derive(Debug)]
pub enum Error {
    /// HTTP request failed.
    Http {
        /// The URL that failed.
        url: String,
        /// The error message.
        message: String,
    },
    /// HTTP response had a non-success status code.
    HttpStatus {
        /// The URL that returned the error.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
    /// Filesystem access failed.
    Io {
        /// The path being accessed.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },
    /// Tile image decoding failed.
    Decode(quadtile_decode::DecodeError),
    /// Persistent store operation failed.
    Store {
        /// The operation that failed.
        operation: &'static str,
        /// The error message.
        message: String,
    },
    /// A configuration value violates the level-set or cache contract.
    InvalidConfig {
        /// The configuration item.
        context: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// An argument passed to an operation was invalid.
    InvalidArgument {
        /// The argument or operation.
        context: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// The operation was cancelled cooperatively.
    Cancelled,
}

impl Error {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_config(context: &'static str, detail: impl Into<String>) -> Self {
        Error::InvalidConfig {
            context,
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid_argument(context: &'static str, detail: impl Into<String>) -> Self {
        Error::InvalidArgument {
            context,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http { url, message } => {
                write!(f, "http request to {url} failed: {message}")
            }
            Error::HttpStatus { url, status } => {
                write!(f, "http request to {url} returned status {status}")
            }
            Error::Io { path, source } => write!(f, "i/o error on {path}: {source}"),
            Error::Decode(e) => write!(f, "decode error: {e}"),
            Error::Store { operation, message } => {
                write!(f, "store {operation} failed: {message}")
            }
            Error::InvalidConfig { context, detail } => {
                write!(f, "invalid {context} configuration: {detail}")
            }
            Error::InvalidArgument { context, detail } => {
                write!(f, "invalid {context}: {detail}")
            }
            Error::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode(e) => Some(e),
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<quadtile_decode::DecodeError> for Error {
    fn from(e: quadtile_decode::DecodeError) -> Self {
        Error::Decode(e)
    }
}
