//! Error types for jsb-common.

use thiserror::Error;

/// Low-level error raised by cursor operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A read, write or seek reached past the end of the buffer.
    #[error("out of bounds: {width} bytes at offset {offset:#x} exceed buffer length {len:#x}")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// A fixed-width string field did not hold valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset:#x}: {source}")]
    Utf8 {
        offset: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    /// A string does not fit its fixed width.
    #[error("string of {len} bytes does not fit fixed width {width}")]
    StringTooLong { len: usize, width: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
