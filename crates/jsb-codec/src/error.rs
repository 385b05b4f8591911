//! Error types for decoding, encoding and validation.

use thiserror::Error;

/// Errors that can occur in the codec.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Low-level cursor error (out of bounds, bad UTF-8).
    #[error("{0}")]
    Common(#[from] jsb_common::Error),

    /// Layout error.
    #[error("layout error: {0}")]
    Layout(#[from] jsb_layout::Error),

    /// Document JSON could not be parsed or written.
    #[error("document JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value does not fit the field it is meant for.
    #[error("field `{field}`: value {value} {constraint}")]
    FieldEncoding {
        field: String,
        value: String,
        constraint: String,
    },

    /// A tag-byte integer field holds a byte below `0x80`.
    #[error("byte {tag:#04x} at {offset:#x} is not a tag-byte integer")]
    NotTagInt { offset: usize, tag: u8 },

    /// A layout field has no value in the document.
    #[error("missing field: {0}")]
    MissingField(String),

    /// The document holds a value the layout does not know.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Opaque regions and field ranges do not tile the output exactly.
    #[error("bytes {start:#x}..{end:#x}: {problem}")]
    Tiling {
        start: usize,
        end: usize,
        problem: &'static str,
    },

    /// The original file is not the one the document was decoded from.
    #[error("document was decoded from {expected}, original file is {actual}")]
    SourceMismatch { expected: String, actual: String },

    /// Re-encoding a file did not reproduce it.
    #[error("round trip differs at {offset:#x}{}", in_field(.field))]
    LayoutMismatch { offset: usize, field: Option<String> },
}

impl Error {
    pub(crate) fn encoding(field: &str, value: impl ToString, constraint: impl Into<String>) -> Self {
        Error::FieldEncoding {
            field: field.to_string(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }
}

fn in_field(field: &Option<String>) -> String {
    field
        .as_deref()
        .map(|name| format!(" in field `{name}`"))
        .unwrap_or_default()
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
