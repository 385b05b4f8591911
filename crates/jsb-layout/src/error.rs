//! Error types for layout tables and recipes.

use thiserror::Error;

/// Errors that can occur when building, loading or resolving layouts.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] jsb_common::Error),

    /// Layout JSON could not be parsed.
    #[error("layout JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Two fields share a name.
    #[error("duplicate field name: {0}")]
    DuplicateField(String),

    /// Two fields cover the same bytes.
    #[error("field `{second}` at {second_offset:#x} overlaps field `{first}` ending at {first_end:#x}")]
    Overlap {
        first: String,
        first_end: usize,
        second: String,
        second_offset: usize,
    },

    /// A field with no bytes.
    #[error("field `{0}` has zero width")]
    ZeroWidth(String),

    /// Declared width does not agree with the field type.
    #[error("field `{field}`: type {ty} is {expected} bytes wide, layout says {actual}")]
    WidthMismatch {
        field: String,
        ty: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A field whose end does not fit in an offset.
    #[error("field `{field}` at {offset:#x} runs past the largest possible offset")]
    OffsetOverflow { field: String, offset: usize },

    /// A string field declared without a width.
    #[error("string field `{0}` needs a width")]
    MissingWidth(String),

    /// The key text at an anchor offset is not the expected key.
    #[error("anchor `{name}`: expected key {expected:?} at {offset:#x}, found {found:?}")]
    AnchorMismatch {
        name: String,
        offset: usize,
        expected: String,
        found: String,
    },

    /// Unrecognised file variant name.
    #[error("unknown file variant: {0}")]
    UnknownVariant(String),

    /// No recipe registered for a variant/build pair.
    #[error("no layout for {variant} build {build}")]
    UnknownBuild { variant: String, build: String },

    /// A layout file is neither a layout table nor a recipe.
    #[error("not a layout file: expected a `fields` or `anchors`/`scans` list")]
    UnrecognisedLayoutFile,
}

/// Result type for layout operations.
pub type Result<T> = std::result::Result<T, Error>;
