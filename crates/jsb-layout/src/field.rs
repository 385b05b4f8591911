//! Field descriptors.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Storage type of a known field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Unsigned byte (the compact one-byte integer encoding).
    UInt8,
    /// Small signed integer held in the value tag byte itself, see
    /// [`tag_int_value`](crate::tags::tag_int_value).
    TagInt,
    /// Little-endian signed 32-bit integer.
    Int32LE,
    /// Little-endian signed 64-bit integer.
    Int64LE,
    /// Little-endian IEEE-754 single.
    Float32LE,
    /// Little-endian IEEE-754 double.
    Float64LE,
    /// UTF-8 text in a fixed-width slot, filled up with `pad`.
    FixedString { width: usize, pad: u8 },
}

impl FieldType {
    /// Width of the field in bytes.
    pub const fn width(&self) -> usize {
        match self {
            FieldType::UInt8 | FieldType::TagInt => 1,
            FieldType::Int32LE | FieldType::Float32LE => 4,
            FieldType::Int64LE | FieldType::Float64LE => 8,
            FieldType::FixedString { width, .. } => *width,
        }
    }

    /// Short type name used in layout files.
    pub const fn name(&self) -> &'static str {
        match self {
            FieldType::UInt8 => "u8",
            FieldType::TagInt => "tag_int",
            FieldType::Int32LE => "i32",
            FieldType::Int64LE => "i64",
            FieldType::Float32LE => "f32",
            FieldType::Float64LE => "f64",
            FieldType::FixedString { .. } => "string",
        }
    }

    /// Integer types.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldType::UInt8 | FieldType::TagInt | FieldType::Int32LE | FieldType::Int64LE
        )
    }

    /// Floating point types.
    pub const fn is_float(&self) -> bool {
        matches!(self, FieldType::Float32LE | FieldType::Float64LE)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::FixedString { width, .. } => write!(f, "string[{width}]"),
            other => f.write_str(other.name()),
        }
    }
}

/// A named field at a fixed byte offset.
///
/// Immutable once built. `key` is the key text the field was anchored on in
/// the file, when it differs from `name` (e.g. the second copy of a block).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawField", into = "RawField")]
pub struct FieldDescriptor {
    name: String,
    key: Option<String>,
    offset: usize,
    ty: FieldType,
}

impl FieldDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, offset: usize, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            key: None,
            offset,
            ty,
        }
    }

    /// Attach the key text the field was found under.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Field name (unique within a layout).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key text this field was anchored on, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Byte offset of the first value byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Storage type.
    pub fn ty(&self) -> FieldType {
        self.ty
    }

    /// Width in bytes.
    pub fn width(&self) -> usize {
        self.ty.width()
    }

    /// Offset one past the last value byte.
    ///
    /// Saturates at `usize::MAX`; layout files cannot describe such fields.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.width())
    }

    /// Byte range covered by this field.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    /// Whether `offset` falls inside this field.
    pub fn contains(&self, offset: usize) -> bool {
        self.range().contains(&offset)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TypeName {
    U8,
    #[serde(rename = "tag_int")]
    TagInt,
    I32,
    I64,
    F32,
    F64,
    String,
}

/// On-disk shape of a field entry.
#[derive(Serialize, Deserialize)]
struct RawField {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(with = "crate::offset")]
    offset: usize,
    #[serde(rename = "type")]
    ty: TypeName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pad: Option<u8>,
}

impl TryFrom<RawField> for FieldDescriptor {
    type Error = Error;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        let ty = match raw.ty {
            TypeName::U8 => FieldType::UInt8,
            TypeName::TagInt => FieldType::TagInt,
            TypeName::I32 => FieldType::Int32LE,
            TypeName::I64 => FieldType::Int64LE,
            TypeName::F32 => FieldType::Float32LE,
            TypeName::F64 => FieldType::Float64LE,
            TypeName::String => FieldType::FixedString {
                width: raw.width.ok_or_else(|| Error::MissingWidth(raw.name.clone()))?,
                pad: raw.pad.unwrap_or(0),
            },
        };

        if let Some(actual) = raw.width {
            if actual != ty.width() {
                return Err(Error::WidthMismatch {
                    field: raw.name,
                    ty: ty.name(),
                    expected: ty.width(),
                    actual,
                });
            }
        }
        if ty.width() == 0 {
            return Err(Error::ZeroWidth(raw.name));
        }
        if raw.offset.checked_add(ty.width()).is_none() {
            return Err(Error::OffsetOverflow {
                field: raw.name,
                offset: raw.offset,
            });
        }

        Ok(Self {
            name: raw.name,
            key: raw.key,
            offset: raw.offset,
            ty,
        })
    }
}

impl From<FieldDescriptor> for RawField {
    fn from(field: FieldDescriptor) -> Self {
        let (ty, width, pad) = match field.ty {
            FieldType::UInt8 => (TypeName::U8, None, None),
            FieldType::TagInt => (TypeName::TagInt, None, None),
            FieldType::Int32LE => (TypeName::I32, None, None),
            FieldType::Int64LE => (TypeName::I64, None, None),
            FieldType::Float32LE => (TypeName::F32, None, None),
            FieldType::Float64LE => (TypeName::F64, None, None),
            FieldType::FixedString { width, pad } => {
                (TypeName::String, Some(width), (pad != 0).then_some(pad))
            }
        };

        Self {
            name: field.name,
            key: field.key,
            offset: field.offset,
            ty,
            width,
            pad,
        }
    }
}
