//! Value type tags.
//!
//! In a `.jsb` file every key text is followed by a one-byte tag that tells
//! how the value after it is stored:
//!
//! | tag | value |
//! |---|---|
//! | `0x02` | `i32` little-endian |
//! | `0x03` | `i64` little-endian |
//! | `0x08` | `u32` length, then that many UTF-8 bytes |
//! | `0x09`, `0x0A`, `0x99`, `0xC9` | container (array or object) follows |
//!
//! The `0x80..=0x8F` range means different things in different files: the
//! physics file packs small integers into one byte (bit 7 set, low nibble 2),
//! while the ratings file stores strings of up to 15 bytes there. Which reading
//! applies is picked per layout with a [`TagDialect`].
//!
//! Some keys never use the tag for a type at all when their value is small:
//! the ratings file stores role coefficients as `0x80 | v` for `0..=63` and
//! `0xC0 | -v` for `-63..=-1`, with no value bytes after the tag. Those keys
//! are read with [`read_tag_int`].

use jsb_common::ByteCursor;
use serde::{Deserialize, Serialize};

use crate::{FieldType, Result};

pub const TAG_INT32: u8 = 0x02;
pub const TAG_INT64: u8 = 0x03;
pub const TAG_LONG_STRING: u8 = 0x08;
pub const CONTAINER_TAGS: [u8; 4] = [0x09, 0x0A, 0x99, 0xC9];

/// Largest magnitude a tag byte can hold.
pub const TAG_INT_MAX: i64 = 63;

const TAG_INT_MIN: i64 = -TAG_INT_MAX;

/// Value held in a tag byte, or `None` below `0x80`.
///
/// `0xC0` reads as zero but is never written back; zero is stored as `0x80`.
pub const fn tag_int_value(tag: u8) -> Option<i64> {
    match tag {
        0x80..=0xBF => Some((tag - 0x80) as i64),
        0xC0..=0xFF => Some(-((tag - 0xC0) as i64)),
        _ => None,
    }
}

/// Tag byte holding `value`, or `None` outside `-63..=63`.
pub const fn tag_int_byte(value: i64) -> Option<u8> {
    match value {
        0..=TAG_INT_MAX => Some(0x80 | value as u8),
        TAG_INT_MIN..=-1 => Some(0xC0 | (-value) as u8),
        _ => None,
    }
}

/// How to read the `0x80..=0x8F` tag range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagDialect {
    /// Only the unambiguous tags are understood.
    #[default]
    Plain,
    /// Bit 7 set with low nibble `2`: one-byte unsigned integer.
    CompactInts,
    /// `0x80 | len`: short string of `len` bytes.
    ShortStrings,
}

/// What a tag byte announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    Int32,
    Int64,
    LongString,
    ShortString(u8),
    CompactInt,
    Container,
    Unknown(u8),
}

impl TagDialect {
    /// Classify a tag byte.
    pub fn classify(self, tag: u8) -> ValueTag {
        match tag {
            TAG_INT32 => ValueTag::Int32,
            TAG_INT64 => ValueTag::Int64,
            TAG_LONG_STRING => ValueTag::LongString,
            t if CONTAINER_TAGS.contains(&t) => ValueTag::Container,
            t if self == TagDialect::CompactInts && t & 0x80 != 0 && t & 0x0F == 0x02 => {
                ValueTag::CompactInt
            }
            t if self == TagDialect::ShortStrings && (0x80..=0x8F).contains(&t) => {
                ValueTag::ShortString(t & 0x0F)
            }
            t => ValueTag::Unknown(t),
        }
    }
}

/// A scalar value located by its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedValue {
    /// Offset of the first value byte.
    pub offset: usize,
    /// How the value is stored.
    pub ty: FieldType,
}

impl TaggedValue {
    /// Offset one past the value.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.ty.width())
    }
}

/// Result of reading the tag that follows a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tagged {
    /// A scalar the codec can expose as a field.
    Value(TaggedValue),
    /// A nested object or array.
    Container,
    /// Anything else, including empty strings.
    Other(u8),
}

/// Read the tag at `tag_offset` and locate the value it announces.
///
/// Fails with `OutOfBounds` when the tag or the announced value runs past the
/// end of `data`. String values must be valid UTF-8.
pub fn read_tagged(data: &[u8], tag_offset: usize, dialect: TagDialect) -> Result<Tagged> {
    let mut cursor = ByteCursor::new(data);
    cursor.seek(tag_offset)?;
    let tag = cursor.read_u8()?;

    let ty = match dialect.classify(tag) {
        ValueTag::Int32 => FieldType::Int32LE,
        ValueTag::Int64 => FieldType::Int64LE,
        ValueTag::CompactInt => FieldType::UInt8,
        ValueTag::LongString => {
            let width = cursor.read_u32_le()? as usize;
            string_type(width)
        }
        ValueTag::ShortString(width) => string_type(width as usize),
        ValueTag::Container => return Ok(Tagged::Container),
        ValueTag::Unknown(tag) => return Ok(Tagged::Other(tag)),
    };

    if ty.width() == 0 {
        return Ok(Tagged::Other(tag));
    }

    // Make sure the whole value is present, and strings decode.
    let offset = cursor.position();
    if let FieldType::FixedString { width, pad } = ty {
        cursor.read_fixed_string(width, pad)?;
    } else {
        cursor.read_bytes(ty.width())?;
    }

    Ok(Tagged::Value(TaggedValue { offset, ty }))
}

/// Read the tag after a key whose small values live in the tag byte.
///
/// Tags from `0x80` up are the value itself, except `0xC0` (a second zero that
/// would not survive re-encoding) which is left as [`Tagged::Other`]. Lower
/// tags are read as by [`read_tagged`].
pub fn read_tag_int(data: &[u8], tag_offset: usize, dialect: TagDialect) -> Result<Tagged> {
    let mut cursor = ByteCursor::new(data);
    cursor.seek(tag_offset)?;

    match cursor.read_u8()? {
        0xC0 => Ok(Tagged::Other(0xC0)),
        tag if tag_int_value(tag).is_some() => Ok(Tagged::Value(TaggedValue {
            offset: tag_offset,
            ty: FieldType::TagInt,
        })),
        _ => read_tagged(data, tag_offset, dialect),
    }
}

fn string_type(width: usize) -> FieldType {
    FieldType::FixedString { width, pad: 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_dialects() {
        assert_eq!(TagDialect::Plain.classify(0x02), ValueTag::Int32);
        assert_eq!(TagDialect::Plain.classify(0x82), ValueTag::Unknown(0x82));
        assert_eq!(TagDialect::CompactInts.classify(0x82), ValueTag::CompactInt);
        assert_eq!(TagDialect::CompactInts.classify(0xA2), ValueTag::CompactInt);
        assert_eq!(TagDialect::ShortStrings.classify(0x82), ValueTag::ShortString(2));
        assert_eq!(TagDialect::ShortStrings.classify(0xC9), ValueTag::Container);
        assert_eq!(TagDialect::CompactInts.classify(0x99), ValueTag::Container);
    }

    #[test]
    fn test_read_int32() {
        let data = [0x02, 0x0A, 0x00, 0x00, 0x00];
        let tagged = read_tagged(&data, 0, TagDialect::Plain).unwrap();
        assert_eq!(
            tagged,
            Tagged::Value(TaggedValue {
                offset: 1,
                ty: FieldType::Int32LE
            })
        );
    }

    #[test]
    fn test_read_long_string() {
        let mut data = vec![0xFF, 0x08, 0x05, 0x00, 0x00, 0x00];
        data.extend_from_slice(b"Goals");
        let tagged = read_tagged(&data, 1, TagDialect::ShortStrings).unwrap();
        match tagged {
            Tagged::Value(value) => {
                assert_eq!(value.offset, 6);
                assert_eq!(value.end(), 11);
                assert_eq!(value.ty, FieldType::FixedString { width: 5, pad: 0 });
            }
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_value() {
        let data = [0x03, 0x01, 0x02];
        assert!(read_tagged(&data, 0, TagDialect::Plain).is_err());
    }

    #[test]
    fn test_tag_int_bytes() {
        assert_eq!(tag_int_value(0x85), Some(5));
        assert_eq!(tag_int_value(0xBF), Some(63));
        assert_eq!(tag_int_value(0xC9), Some(-9));
        assert_eq!(tag_int_value(0xC0), Some(0));
        assert_eq!(tag_int_value(0x02), None);

        assert_eq!(tag_int_byte(5), Some(0x85));
        assert_eq!(tag_int_byte(0), Some(0x80));
        assert_eq!(tag_int_byte(-9), Some(0xC9));
        assert_eq!(tag_int_byte(-63), Some(0xFF));
        assert_eq!(tag_int_byte(64), None);
        assert_eq!(tag_int_byte(-64), None);
    }

    #[test]
    fn test_read_tag_int() {
        // value 0xC9: a coefficient of -9, not a container.
        let data = [0xC9, 0x04, b'n'];
        assert_eq!(
            read_tag_int(&data, 0, TagDialect::ShortStrings).unwrap(),
            Tagged::Value(TaggedValue {
                offset: 0,
                ty: FieldType::TagInt
            })
        );

        let data = [0x02, 0x07, 0x00, 0x00, 0x00];
        assert_eq!(
            read_tag_int(&data, 0, TagDialect::ShortStrings).unwrap(),
            Tagged::Value(TaggedValue {
                offset: 1,
                ty: FieldType::Int32LE
            })
        );

        assert_eq!(read_tag_int(&[0xC0], 0, TagDialect::ShortStrings).unwrap(), Tagged::Other(0xC0));
    }

    #[test]
    fn test_empty_string_is_not_a_field() {
        let data = [0x80, 0x00];
        assert_eq!(
            read_tagged(&data, 0, TagDialect::ShortStrings).unwrap(),
            Tagged::Other(0x80)
        );
    }
}
