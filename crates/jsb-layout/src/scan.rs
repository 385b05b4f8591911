//! Key-token scanning.
//!
//! Keys are stored as a length byte followed by the key text, or as one of the
//! prefix markers `0x2A`/`0x4A`/`0x5A`/`0x6A` followed by the length byte.
//! After the key comes a [tag](crate::tags). Walking these tokens recovers the
//! offset and type of every scalar in a region without knowing the container
//! structure around it.
//!
//! The walk is a heuristic: bytes that do not start a plausible token are
//! skipped one at a time until the stream lines up again. Fields found this way
//! still have to pass the round-trip validator before anyone trusts them.

use std::collections::HashMap;

use crate::tags::{read_tag_int, read_tagged, Tagged, TaggedValue};
use crate::{FieldDescriptor, ScanRegion, TagDialect};

/// Markers that announce a separate key length byte.
pub const KEY_PREFIX_MARKERS: [u8; 4] = [0x2A, 0x4A, 0x5A, 0x6A];

/// Longest key text accepted.
pub const MAX_KEY_LEN: usize = 96;

/// A key followed by a scalar value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedKey {
    /// Key text.
    pub key: String,
    /// Offset of the first key byte.
    pub key_offset: usize,
    /// Key of the most recent container opened before this key.
    pub section: Option<String>,
    /// Location and type of the value.
    pub value: TaggedValue,
}

/// Walk the key tokens in `data[start..end]`.
///
/// Only values that end at or before `end` are returned.
pub fn scan_keys(data: &[u8], start: usize, end: usize, dialect: TagDialect) -> Vec<ScannedKey> {
    scan_keys_with(data, start, end, dialect, &[])
}

/// Like [`scan_keys`], reading the values of `tag_int_keys` with
/// [`read_tag_int`].
pub fn scan_keys_with(
    data: &[u8],
    start: usize,
    end: usize,
    dialect: TagDialect,
    tag_int_keys: &[String],
) -> Vec<ScannedKey> {
    let end = end.min(data.len());
    let mut keys = Vec::new();
    let mut section: Option<String> = None;
    let mut pos = start;

    while pos.saturating_add(2) < end {
        let Some((key_offset, key_len)) = key_header(data, pos) else {
            pos += 1;
            continue;
        };

        let tag_offset = key_offset + key_len;
        let key = match data.get(key_offset..tag_offset) {
            Some(bytes) if bytes.iter().all(u8::is_ascii_graphic) => {
                String::from_utf8_lossy(bytes).into_owned()
            }
            _ => {
                pos += 1;
                continue;
            }
        };

        let tagged = if tag_int_keys.iter().any(|k| *k == key) {
            read_tag_int(data, tag_offset, dialect)
        } else {
            read_tagged(data, tag_offset, dialect)
        };

        match tagged {
            Ok(Tagged::Value(value)) if value.end() <= end => {
                pos = value.end();
                keys.push(ScannedKey {
                    key,
                    key_offset,
                    section: section.clone(),
                    value,
                });
            }
            Ok(Tagged::Value(_)) => break,
            Ok(Tagged::Container) => {
                section = Some(key);
                pos = tag_offset + 1;
            }
            Ok(Tagged::Other(_)) => pos = tag_offset + 1,
            // Truncated or undecodable value: not a real token.
            Err(_) => pos += 1,
        }
    }

    keys
}

/// Offset and length of the key text of a token starting at `pos`.
fn key_header(data: &[u8], pos: usize) -> Option<(usize, usize)> {
    let mark = *data.get(pos)?;
    let (key_offset, key_len) = if KEY_PREFIX_MARKERS.contains(&mark) {
        (pos + 2, *data.get(pos + 1)? as usize)
    } else {
        (pos + 1, mark as usize)
    };

    (1..=MAX_KEY_LEN).contains(&key_len).then_some((key_offset, key_len))
}

/// Names already handed out, so that repeats get a `#n` suffix.
#[derive(Debug, Default)]
pub struct FieldNames {
    seen: HashMap<String, usize>,
}

impl FieldNames {
    /// `name` on first use, `name#n` on the n-th.
    pub fn claim(&mut self, name: String) -> String {
        let count = self.seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            format!("{name}#{count}")
        } else {
            name
        }
    }
}

/// Scan a region and turn every scalar into a field descriptor.
///
/// Names are `group.section.key`, leaving out the parts that are absent.
/// Repeated names get a `#2`, `#3`, ... suffix in file order.
pub fn scan_fields(data: &[u8], region: &ScanRegion, dialect: TagDialect) -> Vec<FieldDescriptor> {
    scan_fields_named(data, region, dialect, &mut FieldNames::default())
}

/// Like [`scan_fields`], numbering repeats across every region sharing `names`.
pub fn scan_fields_named(
    data: &[u8],
    region: &ScanRegion,
    dialect: TagDialect,
    names: &mut FieldNames,
) -> Vec<FieldDescriptor> {
    let end = region.end.unwrap_or(data.len());

    scan_keys_with(data, region.start, end, dialect, &region.tag_ints)
        .into_iter()
        .map(|scanned| {
            let mut name = String::new();
            for part in [region.group.as_deref(), scanned.section.as_deref()].into_iter().flatten() {
                name.push_str(part);
                name.push('.');
            }
            name.push_str(&scanned.key);

            FieldDescriptor::new(names.claim(name), scanned.value.offset, scanned.value.ty)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldType;

    fn token(out: &mut Vec<u8>, key: &str, tag: u8, value: &[u8]) {
        out.push(key.len() as u8);
        out.extend_from_slice(key.as_bytes());
        out.push(tag);
        out.extend_from_slice(value);
    }

    #[test]
    fn test_scan_ints_and_sections() {
        let mut data = vec![0x00, 0xFF];
        token(&mut data, "ME_PACK_VERSION_YEAR", 0x02, &24i32.to_le_bytes());
        token(&mut data, "TEAM_PICKING_STYLE::TPS_SEMI_RESERVE_PICKING", 0x0A, &[]);
        token(&mut data, "simatchshared::TSF_CA", 0x02, &100i32.to_le_bytes());
        token(&mut data, "simatchshared::TSF_PA", 0x02, &50i32.to_le_bytes());

        let keys = scan_keys(&data, 0, data.len(), TagDialect::Plain);
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0].key, "ME_PACK_VERSION_YEAR");
        assert_eq!(keys[0].section, None);
        assert_eq!(keys[0].key_offset, 3);
        assert_eq!(keys[0].value.offset, 3 + 20 + 1);
        assert_eq!(
            keys[1].section.as_deref(),
            Some("TEAM_PICKING_STYLE::TPS_SEMI_RESERVE_PICKING")
        );
        assert_eq!(&data[keys[2].value.offset..keys[2].value.end()], &50i32.to_le_bytes());
    }

    #[test]
    fn test_prefix_marker() {
        let mut data = vec![0x4A, 5];
        data.extend_from_slice(b"value");
        data.push(0x02);
        data.extend_from_slice(&(-650i32).to_le_bytes());

        let keys = scan_keys(&data, 0, data.len(), TagDialect::ShortStrings);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key, "value");
        assert_eq!(keys[0].value.offset, 8);
    }

    #[test]
    fn test_short_strings() {
        let mut data = Vec::new();
        token(&mut data, "name", 0x87, b"Neutral");
        token(&mut data, "value", 0x02, &1000i32.to_le_bytes());

        let keys = scan_keys(&data, 0, data.len(), TagDialect::ShortStrings);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].value.ty, FieldType::FixedString { width: 7, pad: 0 });
        assert_eq!(&data[keys[0].value.offset..keys[0].value.end()], b"Neutral");
    }

    /// `role_data` rows: a label under `name`, a coefficient under `value`.
    fn role_rows() -> Vec<u8> {
        let mut data = Vec::new();
        token(&mut data, "role_data", 0x09, &3u32.to_le_bytes());
        for (label, tag, value) in [
            (&b"Neutral"[..], 0x85, &[][..]),
            (b"Attack", 0xC9, &[]),
            (b"Defend", 0x02, &7i32.to_le_bytes()[..]),
        ] {
            data.push(b':');
            token(&mut data, "name", 0x80 | label.len() as u8, label);
            token(&mut data, "value", tag, value);
        }
        data
    }

    #[test]
    fn test_role_coefficients_in_tag_byte() {
        let data = role_rows();
        let keys = scan_keys_with(&data, 0, data.len(), TagDialect::ShortStrings, &["value".to_string()]);

        let found: Vec<_> = keys.iter().map(|k| (k.key.as_str(), k.value.ty)).collect();
        assert_eq!(
            found,
            [
                ("name", FieldType::FixedString { width: 7, pad: 0 }),
                ("value", FieldType::TagInt),
                ("name", FieldType::FixedString { width: 6, pad: 0 }),
                ("value", FieldType::TagInt),
                ("name", FieldType::FixedString { width: 6, pad: 0 }),
                ("value", FieldType::Int32LE),
            ]
        );
        assert!(keys.iter().all(|k| k.section.as_deref() == Some("role_data")));

        // The tag byte is the value; the next key starts right after it.
        assert_eq!(data[keys[1].value.offset], 0x85);
        assert_eq!(data[keys[3].value.offset], 0xC9);
        assert_eq!(keys[2].key_offset, keys[1].value.end() + 2);
        assert_eq!(&data[keys[5].value.offset..keys[5].value.end()], &7i32.to_le_bytes());
    }

    #[test]
    fn test_region_near_usize_max() {
        let data = [4u8, b'a', b'b', b'c', b'd', 0x02];
        assert!(scan_keys(&data, usize::MAX - 1, usize::MAX, TagDialect::Plain).is_empty());
    }

    #[test]
    fn test_names_shared_across_regions() {
        let mut data = Vec::new();
        token(&mut data, "value", 0x02, &1i32.to_le_bytes());
        let split = data.len();
        token(&mut data, "value", 0x02, &2i32.to_le_bytes());

        let region = |start, end| ScanRegion {
            group: None,
            start,
            end: Some(end),
            tag_ints: Vec::new(),
        };
        let mut names = FieldNames::default();
        let first = scan_fields_named(&data, &region(0, split), TagDialect::Plain, &mut names);
        let second = scan_fields_named(&data, &region(split, data.len()), TagDialect::Plain, &mut names);
        assert_eq!(first[0].name(), "value");
        assert_eq!(second[0].name(), "value#2");
    }

    #[test]
    fn test_value_past_end_is_dropped() {
        let mut data = Vec::new();
        token(&mut data, "a", 0x02, &1i32.to_le_bytes());
        token(&mut data, "b", 0x02, &2i32.to_le_bytes());

        let keys = scan_keys(&data, 0, data.len() - 1, TagDialect::Plain);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key, "a");
    }

    #[test]
    fn test_field_names_deduplicated() {
        let mut data = Vec::new();
        token(&mut data, "coefficients", 0x09, &[]);
        token(&mut data, "value", 0x02, &600i32.to_le_bytes());
        token(&mut data, "value", 0x02, &100i32.to_le_bytes());
        token(&mut data, "value", 0x02, &200i32.to_le_bytes());

        let region = ScanRegion {
            group: Some("fm24".to_string()),
            start: 0,
            end: None,
            tag_ints: Vec::new(),
        };
        let fields = scan_fields(&data, &region, TagDialect::ShortStrings);
        let names: Vec<_> = fields.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            ["fm24.coefficients.value", "fm24.coefficients.value#2", "fm24.coefficients.value#3"]
        );
        assert!(fields.iter().all(|f| f.key().is_none()));
    }
}
