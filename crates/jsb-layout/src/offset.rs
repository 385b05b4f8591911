//! Serde helpers for byte offsets.
//!
//! Offsets are written as `"0x00000B08"` hex strings so that layout files can be
//! compared against a hex editor at a glance. Plain integers are accepted too.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

pub fn serialize<S: Serializer>(offset: &usize, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{offset:#010X}"))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    deserializer.deserialize_any(OffsetVisitor)
}

struct OffsetVisitor;

impl<'de> Visitor<'de> for OffsetVisitor {
    type Value = usize;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a byte offset as an integer or a \"0x\" hex string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<usize, E> {
        usize::try_from(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<usize, E> {
        usize::try_from(v).map_err(|_| E::custom(format!("negative offset {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<usize, E> {
        parse(v).ok_or_else(|| E::custom(format!("invalid offset {v:?}")))
    }
}

/// Parse `0x`-prefixed hex or plain decimal.
pub fn parse(text: &str) -> Option<usize> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Same encoding for `Option<usize>`; `null` or absent means "not set".
pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(offset: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
        match offset {
            Some(offset) => super::serialize(offset, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super")] usize);

        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(offset)| offset))
    }
}
