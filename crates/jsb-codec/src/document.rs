//! Decoded documents.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::Path;

use jsb_common::crc;
use jsb_layout::{FileVariant, LayoutTable};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

use crate::{Result, Value};

/// Field values keyed by name, in insertion order.
///
/// Serialized as a JSON object whose key order is the layout order, and read
/// back in the order the keys appear. Replacing a value keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Set a value, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Remove a value, shifting later entries down.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let i = self.index.remove(name)?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let i = *self.index.get(name)?;
        Some(&mut self.entries[i].1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, Value)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct FieldMapVisitor;

        impl<'de> Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of field values")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<FieldMap, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut map = FieldMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    if map.contains_key(&name) {
                        return Err(serde::de::Error::custom(format!("duplicate field `{name}`")));
                    }
                    map.insert(name, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

/// A run of bytes no field covers, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueRegion {
    pub start: usize,
    pub bytes: Vec<u8>,
}

impl OpaqueRegion {
    pub fn new(start: usize, bytes: Vec<u8>) -> Self {
        Self { start, bytes }
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> usize {
        self.start + self.bytes.len()
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub variant: FileVariant,
    pub build: String,
    /// Length of the decoded file in bytes.
    pub length: usize,
    /// CRC32C of the decoded file, as `0x%08x`.
    pub crc32c: String,
}

impl SourceInfo {
    /// Fingerprint `data` as decoded with `layout`.
    pub fn new(layout: &LayoutTable, data: &[u8]) -> Self {
        Self {
            variant: layout.variant(),
            build: layout.build().to_string(),
            length: data.len(),
            crc32c: crc::format_hash(crc::hash_bytes(data)),
        }
    }

    /// Whether `data` is the file this fingerprint was taken from.
    pub fn matches(&self, data: &[u8]) -> bool {
        self.length == data.len() && crc::parse_hash(&self.crc32c) == Some(crc::hash_bytes(data))
    }
}

/// The result of decoding a file: named values plus the bytes in between.
///
/// Only `source` and `fields` are written to JSON. Opaque regions live in the
/// original file; a document read back from JSON is encoded against that file
/// (see [`encode_against`](crate::encode_against)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedDocument {
    pub source: SourceInfo,
    pub fields: FieldMap,
    #[serde(skip)]
    pub opaque: Vec<OpaqueRegion>,
}

impl DecodedDocument {
    /// Total opaque bytes.
    pub fn opaque_bytes(&self) -> usize {
        self.opaque.iter().map(OpaqueRegion::len).sum()
    }

    /// Parse a document from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the document as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a document from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_map_order() {
        let mut map = FieldMap::new();
        map.insert("walk_speed", Value::Int(10));
        map.insert("jog_speed", Value::Int(35));
        map.insert("acceleration_scaler", Value::Float(1.5));

        assert_eq!(map.insert("jog_speed", Value::Int(40)), Some(Value::Int(35)));
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, ["walk_speed", "jog_speed", "acceleration_scaler"]);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"walk_speed":10,"jog_speed":40,"acceleration_scaler":1.5}"#);
    }

    #[test]
    fn test_field_map_reads_in_order() {
        let map: FieldMap = serde_json::from_str(r#"{"z": 1, "a": "x", "m": 2.5}"#).unwrap();
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
        assert_eq!(map.get("a"), Some(&Value::Text("x".into())));
    }

    #[test]
    fn test_field_map_rejects_duplicates() {
        assert!(serde_json::from_str::<FieldMap>(r#"{"a": 1, "a": 2}"#).is_err());
    }

    #[test]
    fn test_field_map_remove() {
        let mut map: FieldMap = [("a", 1), ("b", 2), ("c", 3)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::Int(v)))
            .collect();

        assert_eq!(map.remove("a"), Some(Value::Int(1)));
        assert_eq!(map.get("c"), Some(&Value::Int(3)));
        assert_eq!(map.len(), 2);
        assert_eq!(map.remove("a"), None);
    }

    #[test]
    fn test_source_fingerprint() {
        let layout = LayoutTable::new(FileVariant::Weights, "fm24", Vec::new()).unwrap();
        let data = b"123456789";
        let source = SourceInfo::new(&layout, data);
        assert_eq!(source.crc32c, "0xe3069283");
        assert!(source.matches(data));
        assert!(!source.matches(b"123456780"));
    }

    #[test]
    fn test_document_json_skips_opaque() {
        let layout = LayoutTable::new(FileVariant::Weights, "fm24", Vec::new()).unwrap();
        let doc = DecodedDocument {
            source: SourceInfo::new(&layout, &[1, 2, 3]),
            fields: FieldMap::new(),
            opaque: vec![OpaqueRegion::new(0, vec![1, 2, 3])],
        };

        let json = doc.to_json().unwrap();
        assert!(!json.contains("opaque"));

        let back = DecodedDocument::from_json(&json).unwrap();
        assert_eq!(back.source, doc.source);
        assert!(back.opaque.is_empty());
    }
}
