//! Layout recipes: how to find the fields of a variant in a concrete file.

use std::fs;
use std::path::Path;

use jsb_common::ByteCursor;
use serde::{Deserialize, Serialize};

use crate::scan::{scan_fields_named, FieldNames};
use crate::tags::{read_tagged, Tagged};
use crate::{Error, FieldDescriptor, FileVariant, LayoutTable, Result, TagDialect};

/// A field located through the offset of its key text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAnchor {
    /// Field name in the resolved layout.
    pub name: String,
    /// Key text in the file; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Offset of the first byte of the key text.
    #[serde(with = "crate::offset")]
    pub key_offset: usize,
}

impl KeyAnchor {
    /// Key text expected at `key_offset`.
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }
}

/// A byte range whose key tokens are scanned for fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRegion {
    /// Prefix for the names of fields found in the region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// First byte of the region (a key length byte or prefix marker).
    #[serde(with = "crate::offset")]
    pub start: usize,
    /// End of the region (exclusive); the end of the file when absent.
    #[serde(default, with = "crate::offset::option", skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
    /// Keys whose small values are held in the tag byte, see
    /// [`read_tag_int`](crate::tags::read_tag_int).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ints: Vec<String>,
}

/// Everything known about where a variant keeps its values, for one build.
///
/// A recipe is data. It becomes a [`LayoutTable`] once resolved against the
/// bytes of a file: anchors are checked against the key text found there and
/// the tag after each key decides the field type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRecipe {
    pub variant: FileVariant,
    pub build: String,
    #[serde(default)]
    pub tags: TagDialect,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<KeyAnchor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scans: Vec<ScanRegion>,
}

impl LayoutRecipe {
    /// Parse a recipe from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a recipe from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Resolve the recipe against file contents.
    ///
    /// Fails with `AnchorMismatch` when an anchor's key text is not where the
    /// recipe says (wrong variant or a different game build), and with
    /// `OutOfBounds` when the file is too short. Anchored keys whose tag is not
    /// a scalar are left out of the layout and stay opaque.
    pub fn resolve(&self, data: &[u8]) -> Result<LayoutTable> {
        let mut fields = Vec::with_capacity(self.anchors.len());

        for anchor in &self.anchors {
            if let Some(field) = self.resolve_anchor(data, anchor)? {
                fields.push(field);
            }
        }

        let mut names = FieldNames::default();
        for region in &self.scans {
            let found = scan_fields_named(data, region, self.tags, &mut names);
            tracing::debug!(
                group = region.group.as_deref().unwrap_or(""),
                start = region.start,
                fields = found.len(),
                "scanned region"
            );
            fields.extend(found);
        }

        let layout = LayoutTable::new(self.variant, self.build.clone(), fields)?;
        tracing::debug!(
            variant = %self.variant,
            build = %self.build,
            fields = layout.len(),
            "resolved layout"
        );
        Ok(layout)
    }

    fn resolve_anchor(&self, data: &[u8], anchor: &KeyAnchor) -> Result<Option<FieldDescriptor>> {
        let key = anchor.key();
        let mut cursor = ByteCursor::new(data);
        cursor.seek(anchor.key_offset)?;

        let found = cursor.read_bytes(key.len())?;
        if found != key.as_bytes() {
            return Err(Error::AnchorMismatch {
                name: anchor.name.clone(),
                offset: anchor.key_offset,
                expected: key.to_string(),
                found: String::from_utf8_lossy(found).into_owned(),
            });
        }

        match read_tagged(data, anchor.key_offset + key.len(), self.tags)? {
            Tagged::Value(value) => {
                let field = FieldDescriptor::new(anchor.name.clone(), value.offset, value.ty);
                Ok(Some(field.with_key(key)))
            }
            Tagged::Container | Tagged::Other(_) => {
                tracing::debug!(name = %anchor.name, "anchored key holds no scalar, left opaque");
                Ok(None)
            }
        }
    }
}

/// Either a concrete layout table or a recipe, as found in a layout file.
#[derive(Debug, Clone)]
pub enum LayoutFile {
    Table(LayoutTable),
    Recipe(LayoutRecipe),
}

impl LayoutFile {
    /// Parse a layout file, telling tables (`fields`) from recipes
    /// (`anchors` / `scans`).
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let has = |key: &str| value.get(key).is_some();

        if has("fields") {
            Ok(LayoutFile::Table(serde_json::from_value(value)?))
        } else if has("anchors") || has("scans") {
            Ok(LayoutFile::Recipe(serde_json::from_value(value)?))
        } else {
            Err(Error::UnrecognisedLayoutFile)
        }
    }

    /// Load a layout file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Produce the layout table for a file.
    ///
    /// Tables are returned as they are; recipes are resolved against `data`.
    pub fn into_table(self, data: &[u8]) -> Result<LayoutTable> {
        match self {
            LayoutFile::Table(table) => Ok(table),
            LayoutFile::Recipe(recipe) => recipe.resolve(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldType;

    /// Two copies of the same block, like the physics file.
    fn sample() -> Vec<u8> {
        let mut data = vec![0xEE; 4];
        for _ in 0..2 {
            data.push(10);
            data.extend_from_slice(b"walk_speed");
            data.push(0x02);
            data.extend_from_slice(&10i32.to_le_bytes());
            data.push(9);
            data.extend_from_slice(b"jog_speed");
            data.push(0x92);
            data.push(35);
            data.push(7);
            data.extend_from_slice(b"version");
            data.push(0xC9);
        }
        data
    }

    fn recipe() -> LayoutRecipe {
        LayoutRecipe::from_json(
            r#"{
                "variant": "physical_constraints",
                "build": "test",
                "tags": "compact_ints",
                "anchors": [
                    { "name": "walk_speed", "key_offset": "0x05" },
                    { "name": "jog_speed", "key_offset": 21 },
                    { "name": "version", "key_offset": 33 },
                    { "name": "copy2.walk_speed", "key": "walk_speed", "key_offset": 42 }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_anchors() {
        let data = sample();
        let layout = recipe().resolve(&data).unwrap();

        assert_eq!(layout.len(), 3);
        let walk = layout.get("walk_speed").unwrap();
        assert_eq!(walk.offset(), 16);
        assert_eq!(walk.ty(), FieldType::Int32LE);
        assert_eq!(&data[walk.range()], &10i32.to_le_bytes());

        let jog = layout.get("jog_speed").unwrap();
        assert_eq!(jog.ty(), FieldType::UInt8);
        assert_eq!(data[jog.offset()], 35);

        let copy = layout.get("copy2.walk_speed").unwrap();
        assert_eq!(copy.key(), Some("walk_speed"));
        assert_eq!(&data[copy.range()], &10i32.to_le_bytes());

        // Container-tagged keys are not fields.
        assert!(layout.get("version").is_none());
    }

    #[test]
    fn test_anchor_mismatch() {
        let data = sample();
        let mut recipe = recipe();
        recipe.anchors[0].key_offset = 6;

        match recipe.resolve(&data) {
            Err(Error::AnchorMismatch { name, offset, .. }) => {
                assert_eq!(name, "walk_speed");
                assert_eq!(offset, 6);
            }
            other => panic!("expected AnchorMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_anchor_past_end() {
        let data = sample();
        let mut recipe = recipe();
        recipe.anchors[0].key_offset = data.len() + 10;
        assert!(matches!(
            recipe.resolve(&data),
            Err(Error::Common(jsb_common::Error::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_layout_file_kinds() {
        let table = r#"{"variant": "weights", "build": "fm24", "fields": []}"#;
        assert!(matches!(LayoutFile::from_json(table).unwrap(), LayoutFile::Table(_)));

        let recipe = r#"{"variant": "weights", "build": "fm24", "scans": [{"start": 0}]}"#;
        assert!(matches!(LayoutFile::from_json(recipe).unwrap(), LayoutFile::Recipe(_)));

        let neither = r#"{"variant": "weights", "build": "fm24"}"#;
        assert!(matches!(
            LayoutFile::from_json(neither),
            Err(Error::UnrecognisedLayoutFile)
        ));
    }
}
