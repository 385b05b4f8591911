//! Layout tables.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, FieldDescriptor, FileVariant, Result};

/// The known fields of one file variant for one game build.
///
/// Fields are kept in increasing offset order and never overlap. Bytes not
/// covered by any field are opaque to the codec and preserved verbatim.
///
/// # Example
///
/// ```
/// use jsb_layout::{FieldDescriptor, FieldType, FileVariant, LayoutTable};
///
/// let layout = LayoutTable::new(
///     FileVariant::PhysicalConstraints,
///     "fm24",
///     vec![
///         FieldDescriptor::new("walk_speed", 128, FieldType::Int32LE),
///         FieldDescriptor::new("jog_speed", 64, FieldType::Int32LE),
///     ],
/// )
/// .unwrap();
///
/// assert_eq!(layout.start_offset(), Some(64));
/// assert_eq!(layout.fields()[1].name(), "walk_speed");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawLayout", into = "RawLayout")]
pub struct LayoutTable {
    variant: FileVariant,
    build: String,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
}

impl LayoutTable {
    /// Build a layout table, sorting fields by offset.
    ///
    /// Fails on duplicate names, zero-width fields, or overlapping fields.
    pub fn new(variant: FileVariant, build: impl Into<String>, mut fields: Vec<FieldDescriptor>) -> Result<Self> {
        fields.sort_by_key(FieldDescriptor::offset);

        let mut by_name = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            if field.width() == 0 {
                return Err(Error::ZeroWidth(field.name().to_string()));
            }
            if by_name.insert(field.name().to_string(), index).is_some() {
                return Err(Error::DuplicateField(field.name().to_string()));
            }
        }

        for pair in fields.windows(2) {
            let (first, second) = (&pair[0], &pair[1]);
            if second.offset() < first.end() {
                return Err(Error::Overlap {
                    first: first.name().to_string(),
                    first_end: first.end(),
                    second: second.name().to_string(),
                    second_offset: second.offset(),
                });
            }
        }

        Ok(Self {
            variant,
            build: build.into(),
            fields,
            by_name,
        })
    }

    /// File variant this layout describes.
    pub fn variant(&self) -> FileVariant {
        self.variant
    }

    /// Game build the layout was established for.
    pub fn build(&self) -> &str {
        &self.build
    }

    /// Fields in increasing offset order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the layout declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Offset of the first field; everything before it is opaque header.
    pub fn start_offset(&self) -> Option<usize> {
        self.fields.first().map(FieldDescriptor::offset)
    }

    /// Offset one past the last field; the minimum length of a matching file.
    pub fn end_offset(&self) -> usize {
        self.fields.last().map_or(0, FieldDescriptor::end)
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    /// Whether a field with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The field covering a byte offset, if any.
    pub fn field_at(&self, offset: usize) -> Option<&FieldDescriptor> {
        let index = self.fields.partition_point(|f| f.end() <= offset);
        self.fields.get(index).filter(|f| f.contains(offset))
    }

    /// Total bytes covered by fields.
    pub fn field_bytes(&self) -> usize {
        self.fields.iter().map(FieldDescriptor::width).sum()
    }

    /// Parse a layout table from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the layout table as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a layout table from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Write the layout table as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct RawLayout {
    variant: FileVariant,
    build: String,
    fields: Vec<FieldDescriptor>,
}

impl TryFrom<RawLayout> for LayoutTable {
    type Error = Error;

    fn try_from(raw: RawLayout) -> Result<Self> {
        LayoutTable::new(raw.variant, raw.build, raw.fields)
    }
}

impl From<LayoutTable> for RawLayout {
    fn from(table: LayoutTable) -> Self {
        Self {
            variant: table.variant,
            build: table.build,
            fields: table.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldType;

    fn field(name: &str, offset: usize, ty: FieldType) -> FieldDescriptor {
        FieldDescriptor::new(name, offset, ty)
    }

    #[test]
    fn test_sorted_and_indexed() {
        let layout = LayoutTable::new(
            FileVariant::Weights,
            "fm24",
            vec![
                field("b", 20, FieldType::Float64LE),
                field("a", 4, FieldType::Int32LE),
                field("c", 28, FieldType::UInt8),
            ],
        )
        .unwrap();

        let names: Vec<_> = layout.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(layout.start_offset(), Some(4));
        assert_eq!(layout.end_offset(), 29);
        assert_eq!(layout.field_bytes(), 13);
        assert_eq!(layout.get("b").map(|f| f.offset()), Some(20));
    }

    #[test]
    fn test_field_at() {
        let layout = LayoutTable::new(
            FileVariant::Weights,
            "fm24",
            vec![field("a", 4, FieldType::Int32LE), field("b", 10, FieldType::Int32LE)],
        )
        .unwrap();

        assert_eq!(layout.field_at(3), None);
        assert_eq!(layout.field_at(4).map(|f| f.name()), Some("a"));
        assert_eq!(layout.field_at(7).map(|f| f.name()), Some("a"));
        assert_eq!(layout.field_at(8), None);
        assert_eq!(layout.field_at(13).map(|f| f.name()), Some("b"));
        assert_eq!(layout.field_at(14), None);
    }

    #[test]
    fn test_rejects_overlap() {
        let err = LayoutTable::new(
            FileVariant::Weights,
            "fm24",
            vec![field("a", 0, FieldType::Int32LE), field("b", 3, FieldType::Int32LE)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Overlap { second_offset: 3, first_end: 4, .. }));
    }

    #[test]
    fn test_adjacent_fields_allowed() {
        assert!(LayoutTable::new(
            FileVariant::Weights,
            "fm24",
            vec![field("a", 0, FieldType::Int32LE), field("b", 4, FieldType::Int32LE)],
        )
        .is_ok());
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = LayoutTable::new(
            FileVariant::Weights,
            "fm24",
            vec![field("a", 0, FieldType::Int32LE), field("a", 8, FieldType::Int32LE)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateField(name) if name == "a"));
    }

    #[test]
    fn test_json_round_trip() {
        let text = r#"{
            "variant": "physical_constraints",
            "build": "fm24",
            "fields": [
                { "name": "walk_speed", "offset": "0x80", "type": "i32" },
                { "name": "label", "offset": 0, "type": "string", "width": 16 }
            ]
        }"#;

        let layout = LayoutTable::from_json(text).unwrap();
        assert_eq!(layout.variant(), FileVariant::PhysicalConstraints);
        assert_eq!(layout.fields()[0].name(), "label");

        let again = LayoutTable::from_json(&layout.to_json().unwrap()).unwrap();
        assert_eq!(again.fields(), layout.fields());
        assert_eq!(again.build(), "fm24");
    }

    #[test]
    fn test_json_overlap_rejected() {
        let text = r#"{
            "variant": "weights",
            "build": "fm24",
            "fields": [
                { "name": "a", "offset": 0, "type": "i64" },
                { "name": "b", "offset": 4, "type": "i32" }
            ]
        }"#;
        assert!(LayoutTable::from_json(text).is_err());
    }
}
