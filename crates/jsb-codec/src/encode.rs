//! Layout-driven encoding.

use jsb_common::ByteCursor;
use jsb_layout::tags::{tag_int_byte, TAG_INT_MAX};
use jsb_layout::{FieldDescriptor, FieldType, LayoutTable};

use crate::decode::opaque_regions;
use crate::{DecodedDocument, Error, FieldMap, OpaqueRegion, Result, Value};

/// Largest magnitude an integer can have and still convert to `f64` exactly.
const F64_EXACT_INT: i64 = 1 << 53;

/// Everything needed to produce an output buffer, checked up front.
///
/// Building a plan runs every check the encoder makes (tiling, field coverage
/// and value ranges), so [`execute`](Self::execute) only copies bytes.
#[derive(Debug)]
pub struct EncodingPlan<'a> {
    length: usize,
    opaque: &'a [OpaqueRegion],
    writes: Vec<(usize, Vec<u8>)>,
}

impl<'a> EncodingPlan<'a> {
    /// Check a document against a layout and its opaque regions.
    pub fn new(fields: &FieldMap, layout: &LayoutTable, opaque: &'a [OpaqueRegion]) -> Result<Self> {
        let length = check_tiling(layout, opaque)?;

        if let Some(name) = fields.keys().find(|name| !layout.contains(name)) {
            return Err(Error::UnknownField(name.to_string()));
        }

        let mut writes = Vec::with_capacity(layout.len());
        for field in layout.fields() {
            let value = fields
                .get(field.name())
                .ok_or_else(|| Error::MissingField(field.name().to_string()))?;
            writes.push((field.offset(), prepare(field, value)?));
        }

        Ok(Self { length, opaque, writes })
    }

    /// Length of the output in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Produce the output buffer.
    pub fn execute(self) -> Result<Vec<u8>> {
        let mut cursor = ByteCursor::new(vec![0u8; self.length]);

        for region in self.opaque {
            cursor.seek(region.start)?;
            cursor.write_bytes(&region.bytes)?;
        }
        for (offset, bytes) in &self.writes {
            cursor.seek(*offset)?;
            cursor.write_bytes(bytes)?;
        }

        Ok(cursor.into_inner())
    }
}

/// Encode field values and opaque regions into a file.
///
/// Fails without producing any output when the regions and field ranges do
/// not cover `[0, N)` exactly, when a layout field has no value or a value has
/// no field, or when a value does not fit its field. The output is `N` bytes
/// long.
///
/// # Example
///
/// ```
/// use jsb_codec::{decode, encode, Value};
/// use jsb_layout::{FieldDescriptor, FieldType, FileVariant, LayoutTable};
///
/// let layout = LayoutTable::new(
///     FileVariant::PhysicalConstraints,
///     "fm24",
///     vec![FieldDescriptor::new("walk_speed", 2, FieldType::Int32LE)],
/// )?;
///
/// let data = [0xAA, 0xBB, 0x0A, 0x00, 0x00, 0x00, 0xCC];
/// let mut doc = decode(&data, &layout)?;
/// doc.fields.insert("walk_speed", Value::Int(12));
///
/// let out = encode(&doc.fields, &layout, &doc.opaque)?;
/// assert_eq!(out, [0xAA, 0xBB, 0x0C, 0x00, 0x00, 0x00, 0xCC]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn encode(fields: &FieldMap, layout: &LayoutTable, opaque: &[OpaqueRegion]) -> Result<Vec<u8>> {
    let out = EncodingPlan::new(fields, layout, opaque)?.execute()?;
    tracing::debug!(
        variant = %layout.variant(),
        build = layout.build(),
        length = out.len(),
        fields = layout.len(),
        "encoded"
    );
    Ok(out)
}

/// Encode a document with the opaque regions it carries.
pub fn encode_document(doc: &DecodedDocument, layout: &LayoutTable) -> Result<Vec<u8>> {
    encode(&doc.fields, layout, &doc.opaque)
}

/// Encode a document using the opaque bytes of the file it was decoded from.
///
/// Documents read from JSON carry no opaque regions. They are taken from
/// `original`, which must be the very file the document was decoded from and
/// must have been decoded with this layout's variant and build.
pub fn encode_against(doc: &DecodedDocument, layout: &LayoutTable, original: &[u8]) -> Result<Vec<u8>> {
    let source = &doc.source;
    if source.variant != layout.variant() || source.build != layout.build() {
        return Err(Error::SourceMismatch {
            expected: format!("{} build {}", source.variant, source.build),
            actual: format!("{} build {}", layout.variant(), layout.build()),
        });
    }
    if !source.matches(original) {
        return Err(Error::SourceMismatch {
            expected: format!("{} ({} bytes)", source.crc32c, source.length),
            actual: format!(
                "{} ({} bytes)",
                jsb_common::crc::format_hash(jsb_common::crc::hash_bytes(original)),
                original.len()
            ),
        });
    }

    let opaque = opaque_regions(original, layout)?;
    encode(&doc.fields, layout, &opaque)
}

/// Check that opaque regions and field ranges cover `[0, N)` exactly once.
///
/// Returns `N`.
pub fn check_tiling(layout: &LayoutTable, opaque: &[OpaqueRegion]) -> Result<usize> {
    let mut spans: Vec<(usize, usize)> = layout
        .fields()
        .iter()
        .map(|f| (f.offset(), f.end()))
        .chain(opaque.iter().filter(|r| !r.is_empty()).map(|r| (r.start, r.end())))
        .collect();
    spans.sort_unstable();

    let mut covered = 0;
    for (start, end) in spans {
        if start > covered {
            return Err(Error::Tiling {
                start: covered,
                end: start,
                problem: "not covered by any field or opaque region",
            });
        }
        if start < covered {
            return Err(Error::Tiling {
                start,
                end: covered.min(end),
                problem: "covered more than once",
            });
        }
        covered = end;
    }

    Ok(covered)
}

/// Turn a value into the bytes of a field.
///
/// `f32` fields take the nearest `f32` to the value, so `0.1` is stored as
/// `0.1f32`. Values too large for `f32`, and non-zero values that would be
/// flushed to zero or lose precision as a subnormal, are rejected.
pub(crate) fn prepare(field: &FieldDescriptor, value: &Value) -> Result<Vec<u8>> {
    let name = field.name();
    let mut cursor = ByteCursor::new(vec![0u8; field.width()]);

    match field.ty() {
        FieldType::UInt8 => {
            let v = integer(name, value, u8::MIN.into(), u8::MAX.into(), "u8")?;
            cursor.write_u8(v as u8)?;
        }
        FieldType::TagInt => {
            let v = integer(name, value, -TAG_INT_MAX, TAG_INT_MAX, "a tag byte")?;
            let tag = tag_int_byte(v)
                .ok_or_else(|| Error::encoding(name, value, "is out of range for a tag byte"))?;
            cursor.write_u8(tag)?;
        }
        FieldType::Int32LE => {
            let v = integer(name, value, i32::MIN.into(), i32::MAX.into(), "i32")?;
            cursor.write_i32_le(v as i32)?;
        }
        FieldType::Int64LE => {
            let v = integer(name, value, i64::MIN, i64::MAX, "i64")?;
            cursor.write_i64_le(v)?;
        }
        FieldType::Float32LE => {
            let v = float(name, value)?;
            if v.abs() > f64::from(f32::MAX) {
                return Err(Error::encoding(name, value, "is out of range for f32"));
            }
            let stored = v as f32;
            if v != 0.0 && (stored == 0.0 || (stored.is_subnormal() && f64::from(stored) != v)) {
                return Err(Error::encoding(name, value, "is too small for f32"));
            }
            cursor.write_f32_le(stored)?;
        }
        FieldType::Float64LE => {
            cursor.write_f64_le(float(name, value)?)?;
        }
        FieldType::FixedString { width, pad } => {
            let Value::Text(text) = value else {
                return Err(Error::encoding(name, value, "is not a string"));
            };
            if text.len() > width {
                return Err(Error::encoding(
                    name,
                    value,
                    format!("is {} bytes, longer than the field's {width}", text.len()),
                ));
            }
            if text.as_bytes().last() == Some(&pad) {
                return Err(Error::encoding(name, value, format!("ends with the pad byte {pad:#04x}")));
            }
            cursor.write_fixed_string(text, width, pad)?;
        }
    }

    Ok(cursor.into_inner())
}

fn integer(name: &str, value: &Value, min: i64, max: i64, ty: &str) -> Result<i64> {
    let v = match *value {
        Value::Int(v) => v,
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 && f >= -(2f64.powi(63)) && f < 2f64.powi(63) => {
            f as i64
        }
        Value::Float(_) => return Err(Error::encoding(name, value, "is not an integer")),
        Value::Text(_) => return Err(Error::encoding(name, value, "is not a number")),
    };

    if v < min || v > max {
        return Err(Error::encoding(name, value, format!("is out of range for {ty}")));
    }
    Ok(v)
}

fn float(name: &str, value: &Value) -> Result<f64> {
    match *value {
        Value::Float(f) if f.is_finite() => Ok(f),
        Value::Float(_) => Err(Error::encoding(name, value, "is not finite")),
        Value::Int(i) if (-F64_EXACT_INT..=F64_EXACT_INT).contains(&i) => Ok(i as f64),
        Value::Int(_) => Err(Error::encoding(name, value, "cannot be stored exactly as a float")),
        Value::Text(_) => Err(Error::encoding(name, value, "is not a number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;
    use jsb_layout::FileVariant;

    fn layout(fields: Vec<FieldDescriptor>) -> LayoutTable {
        LayoutTable::new(FileVariant::PhysicalConstraints, "test", fields).unwrap()
    }

    fn walk_speed_file() -> (Vec<u8>, LayoutTable) {
        let mut data: Vec<u8> = (0..160u8).map(|b| b.wrapping_mul(7)).collect();
        data[128..132].copy_from_slice(&[0x0A, 0x00, 0x00, 0x00]);
        let layout = layout(vec![FieldDescriptor::new("walk_speed", 128, FieldType::Int32LE)]);
        (data, layout)
    }

    fn field_error(result: Result<Vec<u8>>) -> String {
        match result {
            Err(Error::FieldEncoding { field, .. }) => field,
            other => panic!("expected FieldEncoding, got {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_identity() {
        let (data, layout) = walk_speed_file();
        let doc = decode(&data, &layout).unwrap();
        assert_eq!(encode_document(&doc, &layout).unwrap(), data);
    }

    #[test]
    fn test_walk_speed_edit() {
        let (data, layout) = walk_speed_file();
        let mut doc = decode(&data, &layout).unwrap();
        doc.fields.insert("walk_speed", Value::Int(12));

        let out = encode_document(&doc, &layout).unwrap();
        assert_eq!(out.len(), data.len());
        assert_eq!(out[128], 0x0C);

        let changed: Vec<usize> = (0..out.len()).filter(|&i| out[i] != data[i]).collect();
        assert_eq!(changed, [128]);
    }

    #[test]
    fn test_edit_isolation() {
        let mut data = vec![0xEEu8; 48];
        data[4..8].copy_from_slice(&1i32.to_le_bytes());
        data[16..24].copy_from_slice(&0.5f64.to_le_bytes());
        data[32..40].copy_from_slice(b"Neutral\0");
        let layout = layout(vec![
            FieldDescriptor::new("a", 4, FieldType::Int32LE),
            FieldDescriptor::new("b", 16, FieldType::Float64LE),
            FieldDescriptor::new("c", 32, FieldType::FixedString { width: 8, pad: 0 }),
        ]);

        let mut doc = decode(&data, &layout).unwrap();
        doc.fields.insert("b", Value::Float(-3.75));
        let out = encode_document(&doc, &layout).unwrap();

        for (i, (before, after)) in data.iter().zip(&out).enumerate() {
            if !(16..24).contains(&i) {
                assert_eq!(before, after, "byte {i} changed");
            }
        }
        assert_eq!(&out[16..24], &(-3.75f64).to_le_bytes());
    }

    #[test]
    fn test_range_rejection() {
        let (data, layout) = walk_speed_file();
        let mut doc = decode(&data, &layout).unwrap();

        doc.fields.insert("walk_speed", Value::Int(i64::from(i32::MAX) + 1));
        assert_eq!(field_error(encode_document(&doc, &layout)), "walk_speed");

        doc.fields.insert("walk_speed", Value::Float(10.5));
        assert_eq!(field_error(encode_document(&doc, &layout)), "walk_speed");

        doc.fields.insert("walk_speed", Value::Text("fast".into()));
        assert_eq!(field_error(encode_document(&doc, &layout)), "walk_speed");

        doc.fields.insert("walk_speed", Value::Float(12.0));
        assert_eq!(encode_document(&doc, &layout).unwrap()[128], 0x0C);
    }

    #[test]
    fn test_float_rules() {
        let f32_field = FieldDescriptor::new("f", 0, FieldType::Float32LE);
        let f64_field = FieldDescriptor::new("d", 0, FieldType::Float64LE);

        assert!(prepare(&f32_field, &Value::Float(f64::NAN)).is_err());
        assert!(prepare(&f64_field, &Value::Float(f64::INFINITY)).is_err());
        assert!(prepare(&f32_field, &Value::Float(1e39)).is_err());
        assert!(prepare(&f64_field, &Value::Int(i64::MAX)).is_err());

        assert_eq!(prepare(&f32_field, &Value::Int(2)).unwrap(), 2f32.to_le_bytes());
        assert_eq!(prepare(&f64_field, &Value::Float(0.1)).unwrap(), 0.1f64.to_le_bytes());
    }

    #[test]
    fn test_u8_range() {
        let field = FieldDescriptor::new("jog_speed", 0, FieldType::UInt8);
        assert_eq!(prepare(&field, &Value::Int(255)).unwrap(), [0xFF]);
        assert!(prepare(&field, &Value::Int(256)).is_err());
        assert!(prepare(&field, &Value::Int(-1)).is_err());
    }

    #[test]
    fn test_tag_int() {
        let field = FieldDescriptor::new("role.value", 0, FieldType::TagInt);
        assert_eq!(prepare(&field, &Value::Int(5)).unwrap(), [0x85]);
        assert_eq!(prepare(&field, &Value::Int(0)).unwrap(), [0x80]);
        assert_eq!(prepare(&field, &Value::Int(-9)).unwrap(), [0xC9]);
        assert_eq!(prepare(&field, &Value::Float(-63.0)).unwrap(), [0xFF]);
        assert!(matches!(prepare(&field, &Value::Int(64)), Err(Error::FieldEncoding { .. })));
        assert!(prepare(&field, &Value::Int(-64)).is_err());
    }

    #[test]
    fn test_f32_underflow() {
        let field = FieldDescriptor::new("scale", 0, FieldType::Float32LE);
        assert_eq!(prepare(&field, &Value::Float(0.1)).unwrap(), 0.1f32.to_le_bytes());
        assert_eq!(prepare(&field, &Value::Float(0.0)).unwrap(), [0; 4]);
        assert!(matches!(
            prepare(&field, &Value::Float(1e-50)),
            Err(Error::FieldEncoding { constraint, .. }) if constraint == "is too small for f32"
        ));
        assert!(prepare(&field, &Value::Float(1e-40)).is_err());

        // A subnormal read from a file goes back unchanged.
        let tiny = f32::from_bits(1);
        assert!(tiny.is_subnormal());
        assert_eq!(prepare(&field, &Value::Float(tiny.into())).unwrap(), 1u32.to_le_bytes());
    }

    #[test]
    fn test_string_rules() {
        let field = FieldDescriptor::new("name", 0, FieldType::FixedString { width: 4, pad: b' ' });
        assert_eq!(prepare(&field, &Value::Text("ab".into())).unwrap(), *b"ab  ");
        assert_eq!(prepare(&field, &Value::Text("".into())).unwrap(), *b"    ");
        assert!(prepare(&field, &Value::Text("abcde".into())).is_err());
        assert!(prepare(&field, &Value::Text("ab ".into())).is_err());
        assert!(prepare(&field, &Value::Int(1)).is_err());
    }

    #[test]
    fn test_missing_and_unknown_fields() {
        let (data, layout) = walk_speed_file();
        let doc = decode(&data, &layout).unwrap();

        let mut missing = doc.fields.clone();
        missing.remove("walk_speed");
        assert!(matches!(
            encode(&missing, &layout, &doc.opaque),
            Err(Error::MissingField(name)) if name == "walk_speed"
        ));

        let mut extra = doc.fields.clone();
        extra.insert("run_speed", Value::Int(1));
        assert!(matches!(
            encode(&extra, &layout, &doc.opaque),
            Err(Error::UnknownField(name)) if name == "run_speed"
        ));
    }

    #[test]
    fn test_tiling_errors() {
        let (data, layout) = walk_speed_file();
        let doc = decode(&data, &layout).unwrap();

        let gap = &doc.opaque[1..];
        assert!(matches!(
            encode(&doc.fields, &layout, gap),
            Err(Error::Tiling { start: 0, end: 128, .. })
        ));

        let mut overlap = doc.opaque.clone();
        overlap[0].bytes.push(0);
        assert!(matches!(
            encode(&doc.fields, &layout, &overlap),
            Err(Error::Tiling { start: 128, .. })
        ));
    }

    #[test]
    fn test_encode_against_original() {
        let (data, layout) = walk_speed_file();
        let doc = decode(&data, &layout).unwrap();

        let mut from_json = DecodedDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert!(from_json.opaque.is_empty());
        from_json.fields.insert("walk_speed", Value::Int(12));

        let out = encode_against(&from_json, &layout, &data).unwrap();
        assert_eq!(out.len(), data.len());
        assert_eq!(out[128], 0x0C);

        let mut other = data.clone();
        other[0] ^= 0xFF;
        assert!(matches!(
            encode_against(&from_json, &layout, &other),
            Err(Error::SourceMismatch { .. })
        ));
    }
}
