//! Layout-driven decoding.

use jsb_common::ByteCursor;
use jsb_layout::tags::tag_int_value;
use jsb_layout::{FieldType, LayoutTable};

use crate::{DecodedDocument, Error, FieldMap, OpaqueRegion, Result, SourceInfo, Value};

/// Decode a file with a layout.
///
/// Every field is read at its offset in layout order. The bytes before the
/// first field, between fields and after the last field are captured as
/// opaque regions, so that fields and regions together cover the whole file.
/// Fails with `OutOfBounds` when a field runs past the end of `data`.
///
/// # Example
///
/// ```
/// use jsb_codec::{decode, Value};
/// use jsb_layout::{FieldDescriptor, FieldType, FileVariant, LayoutTable};
///
/// let layout = LayoutTable::new(
///     FileVariant::PhysicalConstraints,
///     "fm24",
///     vec![FieldDescriptor::new("walk_speed", 4, FieldType::Int32LE)],
/// )?;
///
/// let data = [0xAA, 0xBB, 0xCC, 0xDD, 0x0A, 0x00, 0x00, 0x00, 0xEE];
/// let doc = decode(&data, &layout)?;
///
/// assert_eq!(doc.fields.get("walk_speed"), Some(&Value::Int(10)));
/// assert_eq!(doc.opaque.len(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn decode(data: &[u8], layout: &LayoutTable) -> Result<DecodedDocument> {
    let mut cursor = ByteCursor::new(data);
    let mut fields = FieldMap::with_capacity(layout.len());
    let mut opaque = Vec::new();
    let mut pos = 0;

    for field in layout.fields() {
        if field.offset() > pos && pos < data.len() {
            let end = field.offset().min(data.len());
            opaque.push(OpaqueRegion::new(pos, data[pos..end].to_vec()));
        }

        cursor.seek(field.offset())?;
        fields.insert(field.name(), read_value(&mut cursor, field.ty())?);
        pos = field.end();
    }

    if pos < data.len() {
        opaque.push(OpaqueRegion::new(pos, data[pos..].to_vec()));
    }

    let doc = DecodedDocument {
        source: SourceInfo::new(layout, data),
        fields,
        opaque,
    };

    tracing::debug!(
        variant = %layout.variant(),
        build = layout.build(),
        length = data.len(),
        fields = doc.fields.len(),
        opaque_regions = doc.opaque.len(),
        opaque_bytes = doc.opaque_bytes(),
        "decoded"
    );

    Ok(doc)
}

/// Capture only the opaque regions of `data` under `layout`.
pub fn opaque_regions(data: &[u8], layout: &LayoutTable) -> Result<Vec<OpaqueRegion>> {
    Ok(decode(data, layout)?.opaque)
}

/// Read one value of type `ty` at the cursor.
pub(crate) fn read_value<B: AsRef<[u8]>>(cursor: &mut ByteCursor<B>, ty: FieldType) -> Result<Value> {
    let value = match ty {
        FieldType::UInt8 => Value::Int(cursor.read_u8()?.into()),
        FieldType::TagInt => {
            let offset = cursor.position();
            let tag = cursor.read_u8()?;
            Value::Int(tag_int_value(tag).ok_or(Error::NotTagInt { offset, tag })?)
        }
        FieldType::Int32LE => Value::Int(cursor.read_i32_le()?.into()),
        FieldType::Int64LE => Value::Int(cursor.read_i64_le()?),
        FieldType::Float32LE => Value::Float(cursor.read_f32_le()?.into()),
        FieldType::Float64LE => Value::Float(cursor.read_f64_le()?),
        FieldType::FixedString { width, pad } => Value::Text(cursor.read_fixed_string(width, pad)?),
    };
    Ok(value)
}
