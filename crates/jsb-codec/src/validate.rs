//! Round-trip validation of layouts.

use std::fmt;
use std::fmt::Write as _;
use std::ops::Range;

use jsb_layout::LayoutTable;

use crate::{decode, encode_document, Error, Result};

/// Bytes shown on each side of the first difference.
pub const CONTEXT_BYTES: usize = 16;

/// The first place where a re-encoded file differs from the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// First differing offset (the shorter length if one buffer is a prefix
    /// of the other).
    pub offset: usize,
    /// Field covering `offset`, if any.
    pub field: Option<String>,
    /// Offset of the first context byte.
    pub context_start: usize,
    /// Original bytes around `offset`.
    pub original: Vec<u8>,
    /// Re-encoded bytes around `offset`.
    pub encoded: Vec<u8>,
}

impl Mismatch {
    /// Side-by-side hex dump of the context windows.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "original:");
        hexdump(&mut out, self.context_start, &self.original, self.offset);
        let _ = writeln!(out, "encoded:");
        hexdump(&mut out, self.context_start, &self.encoded, self.offset);
        out
    }
}

/// Outcome of decoding and re-encoding one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Length of the original file.
    pub length: usize,
    /// Length of the re-encoded file.
    pub encoded_length: usize,
    /// Number of layout fields.
    pub fields: usize,
    /// Bytes preserved as opaque regions.
    pub opaque_bytes: usize,
    /// `None` when the round trip is byte-identical.
    pub mismatch: Option<Mismatch>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.mismatch.is_none()
    }

    /// Turn a failed round trip into `LayoutMismatch`.
    pub fn into_result(self) -> Result<Self> {
        match &self.mismatch {
            None => Ok(self),
            Some(m) => Err(Error::LayoutMismatch {
                offset: m.offset,
                field: m.field.clone(),
            }),
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mismatch {
            None => write!(
                f,
                "OK: {} bytes, {} fields, {} opaque bytes",
                self.length, self.fields, self.opaque_bytes
            ),
            Some(m) => {
                write!(f, "MISMATCH at {:#010x}", m.offset)?;
                if let Some(field) = &m.field {
                    write!(f, " in field `{field}`")?;
                }
                if self.length != self.encoded_length {
                    write!(f, " (length {} -> {})", self.length, self.encoded_length)?;
                }
                write!(f, "\n{}", m.render())
            }
        }
    }
}

/// Decode `original`, re-encode it with the captured opaque regions and
/// compare the result byte for byte.
///
/// Decoding and encoding errors are returned as errors; a successful round
/// trip that produces different bytes is reported in the
/// [`ValidationReport`].
pub fn validate(original: &[u8], layout: &LayoutTable) -> Result<ValidationReport> {
    let doc = decode(original, layout)?;
    let encoded = encode_document(&doc, layout)?;

    Ok(compare(original, &encoded, layout, doc.opaque_bytes()))
}

/// Build the report for an original file and its re-encoding.
fn compare(original: &[u8], encoded: &[u8], layout: &LayoutTable, opaque_bytes: usize) -> ValidationReport {
    let mismatch = first_difference(original, encoded).map(|offset| {
        let context_start = offset.saturating_sub(CONTEXT_BYTES);
        let context = context_start..offset + CONTEXT_BYTES;
        Mismatch {
            offset,
            field: layout.field_at(offset).map(|f| f.name().to_string()),
            context_start,
            original: window(original, context.clone()).to_vec(),
            encoded: window(encoded, context).to_vec(),
        }
    });

    if let Some(m) = &mismatch {
        tracing::debug!(offset = m.offset, field = ?m.field, "round trip mismatch");
    }

    ValidationReport {
        length: original.len(),
        encoded_length: encoded.len(),
        fields: layout.len(),
        opaque_bytes,
        mismatch,
    }
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len())))
}

fn window(data: &[u8], range: Range<usize>) -> &[u8] {
    let end = range.end.min(data.len());
    data.get(range.start..end).unwrap_or(&[])
}

/// 16 bytes per line: offset, hex, ASCII. The byte at `mark` is bracketed.
fn hexdump(out: &mut String, start: usize, bytes: &[u8], mark: usize) {
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let line_start = start + row * 16;
        let _ = write!(out, "  {line_start:08x} ");
        for (i, b) in chunk.iter().enumerate() {
            if line_start + i == mark {
                let _ = write!(out, "[{b:02x}]");
            } else {
                let _ = write!(out, " {b:02x} ");
            }
        }
        for _ in chunk.len()..16 {
            out.push_str("    ");
        }
        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' }));
        out.push_str("|\n");
    }
}
