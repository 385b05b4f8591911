//! Decoder, encoder and round-trip validator for `.jsb` files.
//!
//! Decoding reads the fields a [`LayoutTable`](jsb_layout::LayoutTable) knows
//! into an ordered [`FieldMap`] and keeps every other byte as an
//! [`OpaqueRegion`]. Encoding writes edited values back over the same opaque
//! bytes, so the output has the original length and differs only inside the
//! edited fields.
//!
//! - [`decode`] / [`encode`] - the two directions
//! - [`encode_against`] - encode a JSON document using the file it came from
//! - [`validate`] - check a layout by decoding and re-encoding a file
//! - [`apply_patch`], [`verify`], [`compare_copies`] - key-addressed edits

mod decode;
mod document;
mod encode;
mod error;
mod patch;
mod validate;
mod value;

pub use decode::{decode, opaque_regions};
pub use document::{DecodedDocument, FieldMap, OpaqueRegion, SourceInfo};
pub use encode::{check_tiling, encode, encode_against, encode_document, EncodingPlan};
pub use error::{Error, Result};
pub use patch::{apply_patch, compare_copies, verify, CopyDifference, FieldUpdate, PatchReport, VerifyFailure, VerifyReport};
pub use validate::{validate, Mismatch, ValidationReport, CONTEXT_BYTES};
pub use value::Value;
