//! jsb - decode, edit and re-encode Football Manager match-engine `.jsb` files.
//!
//! This crate provides a unified interface to the jsb library crates.
//!
//! # Crates
//!
//! - [`jsb_common`] - Byte cursor, low-level errors, CRC32C fingerprints
//! - [`jsb_layout`] - Field descriptors, layout tables, recipes and built-in layouts
//! - [`jsb_codec`] - Decoder, encoder, round-trip validator and key-addressed patching
//!
//! # Example
//!
//! ```no_run
//! use jsb::prelude::*;
//!
//! let data = std::fs::read("physical_constraints.jsb")?;
//! let registry = LayoutRegistry::builtin()?;
//! let layout = registry.latest(FileVariant::PhysicalConstraints)?.resolve(&data)?;
//!
//! let mut doc = decode(&data, &layout)?;
//! doc.fields.insert("walk_speed", Value::Int(12));
//! let out = encode_document(&doc, &layout)?;
//! assert_eq!(out.len(), data.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use jsb_codec as codec;
pub use jsb_common as common;
pub use jsb_layout as layout;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use jsb_codec::{
        apply_patch, compare_copies, decode, encode, encode_against, encode_document, validate, verify,
        DecodedDocument, FieldMap, OpaqueRegion, ValidationReport, Value,
    };
    pub use jsb_common::{crc, ByteCursor};
    pub use jsb_layout::{
        FieldDescriptor, FieldType, FileVariant, LayoutFile, LayoutRecipe, LayoutRegistry, LayoutTable,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
