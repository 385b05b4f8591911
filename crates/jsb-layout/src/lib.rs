//! Layout tables for `.jsb` match-engine files.
//!
//! A `.jsb` file has no public description. What is known about it is kept as
//! data: a [`LayoutTable`] lists the fields whose offset, type and width have
//! been established, and everything else in the file is treated as opaque.
//!
//! Layout tables are rarely written by hand. Each value in a `.jsb` file is found
//! through the offset of its *key text*, followed by a one-byte type tag.
//! A [`LayoutRecipe`] captures exactly that knowledge (key anchors and key-token
//! scan regions) and [resolves](LayoutRecipe::resolve) it against a concrete
//! file into a [`LayoutTable`].
//!
//! # Example
//!
//! ```no_run
//! use jsb_layout::{FileVariant, LayoutRegistry};
//!
//! let data = std::fs::read("physical_constraints.jsb")?;
//! let registry = LayoutRegistry::builtin()?;
//! let recipe = registry.latest(FileVariant::PhysicalConstraints)?;
//! let layout = recipe.resolve(&data)?;
//!
//! for field in layout.fields() {
//!     println!("{:#010x} {} {}", field.offset(), field.ty(), field.name());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod field;
mod offset;
mod recipe;
mod registry;
mod table;
mod variant;

pub mod scan;
pub mod tags;

pub use error::{Error, Result};
pub use field::{FieldDescriptor, FieldType};
pub use recipe::{KeyAnchor, LayoutFile, LayoutRecipe, ScanRegion};
pub use registry::LayoutRegistry;
pub use table::LayoutTable;
pub use tags::TagDialect;
pub use variant::FileVariant;
