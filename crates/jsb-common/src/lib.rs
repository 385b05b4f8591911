//! Common utilities for jsb.
//!
//! This crate provides the foundational pieces shared by the layout and codec crates:
//!
//! - [`ByteCursor`] - Bounds-checked little-endian reader/writer over a fixed buffer
//! - [`crc`] - CRC32C fingerprints of decoded files
//! - [`Error`] - The `OutOfBounds` family of low-level failures

mod cursor;
mod error;

pub mod crc;

pub use cursor::ByteCursor;
pub use error::{Error, Result};

/// Re-export memchr for fast key searches in raw buffers
pub use memchr;
