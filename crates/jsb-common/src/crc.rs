//! CRC32C fingerprints.
//!
//! A decoded document remembers the CRC32C of the file it came from, so that an
//! edited document is only ever re-encoded against that same file's opaque bytes.

/// Compute CRC32C hash of a byte slice.
///
/// Uses hardware acceleration when available (SSE4.2 on x86).
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Format a fingerprint the way it is stored in documents (`0x1234abcd`).
pub fn format_hash(hash: u32) -> String {
    format!("{hash:#010x}")
}

/// Parse a fingerprint written by [`format_hash`].
pub fn parse_hash(text: &str) -> Option<u32> {
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
    u32::from_str_radix(digits, 16).ok()
}
