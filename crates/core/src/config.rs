//! Compile-time configuration
//!
//! Every tunable of the store is a build-time constant. The slot array is
//! sized in bytes (like the allocation it models) and its logical capacity
//! is derived from the width of one slot head, so the slot count stays a
//! power of two across doublings.

use crate::error::{Error, Result};

/// Capacity of a bucket's key buffer in bytes. Longer keys are silently
/// truncated to this prefix.
pub const KEY_SIZE: usize = 250;

/// Seed for the MurmurHash3-x86-32 key fingerprint.
pub const HASH_SEED: u32 = 666;

/// Initial size of the slot array in bytes. Must be a power of two.
pub const INITIAL_TABLE_BYTES: usize = 32_768;

/// Width of one slot head. `table_bytes / SLOT_WIDTH` is the slot count.
pub const SLOT_WIDTH: usize = std::mem::size_of::<usize>();

/// Maximum database name length in bytes.
pub const DB_NAME_SIZE: usize = 64;

/// Maximum database directory path length in bytes.
pub const PATH_LENGTH: usize = 256;

/// Content type stored when the caller does not supply one.
pub const DEFAULT_CONTENT_TYPE: &[u8] = b"application/octet-stream";

/// Chain walks deeper than this log a warning; the table is undersized or
/// the fingerprint distribution has gone bad.
pub const CHAIN_DEPTH_WARN: usize = 100;

/// Validate a database name at open time.
///
/// Names become file stems (`<name>.dump`, `<name>.aol`), so they must be
/// non-empty, fit the bound, and stay clear of path syntax.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName {
            reason: "name is empty".to_string(),
        });
    }
    if name.len() > DB_NAME_SIZE {
        return Err(Error::InvalidName {
            reason: format!("{} bytes exceeds maximum {}", name.len(), DB_NAME_SIZE),
        });
    }
    if name.contains(['/', '\\']) || name.contains('\0') {
        return Err(Error::InvalidName {
            reason: "name contains path separators or NUL".to_string(),
        });
    }
    Ok(())
}

/// Validate a database directory path at open time.
pub fn validate_path(path: &std::path::Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len > PATH_LENGTH {
        return Err(Error::InvalidPath {
            reason: format!("{} bytes exceeds maximum {}", len, PATH_LENGTH),
        });
    }
    Ok(())
}
