//! Error types for PantryDB
//!
//! A single `Error` enum is shared by all crates in the workspace. `thiserror`
//! provides the `Display` and `Error` implementations.
//!
//! Failure categories:
//!
//! - **Not found**: delete on an absent key (lookups return `Option` instead)
//! - **I/O**: any file operation on the dump or the append-only log
//! - **Format**: a dump or log file that cannot be parsed
//! - **Validation**: bounded name/path checks at open time

use std::io;
use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the store.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a dump, log, or directory operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key is not present in the index.
    #[error("key not found")]
    KeyNotFound,

    /// A file offered for load is not a dump (magic bytes mismatch).
    #[error("not a dump file: bad magic {found:?}")]
    BadMagic {
        /// The four bytes found where the magic was expected.
        found: [u8; 4],
    },

    /// A dump written by an incompatible version of the format.
    #[error("unsupported dump version: expected {expected}, found {found}")]
    UnsupportedVersion {
        /// The version this build reads and writes.
        expected: u32,
        /// The version recorded in the file header.
        found: u32,
    },

    /// A dump or log file that ends early or contains a malformed record.
    #[error("corrupt file: {detail}")]
    Corrupt {
        /// What was malformed and where.
        detail: String,
    },

    /// The database name failed open-time validation.
    #[error("invalid database name: {reason}")]
    InvalidName {
        /// Why the name was rejected.
        reason: String,
    },

    /// The database path failed open-time validation.
    #[error("invalid database path: {reason}")]
    InvalidPath {
        /// Why the path was rejected.
        reason: String,
    },
}

impl Error {
    /// Create a `Corrupt` error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Error::Corrupt {
            detail: detail.into(),
        }
    }

    /// Check if this is the not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound)
    }

    /// Check if this is a file-format error (bad magic, bad version, or a
    /// malformed record).
    ///
    /// Format errors mean the file should not be retried as-is; I/O errors
    /// may be transient.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::BadMagic { .. } | Error::UnsupportedVersion { .. } | Error::Corrupt { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_io() {
        let err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_display_bad_magic() {
        let err = Error::BadMagic { found: *b"NOPE" };
        let msg = err.to_string();
        assert!(msg.contains("bad magic"));
    }

    #[test]
    fn test_display_unsupported_version() {
        let err = Error::UnsupportedVersion {
            expected: 1,
            found: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains('1'));
        assert!(msg.contains('9'));
    }

    #[test]
    fn test_display_corrupt() {
        let err = Error::corrupt("record 3 truncated");
        assert!(err.to_string().contains("record 3 truncated"));
    }

    #[test]
    fn test_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::KeyNotFound.is_not_found());
        assert!(!Error::corrupt("x").is_not_found());
    }

    #[test]
    fn test_is_format_error() {
        assert!(Error::BadMagic { found: [0; 4] }.is_format_error());
        assert!(Error::UnsupportedVersion {
            expected: 1,
            found: 2
        }
        .is_format_error());
        assert!(Error::corrupt("x").is_format_error());
        assert!(!Error::KeyNotFound.is_format_error());
    }
}
