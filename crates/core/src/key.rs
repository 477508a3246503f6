//! Fixed-capacity truncated keys
//!
//! Every key entering the store is normalized into a [`KeyBuf`]: the first
//! [`KEY_SIZE`](crate::config::KEY_SIZE) bytes of the caller's key, further
//! shortened by any embedded zero byte, held in a zero-padded fixed array.
//! All hashing, comparison, and serialization downstream operates on this
//! normalized form, so two caller keys that normalize identically are the
//! same key.

use crate::config::{HASH_SEED, KEY_SIZE};
use crate::hash::murmur3_x86_32;

/// A key normalized to the store's fixed capacity.
///
/// The backing array is always zero-padded past the live bytes, which makes
/// it safe to write verbatim into a dump record and lets equality over the
/// longer of two live lengths stand in for C-style string comparison.
#[derive(Clone)]
pub struct KeyBuf {
    bytes: [u8; KEY_SIZE],
    len: usize,
}

impl KeyBuf {
    /// Normalize a raw caller key: truncate to `KEY_SIZE` bytes, then stop
    /// at the first zero byte.
    pub fn truncate(raw: &[u8]) -> KeyBuf {
        let cap = raw.len().min(KEY_SIZE);
        let len = raw[..cap]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(cap);
        let mut bytes = [0u8; KEY_SIZE];
        bytes[..len].copy_from_slice(&raw[..len]);
        KeyBuf { bytes, len }
    }

    /// Live length of the key in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the key normalized to nothing (empty input or a leading
    /// zero byte).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The live key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The full zero-padded backing array, as written into dump records.
    pub fn padded(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// MurmurHash3-x86-32 fingerprint of the live bytes under the store seed.
    pub fn fingerprint(&self) -> u32 {
        murmur3_x86_32(self.as_bytes(), HASH_SEED)
    }
}

impl PartialEq for KeyBuf {
    fn eq(&self, other: &Self) -> bool {
        // Compare over the longer live length; both tails are zero-padded,
        // so a length mismatch shows up as a zero byte against a live one.
        let n = self.len.max(other.len);
        self.bytes[..n] == other.bytes[..n]
    }
}

impl Eq for KeyBuf {}

impl std::fmt::Debug for KeyBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyBuf({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}
