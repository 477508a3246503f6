//! Bucket records
//!
//! One bucket per live key. Buckets own their value and content-type
//! buffers and the link to the next bucket in the same slot chain, so a
//! whole chain is dropped by dropping its head.

use pantry_core::KeyBuf;

/// One stored record: normalized key, fingerprint, value, content type, and
/// the owning link to the next bucket in the collision chain.
pub struct Bucket {
    key: KeyBuf,
    hash: u32,
    data: Vec<u8>,
    content_type: Vec<u8>,
    pub(crate) next: Option<Box<Bucket>>,
}

impl Bucket {
    /// Create a detached bucket, boxed for chain linkage.
    pub fn new(key: KeyBuf, hash: u32, data: Vec<u8>, content_type: Vec<u8>) -> Box<Bucket> {
        Box::new(Bucket {
            key,
            hash,
            data,
            content_type,
            next: None,
        })
    }

    /// The normalized key.
    pub fn key(&self) -> &KeyBuf {
        &self.key
    }

    /// Fingerprint of the normalized key.
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// The stored value.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The stored content type.
    pub fn content_type(&self) -> &[u8] {
        &self.content_type
    }

    /// Upsert in place: replace the value and content-type buffers. The key
    /// and fingerprint stay as they are; an upsert is only ever reached
    /// through a key match.
    pub fn replace(&mut self, data: Vec<u8>, content_type: Vec<u8>) {
        self.data = data;
        self.content_type = content_type;
    }

    /// Probe match: fingerprint first, then key bytes.
    pub(crate) fn matches(&self, hash: u32, key: &KeyBuf) -> bool {
        self.hash == hash && self.key == *key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(key: &[u8], data: &[u8]) -> Box<Bucket> {
        let k = KeyBuf::truncate(key);
        let hash = k.fingerprint();
        Bucket::new(k, hash, data.to_vec(), b"text/plain".to_vec())
    }

    #[test]
    fn test_accessors() {
        let b = bucket(b"k", b"value");
        assert_eq!(b.key().as_bytes(), b"k");
        assert_eq!(b.data(), b"value");
        assert_eq!(b.content_type(), b"text/plain");
        assert_eq!(b.hash(), KeyBuf::truncate(b"k").fingerprint());
    }

    #[test]
    fn test_replace_keeps_key_and_hash() {
        let mut b = bucket(b"k", b"old");
        let hash = b.hash();
        b.replace(b"new-and-longer".to_vec(), b"application/json".to_vec());
        assert_eq!(b.data(), b"new-and-longer");
        assert_eq!(b.content_type(), b"application/json");
        assert_eq!(b.hash(), hash);
        assert_eq!(b.key().as_bytes(), b"k");
    }

    #[test]
    fn test_matches() {
        let b = bucket(b"k", b"v");
        let probe = KeyBuf::truncate(b"k");
        assert!(b.matches(probe.fingerprint(), &probe));
        let other = KeyBuf::truncate(b"not-k");
        assert!(!b.matches(other.fingerprint(), &other));
    }
}
