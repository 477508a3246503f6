//! The chained hash table
//!
//! A contiguous slot array heads singly-linked bucket chains. The array is
//! sized in bytes and its slot count derived from the slot-head width, so
//! doubling the byte size doubles the (power-of-two) slot count.
//!
//! Resizing fires when the record count reaches the slot count and runs
//! once per threshold: every bucket is re-slotted under the new mask, with
//! colliding buckets appended to the destination chain tail. Chains
//! moderately longer than one are normal between thresholds.

use crate::bucket::Bucket;
use pantry_core::config::{CHAIN_DEPTH_WARN, INITIAL_TABLE_BYTES, SLOT_WIDTH};
use pantry_core::KeyBuf;
use tracing::{debug, warn};

/// The in-memory index: slot array plus occupancy counters.
pub struct HashTable {
    slots: Vec<Option<Box<Bucket>>>,
    table_bytes: usize,
    record_count: usize,
    key_collisions: u64,
}

impl HashTable {
    /// An empty table at the build-time initial size.
    pub fn new() -> HashTable {
        HashTable::with_table_bytes(INITIAL_TABLE_BYTES)
    }

    /// An empty table sized at `table_bytes` (must be a power of two, at
    /// least one slot wide).
    pub fn with_table_bytes(table_bytes: usize) -> HashTable {
        debug_assert!(table_bytes.is_power_of_two());
        debug_assert!(table_bytes >= SLOT_WIDTH);
        let slot_count = table_bytes / SLOT_WIDTH;
        let mut slots = Vec::with_capacity(slot_count);
        slots.resize_with(slot_count, || None);
        HashTable {
            slots,
            table_bytes,
            record_count: 0,
            key_collisions: 0,
        }
    }

    /// Size of the slot array in bytes.
    pub fn table_bytes(&self) -> usize {
        self.table_bytes
    }

    /// Number of slots; always a power of two.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of live records.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Cumulative count of fresh insertions that landed in a non-empty slot.
    /// Rehash placements are not counted.
    pub fn key_collisions(&self) -> u64 {
        self.key_collisions
    }

    fn slot_index(&self, hash: u32) -> usize {
        hash as usize & (self.slots.len() - 1)
    }

    /// Walk the slot chain for `(hash, key)` and return the first match.
    pub fn find(&self, hash: u32, key: &KeyBuf) -> Option<&Bucket> {
        let mut cur = self.slots[self.slot_index(hash)].as_deref();
        while let Some(bucket) = cur {
            if bucket.matches(hash, key) {
                return Some(bucket);
            }
            cur = bucket.next.as_deref();
        }
        None
    }

    /// Mutable variant of [`find`](Self::find), for in-place upserts.
    pub fn find_mut(&mut self, hash: u32, key: &KeyBuf) -> Option<&mut Bucket> {
        let idx = self.slot_index(hash);
        let mut cur = self.slots[idx].as_deref_mut();
        while let Some(bucket) = cur {
            if bucket.matches(hash, key) {
                return Some(bucket);
            }
            cur = bucket.next.as_deref_mut();
        }
        None
    }

    /// Insert a bucket whose key is not already present.
    ///
    /// Grows the table first when the record count has reached the slot
    /// count, then chains the bucket at its slot's tail. The caller is
    /// responsible for the upsert check; inserting a duplicate key creates
    /// a shadowed record.
    pub fn insert(&mut self, bucket: Box<Bucket>) {
        if self.record_count > 0 && self.record_count == self.slots.len() {
            self.grow_and_rehash();
        }
        let idx = self.slot_index(bucket.hash());
        if self.slots[idx].is_some() {
            self.key_collisions += 1;
        }
        append_to_chain(&mut self.slots[idx], bucket);
        self.record_count += 1;
    }

    /// Unlink and return the bucket for `(hash, key)`.
    ///
    /// A matching head is replaced by its successor; a matching interior
    /// bucket is spliced out by relinking its predecessor.
    pub fn remove(&mut self, hash: u32, key: &KeyBuf) -> Option<Box<Bucket>> {
        let idx = self.slot_index(hash);

        let head_matches = self.slots[idx]
            .as_ref()
            .map_or(false, |b| b.matches(hash, key));
        if head_matches {
            let mut removed = self.slots[idx].take()?;
            self.slots[idx] = removed.next.take();
            self.record_count -= 1;
            return Some(removed);
        }

        let mut prev = self.slots[idx].as_deref_mut()?;
        loop {
            let next_matches = prev
                .next
                .as_ref()
                .map_or(false, |b| b.matches(hash, key));
            if next_matches {
                let mut removed = prev.next.take()?;
                prev.next = removed.next.take();
                self.record_count -= 1;
                return Some(removed);
            }
            prev = prev.next.as_deref_mut()?;
        }
    }

    /// Iterate every bucket, slot by slot, each chain head to tail. This is
    /// the serialization order of the dump format.
    pub fn iter(&self) -> Buckets<'_> {
        Buckets {
            slots: self.slots.iter(),
            cur: None,
        }
    }

    /// Drop every bucket and return how many were freed. The record count
    /// is left untouched so the caller can compare it against the freed
    /// total.
    pub fn clear(&mut self) -> usize {
        let mut freed = 0;
        for slot in self.slots.iter_mut() {
            let mut chain = slot.take();
            while let Some(mut bucket) = chain {
                chain = bucket.next.take();
                freed += 1;
            }
        }
        freed
    }

    /// Double the slot array and re-slot every bucket under the new mask.
    fn grow_and_rehash(&mut self) {
        let new_bytes = self.table_bytes * 2;
        let new_count = new_bytes / SLOT_WIDTH;
        debug!(
            old_bytes = self.table_bytes,
            new_bytes, "growing slot array"
        );

        let mut new_slots: Vec<Option<Box<Bucket>>> = Vec::with_capacity(new_count);
        new_slots.resize_with(new_count, || None);

        for slot in self.slots.iter_mut() {
            let mut chain = slot.take();
            while let Some(mut bucket) = chain {
                chain = bucket.next.take();
                let idx = bucket.hash() as usize & (new_count - 1);
                append_to_chain(&mut new_slots[idx], bucket);
            }
        }

        self.slots = new_slots;
        self.table_bytes = new_bytes;
    }
}

impl Default for HashTable {
    fn default() -> Self {
        HashTable::new()
    }
}

/// Append a bucket at the tail of a chain, warning when the walk runs
/// suspiciously deep.
fn append_to_chain(slot: &mut Option<Box<Bucket>>, bucket: Box<Bucket>) {
    let mut depth = 0usize;
    let mut cur = slot;
    while let Some(b) = cur {
        depth += 1;
        cur = &mut b.next;
    }
    if depth > CHAIN_DEPTH_WARN {
        warn!(depth, "collision chain is unusually deep");
    }
    *cur = Some(bucket);
}

/// Iterator over every bucket in the table.
pub struct Buckets<'a> {
    slots: std::slice::Iter<'a, Option<Box<Bucket>>>,
    cur: Option<&'a Bucket>,
}

impl<'a> Iterator for Buckets<'a> {
    type Item = &'a Bucket;

    fn next(&mut self) -> Option<&'a Bucket> {
        loop {
            if let Some(bucket) = self.cur {
                self.cur = bucket.next.as_deref();
                return Some(bucket);
            }
            match self.slots.next() {
                Some(slot) => self.cur = slot.as_deref(),
                None => return None,
            }
        }
    }
}
