//! In-memory index for PantryDB
//!
//! The index is a chained hash table: a contiguous slot array whose entries
//! head singly-linked collision chains of [`Bucket`] records. Slot placement
//! is `fingerprint & (slot_count - 1)`, so the slot count is kept a power of
//! two across resizes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bucket;
pub mod table;

pub use bucket::Bucket;
pub use table::HashTable;
