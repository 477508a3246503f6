//! # PantryDB
//!
//! An embeddable, in-process key/value store. All live data stays in
//! memory in a chained hash table; durability comes from two on-disk
//! mechanisms that complement each other:
//!
//! - a full binary **snapshot** (`<name>.dump`), published atomically, and
//! - an **append-only command log** (`<name>.aol`) that records every
//!   mutation and is replayed on open.
//!
//! # Quick Start
//!
//! ```no_run
//! use pantrydb::{Database, Features};
//!
//! fn main() -> pantrydb::Result<()> {
//!     let mut db = Database::open("./data", "sessions", Features::APPEND_ONLY)?;
//!
//!     db.put(b"user:42", b"alice")?;
//!     assert_eq!(db.get(b"user:42"), Some(&b"alice"[..]));
//!
//!     db.delete(b"user:42")?;
//!     db.close_and_save()?;
//!     Ok(())
//! }
//! ```
//!
//! # Behavior worth knowing
//!
//! - Keys are truncated to 250 bytes (and cut at the first zero byte);
//!   two keys sharing that prefix are the same key.
//! - `put` is an upsert; the log records it as `JAR` either way.
//! - The handle is single-threaded by contract. The one concession is
//!   [`Database::background_save`], which hands an owned point-in-time
//!   copy to a worker thread.
//!
//! Internal crates (core, storage, durability, engine) are not exposed;
//! the surface re-exported here is the stable one.

pub use pantry_core::config;
pub use pantry_core::{Error, KeyBuf, Result};
pub use pantry_engine::{Database, DbPaths, Features};
