//! Durability pipeline for PantryDB
//!
//! Two complementary on-disk mechanisms:
//!
//! - **Dump** (`dump`): a full binary snapshot of every record, published
//!   atomically via a temp file and rename.
//! - **Append-only log** (`aol`): one newline-framed text command per
//!   mutation, replayed in order on open.
//!
//! Both modules deal purely in files and records; applying loaded records
//! to the live index is the engine's job.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aol;
pub mod dump;

pub use aol::{AolReader, AolRecord, AolWriter};
pub use dump::{DumpReader, DumpRecord};
