//! Core types for PantryDB
//!
//! This crate defines the foundations shared by every layer of the store:
//! - Compile-time configuration constants (`config`)
//! - The unified error type (`error`)
//! - Key fingerprinting with MurmurHash3-x86-32 (`hash`)
//! - The fixed-capacity truncated key buffer (`key`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod hash;
pub mod key;

pub use error::{Error, Result};
pub use hash::murmur3_x86_32;
pub use key::KeyBuf;
