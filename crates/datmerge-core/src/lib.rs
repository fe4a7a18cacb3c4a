//! Core types for datmerge.
//!
//! This crate provides the catalog data model shared by the bucketing engine
//! and the format front ends: entries, machines, digests, configuration, and
//! errors.

mod config;
mod digest;
mod entry;
mod error;
mod machine;

pub use config::{IndexConfig, IndexConfigBuilder, MAX_THREADS};
pub use digest::{
    DigestType, Digests, ZERO_CRC32, ZERO_MD5, ZERO_SHA1, ZERO_SHA256, ZERO_SHA384, ZERO_SHA512,
    ZERO_SPAMSUM,
};
pub use entry::{DupeType, Entry, ItemKind, ItemStatus, KindTraits, parse_size};
pub use error::IndexError;
pub use machine::{DEFAULT_MACHINE_NAME, Machine};
