//! Foundation types for Arca.
//!
//! This crate provides the value types shared by the hashing engine and the
//! chunked upload state machine. Every other Arca crate depends on
//! `arca-types`.
//!
//! # Key Types
//!
//! - [`ByteRange`]: Inclusive `[from, to]` span of byte offsets
//! - [`create_byte_ranges`]: Deterministic partitioning of a content length
//! - [`HashAlgorithm`]: Closed set of supported digest algorithms
//! - [`Hash`]: Finalized hash value, optionally bound to a byte range
//! - [`Digest256`]: Raw 32-byte digest (SHA-256 and tree hash nodes)

pub mod digest;
pub mod error;
pub mod hash;
pub mod partition;
pub mod range;

pub use digest::Digest256;
pub use error::TypeError;
pub use hash::{Hash, HashAlgorithm, HashRecord};
pub use partition::{create_byte_ranges, part_count};
pub use range::ByteRange;
