//! Content integrity engine for Arca.
//!
//! Provides move-only digest accumulators, range-bound hash strategies, a
//! streaming processor that feeds many strategies from one pass over the
//! data, and the SHA-256 tree hash required by cold-archive storage.
//!
//! Digests come from the RustCrypto, blake3 and crc32fast crates.

pub mod accumulator;
pub mod error;
pub mod processor;
pub mod strategy;
pub mod tree;
pub mod verify;

pub use accumulator::{digest_hex, Accumulator};
pub use error::{HashError, HashResult};
pub use processor::{process, process_with_block_size, MultiHashOutput, MultiHasher, DEFAULT_BLOCK_SIZE};
pub use strategy::{HashStrategy, Span};
pub use tree::{
    tree_hash, tree_hash_from_digests, tree_hash_from_hex_strings, tree_hash_reader, TreeHasher,
    TREE_HASH_CHUNK_SIZE,
};
pub use verify::{verify, HashMismatch, VerificationReport};
