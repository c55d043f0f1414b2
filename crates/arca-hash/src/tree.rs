use std::io::{ErrorKind, Read};

use arca_types::Digest256;
use sha2::{Digest, Sha256};

use crate::error::{HashError, HashResult};

/// Size of the leaf sub-chunks of a tree hash (1 MiB).
pub const TREE_HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Incremental SHA-256 tree hasher.
///
/// Bytes are split into consecutive 1 MiB sub-chunks (the last one may be
/// shorter). Each sub-chunk's SHA-256 digest becomes a leaf; leaves are then
/// reduced pairwise by [`tree_hash_from_digests`].
pub struct TreeHasher {
    /// Running digest of the sub-chunk being filled.
    current: Sha256,
    /// Bytes already fed into `current`.
    current_len: usize,
    /// Digests of completed sub-chunks.
    leaves: Vec<Digest256>,
    total: u64,
}

impl TreeHasher {
    pub fn new() -> Self {
        Self {
            current: Sha256::new(),
            current_len: 0,
            leaves: Vec::new(),
            total: 0,
        }
    }

    /// Feed the next bytes in order.
    pub fn update(&mut self, mut data: &[u8]) {
        self.total += data.len() as u64;
        while !data.is_empty() {
            let take = (TREE_HASH_CHUNK_SIZE - self.current_len).min(data.len());
            self.current.update(&data[..take]);
            self.current_len += take;
            data = &data[take..];

            if self.current_len == TREE_HASH_CHUNK_SIZE {
                self.close_chunk();
            }
        }
    }

    /// Total bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.total
    }

    /// Reduce the leaves to the root digest. Fails if no byte was fed.
    pub fn finalize(mut self) -> HashResult<Digest256> {
        if self.current_len > 0 {
            self.close_chunk();
        }
        tree_hash_from_digests(&self.leaves)
    }

    fn close_chunk(&mut self) {
        let bytes: [u8; 32] = self.current.finalize_reset().into();
        self.leaves.push(Digest256::from_bytes(bytes));
        self.current_len = 0;
    }
}

impl Default for TreeHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Tree hash of an in-memory buffer.
pub fn tree_hash(data: &[u8]) -> HashResult<Digest256> {
    let mut hasher = TreeHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Tree hash of everything `reader` yields.
pub fn tree_hash_reader<R: Read>(mut reader: R) -> HashResult<Digest256> {
    let mut hasher = TreeHasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    hasher.finalize()
}

/// Merkle reduction over precomputed sub-chunk (or part) digests.
///
/// Adjacent digests are paired left to right and the SHA-256 of their
/// concatenation forms the next level. An unpaired last digest is carried to
/// the next level unchanged. A single digest is returned as is.
pub fn tree_hash_from_digests(digests: &[Digest256]) -> HashResult<Digest256> {
    if digests.is_empty() {
        return Err(HashError::EmptyInput);
    }

    let mut current = digests.to_vec();
    while current.len() > 1 {
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        for pair in current.chunks(2) {
            match pair {
                [left, right] => next.push(hash_pair(left, right)),
                [odd] => next.push(*odd),
                _ => unreachable!("chunks(2) yields one or two digests"),
            }
        }
        current = next;
    }
    Ok(current[0])
}

/// Same as [`tree_hash_from_digests`], decoding hex digests first.
///
/// Backends that return a per-part tree hash let the whole-archive tree hash
/// be rebuilt without re-reading the content, provided every part except the
/// last spans a power-of-two number of sub-chunks.
pub fn tree_hash_from_hex_strings<S: AsRef<str>>(hexes: &[S]) -> HashResult<Digest256> {
    let digests = hexes
        .iter()
        .map(|h| Digest256::from_hex(h.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    tree_hash_from_digests(&digests)
}

fn hash_pair(left: &Digest256, right: &Digest256) -> Digest256 {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest256::from_bytes(hasher.finalize().into())
}
