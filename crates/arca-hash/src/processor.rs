use std::io::{ErrorKind, Read};

use arca_types::{ByteRange, Hash, HashAlgorithm};
use tracing::debug;

use crate::error::{HashError, HashResult};
use crate::strategy::HashStrategy;

/// Read block size used by [`process`] (64 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Everything a pass over the stream produced.
#[derive(Debug, Default)]
pub struct MultiHashOutput {
    /// Finalized hashes, in completion order.
    pub hashes: Vec<Hash>,
    /// Strategies that could not finalize (truncated ranges, empty tree hashes).
    pub failures: Vec<HashError>,
    /// Bytes read from the stream.
    pub bytes_read: u64,
}

impl MultiHashOutput {
    /// The finalized hash for `algorithm` over `range` (`None` = whole content).
    pub fn find(&self, algorithm: HashAlgorithm, range: Option<ByteRange>) -> Option<&Hash> {
        self.hashes
            .iter()
            .find(|h| h.algorithm() == algorithm && h.range() == range)
    }

    /// All hashes, or the first failure if any strategy failed.
    pub fn into_result(self) -> HashResult<Vec<Hash>> {
        match self.failures.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.hashes),
        }
    }
}

/// Incremental single-pass multi-hash processor.
///
/// Blocks are fed in stream order. Each block goes to every strategy whose
/// span overlaps it, and a strategy is finalized as soon as the last byte of
/// its range has been fed. New strategies can join later as long as the
/// stream has not yet passed their first byte.
#[derive(Debug, Default)]
pub struct MultiHasher {
    /// Absolute offset of the next byte to be fed.
    position: u64,
    active: Vec<HashStrategy>,
    finished: Vec<Hash>,
    failures: Vec<HashError>,
}

impl MultiHasher {
    /// A processor at stream offset 0.
    pub fn new(strategies: Vec<HashStrategy>) -> Self {
        Self {
            active: strategies,
            ..Self::default()
        }
    }

    /// A processor whose first fed byte sits at absolute `position`.
    pub fn starting_at(position: u64, strategies: Vec<HashStrategy>) -> HashResult<Self> {
        let mut hasher = Self {
            position,
            ..Self::default()
        };
        for strategy in strategies {
            hasher.add_strategy(strategy)?;
        }
        Ok(hasher)
    }

    /// Register another strategy. Fails if its span starts before the
    /// current position, since those bytes are gone.
    pub fn add_strategy(&mut self, strategy: HashStrategy) -> HashResult<()> {
        let start = strategy.next_offset();
        if start < self.position {
            return Err(HashError::RangeAlreadyPassed {
                algorithm: strategy.algorithm(),
                start,
                position: self.position,
            });
        }
        self.active.push(strategy);
        Ok(())
    }

    /// Absolute offset of the next byte to be fed.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Strategies still waiting for bytes or for the end of the stream.
    pub fn pending(&self) -> usize {
        self.active.len()
    }

    /// Feed the next block of the stream.
    pub fn update(&mut self, block: &[u8]) {
        if block.is_empty() {
            return;
        }
        let offset = self.position;
        let mut i = 0;
        while i < self.active.len() {
            self.active[i].feed(offset, block);
            if self.active[i].is_complete() {
                let strategy = self.active.swap_remove(i);
                self.settle(strategy);
            } else {
                i += 1;
            }
        }
        self.position += block.len() as u64;
    }

    /// Take the hashes finalized since the last call.
    pub fn take_finished(&mut self) -> Vec<Hash> {
        std::mem::take(&mut self.finished)
    }

    /// Take the failures recorded since the last call.
    pub fn take_failures(&mut self) -> Vec<HashError> {
        std::mem::take(&mut self.failures)
    }

    /// End of stream: finalize every remaining strategy.
    pub fn finish(mut self) -> MultiHashOutput {
        let remaining = std::mem::take(&mut self.active);
        for strategy in remaining {
            self.settle(strategy);
        }
        MultiHashOutput {
            hashes: self.finished,
            failures: self.failures,
            bytes_read: self.position,
        }
    }

    fn settle(&mut self, strategy: HashStrategy) {
        match strategy.finalize() {
            Ok(hash) => {
                debug!(algorithm = %hash.algorithm(), range = ?hash.range(), "hash finalized");
                self.finished.push(hash);
            }
            Err(err) => {
                debug!(error = %err, "hash strategy failed");
                self.failures.push(err);
            }
        }
    }
}

/// Read `reader` once from start to end, feeding every strategy in one pass.
pub fn process<R: Read>(reader: R, strategies: Vec<HashStrategy>) -> HashResult<MultiHashOutput> {
    process_with_block_size(reader, strategies, DEFAULT_BLOCK_SIZE)
}

/// [`process`] with an explicit read block size.
///
/// Reading stops early once every strategy is finalized; I/O errors abort
/// the whole pass.
pub fn process_with_block_size<R: Read>(
    mut reader: R,
    strategies: Vec<HashStrategy>,
    block_size: usize,
) -> HashResult<MultiHashOutput> {
    let mut hasher = MultiHasher::new(strategies);
    let mut buf = vec![0u8; block_size.max(1)];
    while hasher.pending() > 0 {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::digest_hex;
    use crate::strategy::Span;
    use crate::tree::tree_hash;
    use arca_types::create_byte_ranges;
    use proptest::prelude::*;
    use std::io::{self, Cursor};

    fn range(from: u64, to: u64) -> ByteRange {
        ByteRange::new(from, to).unwrap()
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Reader that counts how many bytes were pulled through it.
    struct CountingReader<R> {
        inner: R,
        read: u64,
    }

    impl<R: Read> Read for CountingReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.read += n as u64;
            Ok(n)
        }
    }

    #[test]
    fn whole_and_per_part_hashes_in_one_pass() {
        let data = pattern(300_000);
        let parts = create_byte_ranges(100_000, data.len() as u64).unwrap();

        let mut strategies = vec![
            HashStrategy::whole(HashAlgorithm::Sha256),
            HashStrategy::whole(HashAlgorithm::Md5),
        ];
        for part in &parts {
            strategies.push(HashStrategy::range(HashAlgorithm::Sha256, *part));
        }

        let mut reader = CountingReader {
            inner: Cursor::new(&data),
            read: 0,
        };
        let out = process_with_block_size(&mut reader, strategies, 4096).unwrap();
        assert_eq!(reader.read, data.len() as u64);
        assert_eq!(out.bytes_read, data.len() as u64);
        assert!(out.failures.is_empty());
        assert_eq!(out.hashes.len(), 5);

        let whole = out.find(HashAlgorithm::Sha256, None).unwrap();
        assert_eq!(whole.value(), digest_hex(HashAlgorithm::Sha256, &data).unwrap());
        for part in &parts {
            let h = out.find(HashAlgorithm::Sha256, Some(*part)).unwrap();
            let bytes = &data[part.from() as usize..=part.to() as usize];
            assert_eq!(h.value(), digest_hex(HashAlgorithm::Sha256, bytes).unwrap());
        }
    }

    #[test]
    fn truncated_strategy_fails_while_others_finalize() {
        let data = pattern(1000);
        let strategies = vec![
            HashStrategy::range(HashAlgorithm::Sha256, range(0, 499)),
            HashStrategy::range(HashAlgorithm::Sha256, range(500, 1999)),
            HashStrategy::whole(HashAlgorithm::Md5),
        ];
        let out = process(Cursor::new(&data), strategies).unwrap();

        assert_eq!(out.hashes.len(), 2);
        assert!(out.find(HashAlgorithm::Sha256, Some(range(0, 499))).is_some());
        assert!(out.find(HashAlgorithm::Md5, None).is_some());
        assert!(out.find(HashAlgorithm::Sha256, Some(range(500, 1999))).is_none());

        assert_eq!(out.failures.len(), 1);
        match &out.failures[0] {
            HashError::TruncatedRange { span, consumed, .. } => {
                assert_eq!(*span, Span::Range(range(500, 1999)));
                assert_eq!(*consumed, 500);
            }
            other => panic!("unexpected failure {other}"),
        }
        assert!(matches!(out.into_result(), Err(HashError::TruncatedRange { .. })));
    }

    #[test]
    fn stops_reading_once_every_range_is_done() {
        let data = pattern(10_000);
        let mut reader = CountingReader {
            inner: Cursor::new(&data),
            read: 0,
        };
        let out = process_with_block_size(
            &mut reader,
            vec![HashStrategy::range(HashAlgorithm::Md5, range(0, 99))],
            100,
        )
        .unwrap();
        assert_eq!(out.hashes.len(), 1);
        assert_eq!(reader.read, 100);
    }

    #[test]
    fn overlapping_ranges() {
        let data = pattern(5000);
        let strategies = vec![
            HashStrategy::range(HashAlgorithm::Blake3, range(100, 3999)),
            HashStrategy::range(HashAlgorithm::Blake3, range(2000, 4999)),
            HashStrategy::range(HashAlgorithm::Crc32, range(0, 0)),
        ];
        let out = process_with_block_size(Cursor::new(&data), strategies, 333).unwrap();
        assert_eq!(out.hashes.len(), 3);
        let h = out.find(HashAlgorithm::Blake3, Some(range(2000, 4999))).unwrap();
        assert_eq!(h.value(), digest_hex(HashAlgorithm::Blake3, &data[2000..]).unwrap());
    }

    #[test]
    fn tree_hash_strategy_matches_direct_tree_hash() {
        let data = pattern(3 * 1024 * 1024 + 17);
        let out = process(
            Cursor::new(&data),
            vec![HashStrategy::whole(HashAlgorithm::TreeSha256)],
        )
        .unwrap();
        assert_eq!(out.hashes[0].value(), tree_hash(&data).unwrap().to_hex());
    }

    #[test]
    fn empty_stream_with_tree_hash_fails() {
        let out = process(
            Cursor::new(Vec::new()),
            vec![
                HashStrategy::whole(HashAlgorithm::TreeSha256),
                HashStrategy::whole(HashAlgorithm::Sha256),
            ],
        )
        .unwrap();
        assert_eq!(out.hashes.len(), 1);
        assert!(matches!(out.failures[0], HashError::EmptyInput));
    }

    #[test]
    fn io_error_aborts_the_pass() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
            }
        }
        let err = process(Broken, vec![HashStrategy::whole(HashAlgorithm::Md5)]).unwrap_err();
        assert!(matches!(err, HashError::Io(_)));
    }

    #[test]
    fn incremental_strategies_join_mid_stream() {
        let data = pattern(600);
        let mut hasher = MultiHasher::new(vec![HashStrategy::whole(HashAlgorithm::Sha256)]);

        hasher
            .add_strategy(HashStrategy::range(HashAlgorithm::Md5, range(0, 299)))
            .unwrap();
        hasher.update(&data[..300]);
        let first = hasher.take_finished();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].range(), Some(range(0, 299)));

        hasher
            .add_strategy(HashStrategy::range(HashAlgorithm::Md5, range(300, 599)))
            .unwrap();
        assert!(matches!(
            hasher.add_strategy(HashStrategy::range(HashAlgorithm::Md5, range(0, 10))),
            Err(HashError::RangeAlreadyPassed { position: 300, .. })
        ));
        hasher.update(&data[300..]);
        assert_eq!(hasher.take_finished().len(), 1);
        assert_eq!(hasher.position(), 600);

        let out = hasher.finish();
        assert_eq!(out.hashes.len(), 1);
        assert_eq!(
            out.hashes[0].value(),
            digest_hex(HashAlgorithm::Sha256, &data).unwrap()
        );
    }

    #[test]
    fn starting_at_offset_uses_absolute_ranges() {
        let data = pattern(200);
        let mut hasher = MultiHasher::starting_at(
            1000,
            vec![HashStrategy::range(HashAlgorithm::Sha256, range(1050, 1149))],
        )
        .unwrap();
        hasher.update(&data);
        let out = hasher.finish();
        assert_eq!(
            out.hashes[0].value(),
            digest_hex(HashAlgorithm::Sha256, &data[50..150]).unwrap()
        );
        assert!(MultiHasher::starting_at(
            1000,
            vec![HashStrategy::whole(HashAlgorithm::Md5)]
        )
        .is_err());
    }

    fn arb_algorithm() -> impl Strategy<Value = HashAlgorithm> {
        prop::sample::select(HashAlgorithm::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn single_pass_equals_independent_hashing(
            data in prop::collection::vec(any::<u8>(), 1..4096),
            specs in prop::collection::vec((arb_algorithm(), any::<u16>(), any::<u16>()), 1..8),
            block_size in 1usize..700,
        ) {
            let len = data.len() as u64;
            let ranges: Vec<(HashAlgorithm, ByteRange)> = specs
                .into_iter()
                .map(|(alg, a, b)| {
                    let a = a as u64 % len;
                    let b = b as u64 % len;
                    (alg, ByteRange::new(a.min(b), a.max(b)).unwrap())
                })
                .collect();
            let strategies = ranges
                .iter()
                .map(|(alg, r)| HashStrategy::range(*alg, *r))
                .collect();

            let out = process_with_block_size(Cursor::new(&data), strategies, block_size).unwrap();
            prop_assert!(out.failures.is_empty());
            prop_assert_eq!(out.hashes.len(), ranges.len());
            for (alg, r) in &ranges {
                let expected = digest_hex(*alg, &data[r.from() as usize..=r.to() as usize]).unwrap();
                let found = out.find(*alg, Some(*r)).unwrap();
                prop_assert_eq!(found.value(), expected.as_str());
            }
        }
    }
}
