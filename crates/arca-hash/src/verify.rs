use std::io::Read;

use arca_types::Hash;
use serde::Serialize;
use tracing::warn;

use crate::error::HashResult;
use crate::processor::process;
use crate::strategy::{HashStrategy, Span};

/// An expected hash and the value actually computed for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HashMismatch {
    pub expected: Hash,
    pub computed: Hash,
}

/// Outcome of checking content against a set of stored hashes.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerificationReport {
    /// Expected hashes whose recomputed value matched.
    pub verified: Vec<Hash>,
    /// Expected hashes whose recomputed value differed.
    pub mismatches: Vec<HashMismatch>,
    /// Expected hashes that could not be recomputed (content too short).
    pub unverifiable: Vec<Hash>,
    pub bytes_read: u64,
}

impl VerificationReport {
    /// Returns `true` if every expected hash was recomputed and matched.
    pub fn is_valid(&self) -> bool {
        self.mismatches.is_empty() && self.unverifiable.is_empty()
    }
}

/// Recompute every `expected` hash in one pass over `reader`.
pub fn verify<R: Read>(reader: R, expected: &[Hash]) -> HashResult<VerificationReport> {
    let strategies = expected
        .iter()
        .map(|h| {
            let span = h.range().map(Span::Range).unwrap_or(Span::Whole);
            HashStrategy::new(h.algorithm(), span)
        })
        .collect();
    let output = process(reader, strategies)?;

    let mut report = VerificationReport {
        bytes_read: output.bytes_read,
        ..VerificationReport::default()
    };
    for want in expected {
        match output.find(want.algorithm(), want.range()) {
            Some(got) if got.matches(want) => report.verified.push(want.clone()),
            Some(got) => {
                warn!(expected = %want, computed = %got.value(), "hash mismatch");
                report.mismatches.push(HashMismatch {
                    expected: want.clone(),
                    computed: got.clone(),
                });
            }
            None => report.unverifiable.push(want.clone()),
        }
    }
    Ok(report)
}
