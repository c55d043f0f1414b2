use std::fmt;

use arca_hash::{HashStrategy, MultiHasher};
use arca_types::{ByteRange, Hash, HashAlgorithm};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AdapterError, AdapterResult, UploadError, UploadResult};
use crate::info::MultipartUploadInfo;
use crate::part::{PartReceipt, UploadPart};
use crate::traits::BackendKind;

/// Lifecycle of an upload session.
///
/// `Initiated -> PartsInFlight -> Completed | Aborted`; `Initiated` may also
/// go straight to `Aborted`. Both terminal states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadState {
    Initiated,
    PartsInFlight,
    Completed,
    Aborted,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Completed | UploadState::Aborted)
    }

    fn can_become(&self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Initiated, PartsInFlight)
                | (Initiated, Aborted)
                | (PartsInFlight, PartsInFlight)
                | (PartsInFlight, Completed)
                | (PartsInFlight, Aborted)
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadState::Initiated => "initiated",
            UploadState::PartsInFlight => "parts-in-flight",
            UploadState::Completed => "completed",
            UploadState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Content to be uploaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescription {
    /// Object key or archive name.
    pub key: String,
    /// Total length in bytes.
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ContentDescription {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Backend identity of an in-progress upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadHandle {
    pub upload_id: String,
    pub key: String,
}

/// Whole-content hashes accumulated across every part of an upload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateHashes {
    hashes: Vec<Hash>,
}

impl AggregateHashes {
    pub fn new(hashes: Vec<Hash>) -> Self {
        Self { hashes }
    }

    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&Hash> {
        self.hashes.iter().find(|h| h.algorithm() == algorithm)
    }

    /// Like [`get`](Self::get), but a missing hash is an adapter error.
    pub fn require(&self, algorithm: HashAlgorithm) -> AdapterResult<&Hash> {
        self.get(algorithm).ok_or(AdapterError::MissingHash(algorithm))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hash> {
        self.hashes.iter()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Result of a successfully completed upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedUpload {
    pub upload_id: String,
    /// Backend-assigned identifier of the stored object or archive.
    pub content_id: String,
    pub key: String,
    pub backend: BackendKind,
    pub total_size: u64,
    pub parts: Vec<UploadPart>,
    pub aggregate: AggregateHashes,
}

/// State of one chunked upload.
///
/// Owns the single [`MultiHasher`] that produces both the per-part hashes
/// and the whole-content aggregates, so every byte is read once.
#[derive(Debug)]
pub struct UploadSession {
    handle: UploadHandle,
    backend: BackendKind,
    total_size: u64,
    planned: Vec<ByteRange>,
    parts: Vec<UploadPart>,
    receipts: Vec<PartReceipt>,
    state: UploadState,
    hasher: Option<MultiHasher>,
}

impl UploadSession {
    pub(crate) fn new(
        handle: UploadHandle,
        backend: BackendKind,
        total_size: u64,
        planned: Vec<ByteRange>,
        required: &[HashAlgorithm],
    ) -> Self {
        let aggregates = required.iter().map(|alg| HashStrategy::whole(*alg)).collect();
        Self {
            handle,
            backend,
            total_size,
            planned,
            parts: Vec::new(),
            receipts: Vec::new(),
            state: UploadState::Initiated,
            hasher: Some(MultiHasher::new(aggregates)),
        }
    }

    pub fn handle(&self) -> &UploadHandle {
        &self.handle
    }

    pub fn upload_id(&self) -> &str {
        &self.handle.upload_id
    }

    pub fn key(&self) -> &str {
        &self.handle.key
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Ranges the content was partitioned into, in part-number order.
    pub fn planned_ranges(&self) -> &[ByteRange] {
        &self.planned
    }

    /// Parts transmitted so far, in ascending order.
    pub fn parts(&self) -> &[UploadPart] {
        &self.parts
    }

    pub fn receipts(&self) -> &[PartReceipt] {
        &self.receipts
    }

    pub fn remaining_parts(&self) -> usize {
        self.planned.len() - self.parts.len()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.parts.iter().map(UploadPart::len).sum()
    }

    /// Number and range of the next part to send.
    pub fn next_part(&self) -> Option<(u32, ByteRange)> {
        let index = self.parts.len();
        self.planned
            .get(index)
            .map(|range| (index as u32 + 1, *range))
    }

    pub(crate) fn ensure_state(&self, allowed: &[UploadState], operation: &'static str) -> UploadResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(UploadError::InvalidState {
                upload_id: self.handle.upload_id.clone(),
                state: self.state,
                operation,
            })
        }
    }

    pub(crate) fn transition(&mut self, next: UploadState) {
        debug_assert!(
            self.state.can_become(next),
            "illegal upload transition {} -> {}",
            self.state,
            next
        );
        if self.state != next {
            debug!(upload_id = %self.handle.upload_id, from = %self.state, to = %next, "upload state change");
            self.state = next;
        }
    }

    /// Hash one part's bytes with the session hasher.
    ///
    /// The per-part strategies join the hasher at the part's offset and
    /// complete within `body`; the aggregate strategies keep running.
    pub(crate) fn hash_part(
        &mut self,
        number: u32,
        range: ByteRange,
        body: &[u8],
        info: &MultipartUploadInfo,
    ) -> UploadResult<UploadPart> {
        let upload_id = self.handle.upload_id.clone();
        let state = self.state;
        let hasher = self.hasher.as_mut().ok_or(UploadError::InvalidState {
            upload_id,
            state,
            operation: "hash a part",
        })?;

        hasher.add_strategy(HashStrategy::range(info.signing_algorithm, range))?;
        if info.content_algorithm != info.signing_algorithm {
            hasher.add_strategy(HashStrategy::range(info.content_algorithm, range))?;
        }
        hasher.update(body);

        if let Some(failure) = hasher.take_failures().into_iter().next() {
            return Err(failure.into());
        }
        let finished = hasher.take_finished();
        let pick = |algorithm: HashAlgorithm| {
            finished
                .iter()
                .find(|h| h.algorithm() == algorithm && h.range() == Some(range))
                .cloned()
                .ok_or(arca_hash::HashError::TruncatedRange {
                    algorithm,
                    span: arca_hash::Span::Range(range),
                    consumed: body.len() as u64,
                })
        };
        let signing = pick(info.signing_algorithm)?;
        let content = pick(info.content_algorithm)?;
        UploadPart::new(number, range, signing, content)
    }

    pub(crate) fn record_part(&mut self, part: UploadPart, receipt: PartReceipt) {
        debug_assert_eq!(part.number() as usize, self.parts.len() + 1);
        self.parts.push(part);
        self.receipts.push(receipt);
    }

    /// Finish the aggregate strategies. Can only succeed once.
    pub(crate) fn finalize_aggregates(&mut self, required: &[HashAlgorithm]) -> UploadResult<AggregateHashes> {
        let upload_id = self.handle.upload_id.clone();
        let state = self.state;
        let hasher = self.hasher.take().ok_or(UploadError::InvalidState {
            upload_id,
            state,
            operation: "finalize aggregate hashes",
        })?;
        let output = hasher.finish();
        let hashes = output.into_result()?;
        let aggregate = AggregateHashes::new(
            hashes
                .into_iter()
                .filter(|h| h.is_whole_content() && required.contains(&h.algorithm()))
                .collect(),
        );
        for algorithm in required {
            aggregate.get(*algorithm).ok_or(UploadError::Completion {
                upload_id: self.handle.upload_id.clone(),
                source: AdapterError::MissingHash(*algorithm),
            })?;
        }
        Ok(aggregate)
    }

    pub(crate) fn completed(&self, content_id: String, aggregate: AggregateHashes) -> CompletedUpload {
        CompletedUpload {
            upload_id: self.handle.upload_id.clone(),
            content_id,
            key: self.handle.key.clone(),
            backend: self.backend,
            total_size: self.total_size,
            parts: self.parts.clone(),
            aggregate,
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            warn!(
                upload_id = %self.handle.upload_id,
                state = %self.state,
                "upload session dropped before completion or abort; remote parts may be orphaned"
            );
        }
    }
}
