use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use arca_hash::digest_hex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AdapterError, AdapterResult};
use crate::info::MultipartUploadInfo;
use crate::part::{PartReceipt, UploadPart};
use crate::session::{AggregateHashes, ContentDescription, UploadHandle};
use crate::traits::{BackendAdapter, BackendKind};

/// An assembled upload held by [`InMemoryBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredContent {
    pub content_id: String,
    pub key: String,
    pub description: Option<String>,
    pub data: Vec<u8>,
    pub aggregate: AggregateHashes,
}

/// How many times each adapter operation was called.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub initiate: usize,
    pub transmit: usize,
    pub complete: usize,
    pub abort: usize,
}

#[derive(Debug)]
struct PendingUpload {
    key: String,
    description: Option<String>,
    parts: BTreeMap<u32, Vec<u8>>,
}

#[derive(Debug, Default)]
struct Faults {
    initiate: bool,
    parts: HashSet<u32>,
    complete: bool,
    abort: bool,
}

#[derive(Debug, Default)]
struct Counters {
    initiate: AtomicUsize,
    transmit: AtomicUsize,
    complete: AtomicUsize,
    abort: AtomicUsize,
}

/// In-memory multipart backend.
///
/// Intended for tests and dry runs. Recomputes each part's content hash and
/// every aggregate hash on receipt, like a real service would, and supports
/// injected failures for exercising cleanup paths.
pub struct InMemoryBackend {
    info: MultipartUploadInfo,
    uploads: RwLock<HashMap<String, PendingUpload>>,
    contents: RwLock<HashMap<String, StoredContent>>,
    faults: RwLock<Faults>,
    calls: Counters,
}

impl InMemoryBackend {
    pub fn new(info: MultipartUploadInfo) -> Self {
        Self {
            info,
            uploads: RwLock::new(HashMap::new()),
            contents: RwLock::new(HashMap::new()),
            faults: RwLock::new(Faults::default()),
            calls: Counters::default(),
        }
    }

    /// Fail every initiate call.
    pub fn fail_initiate(&self) {
        self.faults.write().expect("lock poisoned").initiate = true;
    }

    /// Fail transmission of part `number`.
    pub fn fail_part(&self, number: u32) {
        self.faults.write().expect("lock poisoned").parts.insert(number);
    }

    pub fn fail_complete(&self) {
        self.faults.write().expect("lock poisoned").complete = true;
    }

    pub fn fail_abort(&self) {
        self.faults.write().expect("lock poisoned").abort = true;
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            initiate: self.calls.initiate.load(Ordering::SeqCst),
            transmit: self.calls.transmit.load(Ordering::SeqCst),
            complete: self.calls.complete.load(Ordering::SeqCst),
            abort: self.calls.abort.load(Ordering::SeqCst),
        }
    }

    /// Uploads initiated but neither completed nor aborted.
    pub fn pending_uploads(&self) -> usize {
        self.uploads.read().expect("lock poisoned").len()
    }

    /// Part numbers received so far for `upload_id`, ascending.
    pub fn received_parts(&self, upload_id: &str) -> Vec<u32> {
        self.uploads
            .read()
            .expect("lock poisoned")
            .get(upload_id)
            .map(|u| u.parts.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn content(&self, content_id: &str) -> Option<StoredContent> {
        self.contents.read().expect("lock poisoned").get(content_id).cloned()
    }

    pub fn content_count(&self) -> usize {
        self.contents.read().expect("lock poisoned").len()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(MultipartUploadInfo::object_storage())
    }
}

impl BackendAdapter for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn upload_info(&self) -> &MultipartUploadInfo {
        &self.info
    }

    fn initiate(&self, content: &ContentDescription) -> AdapterResult<String> {
        self.calls.initiate.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().expect("lock poisoned").initiate {
            return Err(AdapterError::Rejected("injected initiate failure".into()));
        }
        let upload_id = Uuid::now_v7().to_string();
        self.uploads.write().expect("lock poisoned").insert(
            upload_id.clone(),
            PendingUpload {
                key: content.key.clone(),
                description: content.description.clone(),
                parts: BTreeMap::new(),
            },
        );
        debug!(upload_id = %upload_id, key = %content.key, "memory upload initiated");
        Ok(upload_id)
    }

    fn transmit_part(
        &self,
        upload: &UploadHandle,
        part: &UploadPart,
        _total_size: u64,
        body: Vec<u8>,
    ) -> AdapterResult<PartReceipt> {
        self.calls.transmit.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().expect("lock poisoned").parts.contains(&part.number()) {
            return Err(AdapterError::Transport(format!(
                "injected failure on part {}",
                part.number()
            )));
        }
        if body.len() as u64 != part.len() {
            return Err(AdapterError::InvalidRequest(format!(
                "part {} declares {} bytes but carries {}",
                part.number(),
                part.len(),
                body.len()
            )));
        }
        let sent = part.content_hash();
        let actual = digest_hex(sent.algorithm(), &body).map_err(|e| AdapterError::Rejected(e.to_string()))?;
        if !sent.value().eq_ignore_ascii_case(&actual) {
            return Err(AdapterError::ChecksumMismatch {
                expected: sent.value().to_string(),
                actual,
            });
        }

        let mut uploads = self.uploads.write().expect("lock poisoned");
        let pending = uploads
            .get_mut(&upload.upload_id)
            .ok_or_else(|| AdapterError::UnknownUpload(upload.upload_id.clone()))?;
        pending.parts.insert(part.number(), body);
        Ok(PartReceipt::new(part.number(), Some(actual), sent.clone()))
    }

    fn complete(
        &self,
        upload: &UploadHandle,
        total_size: u64,
        parts: &[PartReceipt],
        aggregate: &AggregateHashes,
    ) -> AdapterResult<String> {
        self.calls.complete.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().expect("lock poisoned").complete {
            return Err(AdapterError::Rejected("injected completion failure".into()));
        }

        let mut uploads = self.uploads.write().expect("lock poisoned");
        let pending = uploads
            .get(&upload.upload_id)
            .ok_or_else(|| AdapterError::UnknownUpload(upload.upload_id.clone()))?;

        let received: Vec<u32> = pending.parts.keys().copied().collect();
        let listed: Vec<u32> = parts.iter().map(|r| r.number).collect();
        if received != listed {
            return Err(AdapterError::Rejected(format!(
                "part list {listed:?} does not match received parts {received:?}"
            )));
        }
        let data: Vec<u8> = pending.parts.values().flatten().copied().collect();
        if data.len() as u64 != total_size {
            return Err(AdapterError::Rejected(format!(
                "assembled {} bytes, expected {total_size}",
                data.len()
            )));
        }
        for algorithm in &self.info.required_algorithms {
            let expected = aggregate.require(*algorithm)?;
            let actual = digest_hex(*algorithm, &data).map_err(|e| AdapterError::Rejected(e.to_string()))?;
            if !expected.value().eq_ignore_ascii_case(&actual) {
                return Err(AdapterError::ChecksumMismatch {
                    expected: expected.value().to_string(),
                    actual,
                });
            }
        }

        let pending = uploads
            .remove(&upload.upload_id)
            .ok_or_else(|| AdapterError::UnknownUpload(upload.upload_id.clone()))?;
        let content_id = Uuid::now_v7().to_string();
        self.contents.write().expect("lock poisoned").insert(
            content_id.clone(),
            StoredContent {
                content_id: content_id.clone(),
                key: pending.key,
                description: pending.description,
                data,
                aggregate: aggregate.clone(),
            },
        );
        debug!(upload_id = %upload.upload_id, content_id = %content_id, "memory upload completed");
        Ok(content_id)
    }

    fn abort(&self, upload: &UploadHandle) -> AdapterResult<()> {
        self.calls.abort.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().expect("lock poisoned").abort {
            return Err(AdapterError::Transport("injected abort failure".into()));
        }
        self.uploads.write().expect("lock poisoned").remove(&upload.upload_id);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("pending_uploads", &self.pending_uploads())
            .field("content_count", &self.content_count())
            .field("calls", &self.calls())
            .finish()
    }
}
