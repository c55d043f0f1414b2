use std::io::Read;

use arca_types::{create_byte_ranges, ByteRange};
use tracing::{debug, info, warn};

use crate::error::{UploadError, UploadResult};
use crate::info::MultipartUploadInfo;
use crate::session::{CompletedUpload, ContentDescription, UploadHandle, UploadSession, UploadState};
use crate::source::{ByteSource, PartRead};
use crate::traits::BackendAdapter;

/// Drives chunked uploads against one backend adapter.
///
/// Every session this engine touches ends `Completed` or `Aborted`: any
/// failure after initiation triggers exactly one abort attempt before the
/// error is returned.
#[derive(Debug)]
pub struct ChunkedUploader<A> {
    adapter: A,
    info: MultipartUploadInfo,
}

impl<A: BackendAdapter> ChunkedUploader<A> {
    /// Use the adapter's own upload parameters.
    pub fn new(adapter: A) -> Self {
        let info = adapter.upload_info().clone();
        Self { adapter, info }
    }

    /// Override the adapter's part size.
    pub fn with_part_size(adapter: A, part_size: u64) -> UploadResult<Self> {
        let info = adapter.upload_info().clone().with_part_size(part_size)?;
        Ok(Self { adapter, info })
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn info(&self) -> &MultipartUploadInfo {
        &self.info
    }

    /// Start an upload of `content`.
    ///
    /// Empty content is rejected before the backend is contacted.
    pub fn initiate(&self, content: &ContentDescription) -> UploadResult<UploadSession> {
        let parts = self.info.validate_content_length(content.size)?;
        let planned = create_byte_ranges(self.info.part_size, content.size)?;
        debug_assert_eq!(planned.len() as u64, parts);

        let upload_id = self
            .adapter
            .initiate(content)
            .map_err(|source| UploadError::Initiation {
                key: content.key.clone(),
                source,
            })?;
        info!(
            upload_id = %upload_id,
            key = %content.key,
            backend = %self.adapter.kind(),
            size = content.size,
            parts,
            part_size = self.info.part_size,
            "upload initiated"
        );
        Ok(UploadSession::new(
            UploadHandle {
                upload_id,
                key: content.key.clone(),
            },
            self.adapter.kind(),
            content.size,
            planned,
            &self.info.required_algorithms,
        ))
    }

    /// Read, hash and transmit the next part.
    ///
    /// The source is moved in and handed back on success. On failure the
    /// session is aborted and the source is dropped.
    pub fn upload_part<R: Read>(
        &self,
        session: &mut UploadSession,
        mut source: ByteSource<R>,
    ) -> UploadResult<ByteSource<R>> {
        session.ensure_state(&[UploadState::Initiated, UploadState::PartsInFlight], "upload a part")?;
        let Some((number, range)) = session.next_part() else {
            return Err(UploadError::InvalidState {
                upload_id: session.upload_id().to_string(),
                state: session.state(),
                operation: "upload a part past the last planned one",
            });
        };
        match self.send_part(session, number, range, &mut source) {
            Ok(()) => Ok(source),
            Err(err) => {
                warn!(upload_id = %session.upload_id(), error = %err, "part upload failed");
                self.abort(session);
                Err(err)
            }
        }
    }

    fn send_part<R: Read>(
        &self,
        session: &mut UploadSession,
        number: u32,
        range: ByteRange,
        source: &mut ByteSource<R>,
    ) -> UploadResult<()> {
        let upload_id = session.upload_id().to_string();
        session.transition(UploadState::PartsInFlight);

        let body = match source.read_part(range) {
            Ok(PartRead::Complete(body)) => body,
            Ok(PartRead::Truncated { read }) => {
                return Err(UploadError::SourceTruncated {
                    upload_id,
                    part_number: number,
                    expected: range.length(),
                    read,
                })
            }
            Ok(PartRead::OutOfOrder { position }) => {
                return Err(UploadError::SourceOutOfOrder {
                    upload_id,
                    part_number: number,
                    position,
                    expected: range.from(),
                })
            }
            Err(source) => {
                return Err(UploadError::Source {
                    upload_id,
                    part_number: number,
                    source,
                })
            }
        };

        let part = session.hash_part(number, range, &body, &self.info)?;
        debug!(
            upload_id = %upload_id,
            part = number,
            range = %range,
            content_hash = %part.content_hash().value(),
            "transmitting part"
        );
        let receipt = self
            .adapter
            .transmit_part(session.handle(), &part, session.total_size(), body)
            .map_err(|source| UploadError::PartUpload {
                upload_id: upload_id.clone(),
                part_number: number,
                source,
            })?;
        session.record_part(part, receipt);
        Ok(())
    }

    /// Finish the upload once every part has been sent.
    ///
    /// Only a session with parts in flight can complete; calling this before
    /// the first part is refused and leaves the session as it was. A missing
    /// part or a rejected completion aborts the session.
    pub fn complete(&self, session: &mut UploadSession) -> UploadResult<CompletedUpload> {
        session.ensure_state(&[UploadState::PartsInFlight], "complete")?;
        match self.finish(session) {
            Ok(done) => Ok(done),
            Err(err) => {
                warn!(upload_id = %session.upload_id(), error = %err, "upload completion failed");
                self.abort(session);
                Err(err)
            }
        }
    }

    fn finish(&self, session: &mut UploadSession) -> UploadResult<CompletedUpload> {
        if session.remaining_parts() > 0 {
            return Err(UploadError::IncompleteUpload {
                upload_id: session.upload_id().to_string(),
                sent: session.parts().len(),
                expected: session.planned_ranges().len(),
            });
        }
        let aggregate = session.finalize_aggregates(&self.info.required_algorithms)?;
        let content_id = self
            .adapter
            .complete(session.handle(), session.total_size(), session.receipts(), &aggregate)
            .map_err(|source| UploadError::Completion {
                upload_id: session.upload_id().to_string(),
                source,
            })?;
        session.transition(UploadState::Completed);
        info!(
            upload_id = %session.upload_id(),
            content_id = %content_id,
            size = session.total_size(),
            parts = session.parts().len(),
            "upload completed"
        );
        Ok(session.completed(content_id, aggregate))
    }

    /// Abort the session. Idempotent: a terminal session is left untouched,
    /// so the backend sees at most one abort per session.
    ///
    /// A failed abort is logged, not returned; the session still ends
    /// `Aborted`.
    pub fn abort(&self, session: &mut UploadSession) {
        if session.is_terminal() {
            debug!(upload_id = %session.upload_id(), state = %session.state(), "abort skipped");
            return;
        }
        session.transition(UploadState::Aborted);
        match self.adapter.abort(session.handle()) {
            Ok(()) => info!(upload_id = %session.upload_id(), "upload aborted"),
            Err(err) => warn!(
                upload_id = %session.upload_id(),
                error = %err,
                "abort failed; parts may remain on the backend"
            ),
        }
    }

    /// Upload `content` read from `reader` from start to finish.
    pub fn upload<R: Read>(&self, content: &ContentDescription, reader: R) -> UploadResult<CompletedUpload> {
        let mut session = self.initiate(content)?;
        let mut source = ByteSource::new(reader);
        while session.remaining_parts() > 0 {
            source = self.upload_part(&mut session, source)?;
        }
        match source.is_exhausted() {
            Ok(true) => {}
            Ok(false) => {
                self.abort(&mut session);
                return Err(UploadError::SourceOverrun {
                    upload_id: session.upload_id().to_string(),
                    declared: content.size,
                });
            }
            Err(err) => {
                self.abort(&mut session);
                return Err(err.into());
            }
        }
        self.complete(&mut session)
    }
}
