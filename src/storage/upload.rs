// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Chunked upload session
//!
//! A [`ChunkedUpload`] writes an arbitrary-length source into an object store
//! through an explicit multipart session:
//!
//! ```text
//! Idle --create--> Uploading --all parts sent--> Completing --> Done
//!                      |                              |
//!                      +------------ error -----------+--> Aborted
//! ```
//!
//! The object only becomes visible once the session completes. Any failure
//! aborts the session so that no parts are left behind.

use bytes::Bytes;
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path;
use object_store::{MultipartId, ObjectStore, PutPayload};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use super::provider::ByteSource;
use crate::util::cancel::run_cancellable;
use crate::util::io::fill_chunk;

/// Where a [`ChunkedUpload`] stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Completing,
    Done,
    Aborted,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadState::Idle => "idle",
            UploadState::Uploading => "uploading",
            UploadState::Completing => "completing",
            UploadState::Done => "done",
            UploadState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A part accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based, strictly increasing
    pub part_number: usize,
    /// Opaque tag returned by the store for this part
    pub tag: String,
}

/// One multipart upload of a source into `location`
pub struct ChunkedUpload<'a> {
    store: &'a dyn ObjectStore,
    multipart: &'a dyn MultipartStore,
    location: Path,
    chunk_size: usize,
    state: UploadState,
    upload_id: Option<MultipartId>,
    parts: Vec<CompletedPart>,
}

impl<'a> ChunkedUpload<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        multipart: &'a dyn MultipartStore,
        location: Path,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            multipart,
            location,
            chunk_size: chunk_size.max(1),
            state: UploadState::Idle,
            upload_id: None,
            parts: Vec::new(),
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    /// Drive the session from `Idle` to `Done`, or to `Aborted` on failure.
    ///
    /// # Errors
    ///
    /// * `Validation` if the session is not idle
    /// * `Canceled` if the token fires; the session is aborted first
    /// * The read, part or completion error that aborted the session, or the
    ///   abort error itself if aborting failed too
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
        source: ByteSource<'_>,
    ) -> StorageResult<()> {
        if self.state != UploadState::Idle {
            return Err(StorageError::Validation(format!(
                "upload to {} is already {}",
                self.location, self.state
            )));
        }

        let upload_id = match run_cancellable(
            cancel,
            self.multipart.create_multipart(&self.location),
        )
        .await
        {
            Ok(id) => id,
            Err(err) => {
                self.state = UploadState::Aborted;
                return Err(err);
            }
        };
        debug!("Started upload id={} to location={}", upload_id, self.location);
        self.upload_id = Some(upload_id);
        self.state = UploadState::Uploading;

        match self.upload_parts(cancel, source).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.abort(err).await),
        }
    }

    async fn upload_parts(
        &mut self,
        cancel: &CancellationToken,
        source: ByteSource<'_>,
    ) -> StorageResult<()> {
        let upload_id = self.current_id()?;
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            let n = run_cancellable(cancel, fill_chunk(&mut *source, &mut buf)).await?;
            if n == 0 {
                break;
            }

            let part_idx = self.parts.len();
            let payload = PutPayload::from(Bytes::copy_from_slice(&buf[..n]));
            let PartId { content_id } = run_cancellable(
                cancel,
                self.multipart
                    .put_part(&self.location, &upload_id, part_idx, payload),
            )
            .await?;

            debug!(
                "Uploaded part={} size={} to location={}",
                part_idx + 1,
                n,
                self.location
            );
            self.parts.push(CompletedPart {
                part_number: part_idx + 1,
                tag: content_id,
            });
        }

        if self.parts.is_empty() {
            return self.write_empty(cancel).await;
        }

        self.state = UploadState::Completing;
        self.parts.sort_by_key(|part| part.part_number);
        let part_ids = self
            .parts
            .iter()
            .map(|part| PartId {
                content_id: part.tag.clone(),
            })
            .collect();
        run_cancellable(
            cancel,
            self.multipart
                .complete_multipart(&self.location, &upload_id, part_ids),
        )
        .await?;

        self.upload_id = None;
        self.state = UploadState::Done;
        debug!(
            "Completed upload to location={} with parts={}",
            self.location,
            self.parts.len()
        );
        Ok(())
    }

    /// An empty source: drop the session, then write a zero-length object.
    async fn write_empty(&mut self, cancel: &CancellationToken) -> StorageResult<()> {
        if let Some(upload_id) = self.upload_id.take() {
            self.state = UploadState::Aborted;
            self.multipart
                .abort_multipart(&self.location, &upload_id)
                .await?;
        }

        run_cancellable(cancel, self.store.put(&self.location, PutPayload::default())).await?;
        self.state = UploadState::Done;
        debug!("Wrote empty object to location={}", self.location);
        Ok(())
    }

    /// Abort the session, returning the error the caller should see.
    ///
    /// Runs regardless of the cancellation token.
    async fn abort(&mut self, err: StorageError) -> StorageError {
        self.state = UploadState::Aborted;
        let Some(upload_id) = self.upload_id.take() else {
            return err;
        };

        match self
            .multipart
            .abort_multipart(&self.location, &upload_id)
            .await
        {
            Ok(()) => {
                warn!(
                    "Aborted upload id={} to location={}: {}",
                    upload_id, self.location, err
                );
                err
            }
            Err(abort_err) => {
                warn!(
                    "Failed to abort upload id={} to location={}: {} (after: {})",
                    upload_id, self.location, abort_err, err
                );
                abort_err.into()
            }
        }
    }

    fn current_id(&self) -> StorageResult<MultipartId> {
        self.upload_id.clone().ok_or_else(|| {
            StorageError::Validation(format!("no open upload for {}", self.location))
        })
    }
}
