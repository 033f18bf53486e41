// Copyright 2022 Adobe. All rights reserved.
// This file is licensed to you under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may obtain a copy
// of the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under
// the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR REPRESENTATIONS
// OF ANY KIND, either express or implied. See the License for the specific language
// governing permissions and limitations under the License.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use object_store::GetRange;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use super::config::StorageType;
use super::error::{StorageError, StorageResult};
use super::metadata::Metadata;

/// Description of a stored object, derived on demand from backend state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Path the object was looked up by
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Last modified timestamp (if available)
    pub modified: Option<DateTime<Utc>>,

    /// Whether the path names a directory
    pub is_directory: bool,
}

/// Byte range of a partial read
///
/// `length == None` reads from `offset` to the end of the object. An explicit
/// length must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length: Some(length),
        }
    }

    /// Range from `offset` to the end of the object.
    pub fn from_offset(offset: u64) -> Self {
        Self {
            offset,
            length: None,
        }
    }

    /// The whole object.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.offset == 0 && self.length.is_none()
    }

    /// Reject zero lengths and ranges whose end overflows.
    pub fn validate(&self) -> StorageResult<()> {
        match self.length {
            Some(0) => Err(StorageError::Validation(
                "range length must be positive".to_string(),
            )),
            Some(len) if self.offset.checked_add(len).is_none() => Err(StorageError::Validation(
                format!("range {}+{} overflows", self.offset, len),
            )),
            _ => Ok(()),
        }
    }

    /// Exclusive end offset, if the range is bounded.
    pub fn end(&self) -> Option<u64> {
        self.length.map(|len| self.offset.saturating_add(len))
    }

    /// The equivalent object-store range request.
    pub(crate) fn to_get_range(self) -> GetRange {
        match self.end() {
            Some(end) => GetRange::Bounded(self.offset..end),
            None => GetRange::Offset(self.offset),
        }
    }
}

/// Lazily consumed object contents.
pub type ByteStream = BoxStream<'static, StorageResult<Bytes>>;

/// Arbitrary-length byte source written by [`StorageProvider::stream_in`].
pub type ByteSource<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// Uniform file storage contract
///
/// This trait provides one interface over the local filesystem, WebDAV, S3 and
/// the null backend. Every backend implements the `*_with_cancel` operations;
/// the plain forms run them with a token that never fires.
///
/// How far a token reaches depends on the backend: the object store races
/// every network call against it, the local and WebDAV backends only look at
/// it before starting, and the null backend ignores it.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the backend kind, for logging and diagnostics.
    fn kind(&self) -> StorageType;

    /// Check whether an object is present.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Token checked before the lookup starts
    /// * `path` - Object path relative to the backend root
    ///
    /// # Returns
    ///
    /// `true` if the object exists. Lookup errors and a fired token report
    /// `false`. The local and WebDAV backends also report an empty object as
    /// absent.
    async fn exists_with_cancel(&self, cancel: &CancellationToken, path: &str) -> bool;

    /// Write `data` to `path`, optionally with metadata.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Cancellation token
    /// * `path` - Object path relative to the backend root
    /// * `data` - Full object contents
    /// * `expiry` - Requested expiration; no backend currently honours it
    /// * `metadata` - Key/value pairs stored with the object. On the local
    ///   backend supplying metadata writes only the sidecar record.
    ///
    /// # Returns
    ///
    /// A `Result` indicating:
    /// * `Ok(())` - The object (or its metadata) was written
    /// * `Err(StorageError)` - The write failed
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The token fired before the write started (`Canceled`)
    /// * The path escapes the backend root (`Validation`)
    /// * The underlying filesystem or transport fails
    async fn create_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        data: &[u8],
        expiry: Option<DateTime<Utc>>,
        metadata: Option<&Metadata>,
    ) -> StorageResult<()>;

    /// Copy `src` to `dst`, merging `metadata_override` on top of the source
    /// metadata (override wins key by key).
    ///
    /// # Arguments
    ///
    /// * `cancel` - Cancellation token
    /// * `src` - Existing object to copy
    /// * `dst` - Destination path; overwritten if present
    /// * `expiry` - Requested expiration of the copy; ignored
    /// * `metadata_override` - Keys that replace or extend the source metadata
    ///
    /// # Returns
    ///
    /// A `Result` indicating:
    /// * `Ok(())` - The destination holds the source content and merged metadata
    /// * `Err(StorageError)` - The copy failed
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * `src` is absent (`NotFound`)
    /// * The token fired (`Canceled`)
    /// * The underlying filesystem or transport fails. The copy is not
    ///   atomic, so the destination metadata may already be written.
    async fn copy_with_cancel(
        &self,
        cancel: &CancellationToken,
        src: &str,
        dst: &str,
        expiry: Option<DateTime<Utc>>,
        metadata_override: Option<&Metadata>,
    ) -> StorageResult<()>;

    /// Relocate `src` and its metadata to `dst`.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Cancellation token
    /// * `src` - Existing object to move
    /// * `dst` - Destination path; overwritten if present
    ///
    /// # Returns
    ///
    /// A `Result` indicating:
    /// * `Ok(())` - `dst` holds the object and `src` is gone
    /// * `Err(StorageError)` - The move failed part way or never started
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * `src` is absent (`NotFound`)
    /// * The object store does not confirm the copy or delete in time (`Timeout`)
    /// * The token fired (`Canceled`)
    /// * The underlying filesystem or transport fails. The move is not
    ///   atomic, so both copies may be left behind.
    async fn move_file_with_cancel(
        &self,
        cancel: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> StorageResult<()>;

    /// Write everything `source` yields to `path`.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Cancellation token
    /// * `path` - Destination path
    /// * `source` - Reader consumed until end of input
    /// * `expiry` - Requested expiration; ignored
    ///
    /// # Returns
    ///
    /// A `Result` indicating:
    /// * `Ok(())` - The whole source was stored
    /// * `Err(StorageError)` - Reading or writing failed
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * Reading from `source` fails. The local and WebDAV backends keep what
    ///   was written so far; the object store aborts the upload and shows
    ///   nothing.
    /// * The token fired (`Canceled`)
    /// * The underlying filesystem or transport fails
    async fn stream_in_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        source: ByteSource<'_>,
        expiry: Option<DateTime<Utc>>,
    ) -> StorageResult<()>;

    /// Read a whole object.
    ///
    /// # Errors
    ///
    /// `NotFound` if the object is absent, `Canceled` if the token fired.
    async fn read_with_cancel(&self, cancel: &CancellationToken, path: &str)
        -> StorageResult<Vec<u8>>;

    /// Read part of an object.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Cancellation token
    /// * `path` - Object to read
    /// * `range` - Offset and optional length; no length reads to the end
    ///
    /// # Returns
    ///
    /// The bytes in range. A range ending past the end is truncated.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The range has a zero length (`Validation`)
    /// * The object is absent (`NotFound`)
    /// * The offset lies past the end on a remote backend
    async fn read_range_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        range: ByteRange,
    ) -> StorageResult<Vec<u8>>;

    /// Open a lazily consumed stream over part of an object.
    ///
    /// The object is looked up before this returns, so `NotFound` surfaces
    /// here rather than from the stream. Errors while the stream is consumed
    /// arrive as stream items.
    async fn open_reader_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        range: ByteRange,
    ) -> StorageResult<ByteStream>;

    /// Remove an object together with its metadata.
    ///
    /// # Errors
    ///
    /// `NotFound` if the object is absent. A failure to remove the sidecar
    /// record is logged and ignored.
    async fn remove_with_cancel(&self, cancel: &CancellationToken, path: &str)
        -> StorageResult<()>;

    /// Describe an object and return its metadata.
    ///
    /// # Returns
    ///
    /// A `Result` containing:
    /// * `Ok((FileDescriptor, Metadata))` - Size, modification time and the
    ///   stored metadata (empty when none was written)
    /// * `Err(StorageError)` - `NotFound` if the object is absent
    async fn stat_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<(FileDescriptor, Metadata)>;

    /// Remove every entry under `path`.
    ///
    /// The local backend removes whole subtrees, WebDAV only the files
    /// directly inside `path`, and the object store every key with the prefix.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * A local `path` is missing (`NotFound`) or not a directory
    ///   (`NotADirectory`)
    /// * Listing or deleting fails
    async fn clear_directory_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<()>;

    /// Create `path` and any missing parents. Idempotent.
    async fn make_directory_path_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<()>;

    /// Check whether an object is present. See [`Self::exists_with_cancel`].
    async fn exists(&self, path: &str) -> bool {
        self.exists_with_cancel(&CancellationToken::new(), path)
            .await
    }

    /// Write `data` to `path`. See [`Self::create_with_cancel`].
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        expiry: Option<DateTime<Utc>>,
        metadata: Option<&Metadata>,
    ) -> StorageResult<()> {
        self.create_with_cancel(&CancellationToken::new(), path, data, expiry, metadata)
            .await
    }

    /// Copy `src` to `dst`. See [`Self::copy_with_cancel`].
    async fn copy(
        &self,
        src: &str,
        dst: &str,
        expiry: Option<DateTime<Utc>>,
        metadata_override: Option<&Metadata>,
    ) -> StorageResult<()> {
        self.copy_with_cancel(&CancellationToken::new(), src, dst, expiry, metadata_override)
            .await
    }

    /// Move `src` to `dst`. See [`Self::move_file_with_cancel`].
    async fn move_file(&self, src: &str, dst: &str) -> StorageResult<()> {
        self.move_file_with_cancel(&CancellationToken::new(), src, dst)
            .await
    }

    /// Store everything `source` yields. See [`Self::stream_in_with_cancel`].
    async fn stream_in(
        &self,
        path: &str,
        source: ByteSource<'_>,
        expiry: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        self.stream_in_with_cancel(&CancellationToken::new(), path, source, expiry)
            .await
    }

    /// Read a whole object. See [`Self::read_with_cancel`].
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.read_with_cancel(&CancellationToken::new(), path).await
    }

    /// Read part of an object. See [`Self::read_range_with_cancel`].
    async fn read_range(&self, path: &str, range: ByteRange) -> StorageResult<Vec<u8>> {
        self.read_range_with_cancel(&CancellationToken::new(), path, range)
            .await
    }

    /// Stream part of an object. See [`Self::open_reader_with_cancel`].
    async fn open_reader(&self, path: &str, range: ByteRange) -> StorageResult<ByteStream> {
        self.open_reader_with_cancel(&CancellationToken::new(), path, range)
            .await
    }

    /// Remove an object. See [`Self::remove_with_cancel`].
    async fn remove(&self, path: &str) -> StorageResult<()> {
        self.remove_with_cancel(&CancellationToken::new(), path).await
    }

    /// Describe an object. See [`Self::stat_with_cancel`].
    async fn stat(&self, path: &str) -> StorageResult<(FileDescriptor, Metadata)> {
        self.stat_with_cancel(&CancellationToken::new(), path).await
    }

    /// Empty a directory. See [`Self::clear_directory_with_cancel`].
    async fn clear_directory(&self, path: &str) -> StorageResult<()> {
        self.clear_directory_with_cancel(&CancellationToken::new(), path)
            .await
    }

    /// Create a directory path. See [`Self::make_directory_path_with_cancel`].
    async fn make_directory_path(&self, path: &str) -> StorageResult<()> {
        self.make_directory_path_with_cancel(&CancellationToken::new(), path)
            .await
    }
}

impl Debug for dyn StorageProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "StorageProvider(kind={})", self.kind())
    }
}

/// JSON convenience layered on [`StorageProvider::create`] and
/// [`StorageProvider::read`]
#[async_trait]
pub trait JsonStorageExt: StorageProvider {
    /// Serialize `value` as pretty-printed JSON and store it at `path`.
    async fn create_json<T>(
        &self,
        path: &str,
        value: &T,
        expiry: Option<DateTime<Utc>>,
        metadata: Option<&Metadata>,
    ) -> StorageResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let body = serde_json::to_vec_pretty(value)?;
        self.create(path, &body, expiry, metadata).await
    }

    /// Read `path` and deserialize it from JSON.
    async fn read_json<T>(&self, path: &str) -> StorageResult<T>
    where
        T: DeserializeOwned,
    {
        let body = self.read(path).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl<P: StorageProvider + ?Sized> JsonStorageExt for P {}
