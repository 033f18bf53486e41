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

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::config::StorageType;
use super::error::{StorageError, StorageResult};
use super::metadata::Metadata;
use super::provider::{ByteRange, ByteSource, ByteStream, FileDescriptor, StorageProvider};

/// Storage that keeps nothing.
///
/// Writes succeed and are discarded, reads come back empty and nothing ever
/// exists. The cancellation token is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProvider;

impl NullProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageProvider for NullProvider {
    fn kind(&self) -> StorageType {
        StorageType::Null
    }

    async fn exists_with_cancel(&self, _cancel: &CancellationToken, _path: &str) -> bool {
        false
    }

    async fn create_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _path: &str,
        _data: &[u8],
        _expiry: Option<DateTime<Utc>>,
        _metadata: Option<&Metadata>,
    ) -> StorageResult<()> {
        Ok(())
    }

    async fn copy_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _src: &str,
        _dst: &str,
        _expiry: Option<DateTime<Utc>>,
        _metadata_override: Option<&Metadata>,
    ) -> StorageResult<()> {
        Ok(())
    }

    async fn move_file_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _src: &str,
        _dst: &str,
    ) -> StorageResult<()> {
        Ok(())
    }

    /// Returns without reading from `source`.
    async fn stream_in_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _path: &str,
        _source: ByteSource<'_>,
        _expiry: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        Ok(())
    }

    async fn read_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _path: &str,
    ) -> StorageResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn read_range_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _path: &str,
        _range: ByteRange,
    ) -> StorageResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn open_reader_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _path: &str,
        _range: ByteRange,
    ) -> StorageResult<ByteStream> {
        Ok(stream::empty().boxed())
    }

    async fn remove_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _path: &str,
    ) -> StorageResult<()> {
        Ok(())
    }

    async fn stat_with_cancel(
        &self,
        _cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<(FileDescriptor, Metadata)> {
        Err(StorageError::NotFound(path.to_string()))
    }

    async fn clear_directory_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _path: &str,
    ) -> StorageResult<()> {
        Ok(())
    }

    async fn make_directory_path_with_cancel(
        &self,
        _cancel: &CancellationToken,
        _path: &str,
    ) -> StorageResult<()> {
        Ok(())
    }
}
