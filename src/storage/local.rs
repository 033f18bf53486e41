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
use futures::StreamExt;
use std::fmt::{Debug, Formatter};
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{StorageConfig, StorageType, Tunables};
use super::error::{StorageError, StorageResult};
use super::metadata::{self, Metadata};
use super::provider::{ByteRange, ByteSource, ByteStream, FileDescriptor, StorageProvider};
use crate::util::cancel::ensure_active;
use crate::util::io::fill_chunk;

/// Local filesystem storage with sidecar metadata
///
/// Paths are resolved under a fixed root directory. Every operation checks the
/// cancellation token once and then runs to completion.
pub struct LocalProvider {
    root: PathBuf,
    tunables: Tunables,
}

impl LocalProvider {
    /// Create a provider rooted at `root`.
    ///
    /// # Errors
    ///
    /// This function will return a `ConfigError` if:
    /// * The root cannot be canonicalized (doesn't exist or permission denied)
    /// * The root is not a directory
    pub fn new(root: impl AsRef<Path>, tunables: Tunables) -> StorageResult<Self> {
        let root = root.as_ref();

        // Canonicalize the path (handles both relative and absolute paths, resolves symlinks)
        let canonical_root = root.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to resolve path '{}': {} (path must exist)",
                root.display(),
                e
            ))
        })?;

        if !canonical_root.is_dir() {
            return Err(StorageError::ConfigError(format!(
                "Base path is not a directory: {}",
                canonical_root.display()
            )));
        }

        info!("Local storage rooted at path={}", canonical_root.display());
        Ok(Self {
            root: canonical_root,
            tunables,
        })
    }

    /// Create a provider from a `local` configuration with a `path` option.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let path = config.require_option("path")?;
        Self::new(path, Tunables::from_config(config)?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` under the root.
    ///
    /// `.` and `..` are folded lexically; a path that climbs above the root is
    /// rejected.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let mut relative = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::ParentDir => {
                    if !relative.pop() {
                        return Err(StorageError::Validation(format!(
                            "Path escapes the storage root: {}",
                            path
                        )));
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        Ok(self.root.join(relative))
    }

    fn resolve_sidecar(&self, path: &str) -> StorageResult<PathBuf> {
        self.resolve(&metadata::sidecar_path(path, &self.tunables.sidecar_suffix))
    }

    async fn create_file(&self, full: &Path) -> std::io::Result<File> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(self.tunables.file_mode);
        options.open(full).await
    }

    async fn write_file(&self, full: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = self.create_file(full).await?;
        file.write_all(data).await?;
        file.flush().await
    }

    async fn write_sidecar(&self, path: &str, meta: &Metadata) -> StorageResult<()> {
        if !metadata::is_lossless(meta) {
            warn!(
                "Metadata for path={} contains '=' or newline and will not round trip",
                path
            );
        }
        let sidecar = self.resolve_sidecar(path)?;
        self.write_file(&sidecar, &metadata::encode(meta))
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    /// Decode the sidecar of `path`; `None` when it is absent or empty.
    async fn read_sidecar(&self, path: &str) -> StorageResult<Option<Metadata>> {
        let sidecar = self.resolve_sidecar(path)?;
        match fs::metadata(&sidecar).await {
            Ok(info) if info.len() > 0 => {
                let bytes = fs::read(&sidecar).await?;
                Ok(Some(metadata::decode(&bytes)))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Copy `from` to `to`, delete `from`, then sync `to`.
    async fn relocate(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        let mut input = File::open(from).await?;
        let mut output = self.create_file(to).await?;
        tokio::io::copy(&mut input, &mut output).await?;
        drop(input);
        fs::remove_file(from).await?;
        output.sync_all().await
    }

    async fn open_at(&self, path: &str, offset: u64) -> StorageResult<File> {
        let mut file = File::open(self.resolve(path)?)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(file)
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn kind(&self) -> StorageType {
        StorageType::Local
    }

    async fn exists_with_cancel(&self, cancel: &CancellationToken, path: &str) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        // An empty file counts as absent.
        let Ok(full) = self.resolve(path) else {
            return false;
        };
        match fs::metadata(full).await {
            Ok(info) => info.len() > 0,
            Err(_) => false,
        }
    }

    async fn create_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        data: &[u8],
        expiry: Option<DateTime<Utc>>,
        metadata: Option<&Metadata>,
    ) -> StorageResult<()> {
        ensure_active(cancel)?;
        if let Some(expiry) = expiry {
            debug!("Ignoring expiry={} for local path={}", expiry, path);
        }

        // With metadata only the sidecar is written; the primary is left as is.
        match metadata {
            Some(meta) => self.write_sidecar(path, meta).await,
            None => self
                .write_file(&self.resolve(path)?, data)
                .await
                .map_err(|e| StorageError::from_io(path, e)),
        }
    }

    async fn copy_with_cancel(
        &self,
        cancel: &CancellationToken,
        src: &str,
        dst: &str,
        _expiry: Option<DateTime<Utc>>,
        metadata_override: Option<&Metadata>,
    ) -> StorageResult<()> {
        ensure_active(cancel)?;

        let src_full = self.resolve(src)?;
        let dst_full = self.resolve(dst)?;
        let mut source = File::open(&src_full)
            .await
            .map_err(|e| StorageError::from_io(src, e))?;

        let merged = match self.read_sidecar(src).await? {
            Some(current) => Some(metadata::merge(current, metadata_override)),
            None => metadata_override.cloned(),
        };
        if let Some(meta) = merged {
            self.write_sidecar(dst, &meta).await?;
        }

        // Truncating the destination would wipe the source.
        if src_full == dst_full {
            debug!("Copy of local path={} onto itself keeps its content", src);
            return Ok(());
        }

        let mut destination = self
            .create_file(&dst_full)
            .await
            .map_err(|e| StorageError::from_io(dst, e))?;
        tokio::io::copy(&mut source, &mut destination).await?;
        destination.sync_all().await?;

        debug!("Copied local path={} to path={}", src, dst);
        Ok(())
    }

    async fn move_file_with_cancel(
        &self,
        cancel: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> StorageResult<()> {
        ensure_active(cancel)?;

        let src_full = self.resolve(src)?;
        let dst_full = self.resolve(dst)?;
        fs::metadata(&src_full)
            .await
            .map_err(|e| StorageError::from_io(src, e))?;
        if src_full == dst_full {
            debug!("Move of local path={} onto itself is a no-op", src);
            return Ok(());
        }

        self.relocate(&src_full, &dst_full)
            .await
            .map_err(|e| StorageError::from_io(src, e))?;

        let src_sidecar = self.resolve_sidecar(src)?;
        match fs::metadata(&src_sidecar).await {
            Ok(info) if info.len() > 0 => {
                self.relocate(&src_sidecar, &self.resolve_sidecar(dst)?)
                    .await?;
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!("Moved local path={} to path={}", src, dst);
        Ok(())
    }

    async fn stream_in_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        source: ByteSource<'_>,
        _expiry: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        ensure_active(cancel)?;

        let mut file = self
            .create_file(&self.resolve(path)?)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        let mut buf = vec![0u8; self.tunables.stream_chunk_size];
        let mut written: u64 = 0;

        // No rollback: a failed source leaves what was written so far.
        loop {
            let n = fill_chunk(&mut *source, &mut buf).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
            written += n as u64;
        }
        file.flush().await?;

        debug!("Streamed bytes={} into local path={}", written, path);
        Ok(())
    }

    async fn read_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<Vec<u8>> {
        ensure_active(cancel)?;
        fs::read(self.resolve(path)?)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn read_range_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        range: ByteRange,
    ) -> StorageResult<Vec<u8>> {
        range.validate()?;
        ensure_active(cancel)?;

        let file = self.open_at(path, range.offset).await?;
        let length = match range.length {
            Some(length) => length,
            None => {
                let size = file.metadata().await?.len();
                size.saturating_sub(range.offset)
            }
        };

        let mut buf = Vec::new();
        file.take(length).read_to_end(&mut buf).await?;
        Ok(buf)
    }

    async fn open_reader_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        range: ByteRange,
    ) -> StorageResult<ByteStream> {
        range.validate()?;
        ensure_active(cancel)?;

        let file = self.open_at(path, range.offset).await?;
        let reader: Box<dyn AsyncRead + Send + Unpin> = match range.length {
            Some(length) => Box::new(file.take(length)),
            None => Box::new(file),
        };

        Ok(
            ReaderStream::with_capacity(reader, self.tunables.stream_chunk_size)
                .map(|chunk| chunk.map_err(StorageError::from))
                .boxed(),
        )
    }

    async fn remove_with_cancel(&self, cancel: &CancellationToken, path: &str) -> StorageResult<()> {
        ensure_active(cancel)?;

        if let Err(e) = fs::remove_file(self.resolve_sidecar(path)?).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Ignoring sidecar removal failure for path={}: {}", path, e);
            }
        }
        fs::remove_file(self.resolve(path)?)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn stat_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<(FileDescriptor, Metadata)> {
        ensure_active(cancel)?;

        let info = fs::metadata(self.resolve(path)?)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        let meta = self.read_sidecar(path).await?.unwrap_or_default();

        let descriptor = FileDescriptor {
            name: path.to_string(),
            size: info.len(),
            modified: info.modified().ok().map(DateTime::<Utc>::from),
            is_directory: info.is_dir(),
        };
        Ok((descriptor, meta))
    }

    async fn clear_directory_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<()> {
        ensure_active(cancel)?;

        let full = self.resolve(path)?;
        let info = fs::metadata(&full)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        if !info.is_dir() {
            return Err(StorageError::NotADirectory(path.to_string()));
        }

        let mut removed = 0usize;
        let mut entries = fs::read_dir(&full).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
            } else {
                fs::remove_file(entry.path()).await?;
            }
            removed += 1;
        }

        info!("Cleared count={} entries under local path={}", removed, path);
        Ok(())
    }

    async fn make_directory_path_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<()> {
        ensure_active(cancel)?;

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(self.tunables.dir_mode);
        builder
            .create(self.resolve(path)?)
            .await
            .map_err(StorageError::from)
    }
}

impl Debug for LocalProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider(type=local, root={})", self.root.display())
    }
}
