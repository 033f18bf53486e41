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
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::channel::mpsc;
use futures::stream::{StreamExt, TryStreamExt};
use futures::SinkExt;
use object_store::http::HttpBuilder;
use object_store::path::Path;
use object_store::{GetOptions, ObjectStore, PutPayload};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::config::{StorageConfig, StorageType, Tunables};
use super::error::{StorageError, StorageResult};
use super::metadata::{self, Metadata};
use super::object_store::{to_object_path, to_prefix};
use super::provider::{ByteRange, ByteSource, ByteStream, FileDescriptor, StorageProvider};
use crate::util::cancel::ensure_active;

/// WebDAV storage with sidecar metadata
///
/// Data calls go through `object_store`'s HTTP store; streamed uploads and
/// collection creation (MKCOL) are issued directly with `reqwest`. The
/// cancellation token is checked once before each operation starts.
pub struct WebDavProvider {
    store: Arc<dyn ObjectStore>,
    client: reqwest::Client,
    endpoint: Url,
    tunables: Tunables,
}

impl WebDavProvider {
    /// Create a WebDAV provider from configuration.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The 'endpoint' option is missing or not a valid URL
    /// * The credentials cannot be encoded into a header
    /// * The HTTP clients cannot be built
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let tunables = Tunables::from_config(config)?;
        let endpoint = Self::parse_endpoint(config.require_option("endpoint")?)?;
        let headers = Self::auth_headers(config)?;

        for key in config.options.keys() {
            match key.as_str() {
                "endpoint" | "username" | "password" => (),
                key if StorageConfig::is_shared_option(key) => (),
                _ => warn!("Unknown WebDAV option: {}", key),
            }
        }

        let client_options = config
            .client_options()
            .with_allow_http(endpoint.scheme() == "http")
            .with_default_headers(headers.clone());
        // The HTTP store appends segments itself; a trailing slash here would
        // double up with them.
        let store = HttpBuilder::new()
            .with_url(endpoint.as_str().trim_end_matches('/'))
            .with_client_options(client_options)
            .with_retry(config.retry_config())
            .build()
            .map_err(|e| {
                StorageError::ConfigError(format!("Failed to create WebDAV store: {}", e))
            })?;

        let mut client = reqwest::Client::builder().default_headers(headers);
        if let Some(sec) = config
            .get_option("timeout")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|sec| *sec > 0)
        {
            client = client.timeout(Duration::from_secs(sec));
        }

        info!("WebDAV storage at endpoint={}", endpoint);
        Ok(Self::from_parts(
            Arc::new(store),
            client.build()?,
            endpoint,
            tunables,
        ))
    }

    /// Assemble a provider from an existing data store and HTTP client.
    pub fn from_parts(
        store: Arc<dyn ObjectStore>,
        client: reqwest::Client,
        endpoint: Url,
        tunables: Tunables,
    ) -> Self {
        Self {
            store,
            client,
            endpoint,
            tunables,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Parse the endpoint, making sure it names a collection.
    fn parse_endpoint(raw: &str) -> StorageResult<Url> {
        let mut url = Url::parse(raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    fn auth_headers(config: &StorageConfig) -> StorageResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(username) = config.get_option("username") {
            let password = config.get_option("password").map_or("", |p| p.as_str());
            let token = STANDARD.encode(format!("{}:{}", username, password));
            let mut value = HeaderValue::from_str(&format!("Basic {}", token)).map_err(|e| {
                StorageError::ConfigError(format!("Invalid WebDAV credentials: {}", e))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// URL of `path` below the endpoint.
    ///
    /// Segments are escaped exactly as the HTTP store escapes object paths,
    /// so `..` and reserved characters stay inside their segment.
    fn url_for(&self, path: &str, collection: bool) -> StorageResult<Url> {
        let location = to_object_path(path);
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StorageError::ConfigError(format!(
                    "WebDAV endpoint cannot hold paths: {}",
                    self.endpoint
                ))
            })?;
            segments.pop_if_empty().extend(location.parts());
            if collection {
                segments.push("");
            }
        }
        Ok(url)
    }

    fn sidecar_location(&self, path: &str) -> Path {
        to_object_path(&metadata::sidecar_path(
            path.trim_matches('/'),
            &self.tunables.sidecar_suffix,
        ))
    }

    async fn read_sidecar(&self, path: &str) -> StorageResult<Option<Metadata>> {
        match self.store.get(&self.sidecar_location(path)).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                if bytes.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(metadata::decode(&bytes)))
                }
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_sidecar(&self, path: &str, meta: &Metadata) -> StorageResult<()> {
        if !metadata::is_lossless(meta) {
            warn!(
                "Metadata for path={} contains '=' or newline and will not round trip",
                path
            );
        }
        self.store
            .put(
                &self.sidecar_location(path),
                PutPayload::from(metadata::encode(meta)),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for WebDavProvider {
    fn kind(&self) -> StorageType {
        StorageType::WebDav
    }

    async fn exists_with_cancel(&self, cancel: &CancellationToken, path: &str) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        match self.store.head(&to_object_path(path)).await {
            Ok(meta) => meta.size > 0,
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
            debug!("Ignoring expiry={} for WebDAV path={}", expiry, path);
        }

        if let Some(meta) = metadata {
            self.write_sidecar(path, meta).await?;
        }
        self.store
            .put(&to_object_path(path), PutPayload::from(data.to_vec()))
            .await?;

        debug!("Created WebDAV path={} size={}", path, data.len());
        Ok(())
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

        let from = to_object_path(src);
        self.store.head(&from).await?;

        let merged = match self.read_sidecar(src).await? {
            Some(current) => Some(metadata::merge(current, metadata_override)),
            None => metadata_override.cloned(),
        };
        if let Some(meta) = merged {
            self.write_sidecar(dst, &meta).await?;
        }

        self.store.copy(&from, &to_object_path(dst)).await?;

        debug!("Copied WebDAV path={} to path={}", src, dst);
        Ok(())
    }

    async fn move_file_with_cancel(
        &self,
        cancel: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> StorageResult<()> {
        ensure_active(cancel)?;

        match self
            .store
            .rename(&self.sidecar_location(src), &self.sidecar_location(dst))
            .await
        {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        self.store
            .rename(&to_object_path(src), &to_object_path(dst))
            .await?;

        info!("Moved WebDAV path={} to path={}", src, dst);
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

        let url = self.url_for(path, false)?;
        let (mut sender, receiver) = mpsc::channel::<std::io::Result<Bytes>>(1);
        let request = self
            .client
            .put(url)
            .body(reqwest::Body::wrap_stream(receiver))
            .send();

        // Each chunk goes out as soon as it is read. A read error ends the
        // body early, leaving what was already sent on the server.
        let chunk_size = self.tunables.stream_chunk_size;
        let pump = async move {
            let mut chunks = ReaderStream::with_capacity(source, chunk_size);
            let mut written = 0usize;
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                written += chunk.len();
                if sender.send(Ok(chunk)).await.is_err() {
                    // The request failed; its error is reported below.
                    break;
                }
            }
            Ok::<_, std::io::Error>(written)
        };

        let (response, pumped) = tokio::join!(request, pump);
        response?.error_for_status()?;
        let written = pumped?;

        debug!("Streamed bytes={} into WebDAV path={}", written, path);
        Ok(())
    }

    async fn read_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<Vec<u8>> {
        ensure_active(cancel)?;
        let bytes = self
            .store
            .get(&to_object_path(path))
            .await?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    async fn read_range_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        range: ByteRange,
    ) -> StorageResult<Vec<u8>> {
        range.validate()?;
        ensure_active(cancel)?;

        let options = GetOptions {
            range: Some(range.to_get_range()),
            ..Default::default()
        };
        let bytes = self
            .store
            .get_opts(&to_object_path(path), options)
            .await?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    async fn open_reader_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        range: ByteRange,
    ) -> StorageResult<ByteStream> {
        range.validate()?;
        ensure_active(cancel)?;

        let options = GetOptions {
            range: (!range.is_full()).then(|| range.to_get_range()),
            ..Default::default()
        };
        let result = self.store.get_opts(&to_object_path(path), options).await?;
        Ok(result.into_stream().map_err(StorageError::from).boxed())
    }

    async fn remove_with_cancel(&self, cancel: &CancellationToken, path: &str) -> StorageResult<()> {
        ensure_active(cancel)?;

        let location = to_object_path(path);
        self.store.head(&location).await?;

        if let Err(e) = self.store.delete(&self.sidecar_location(path)).await {
            debug!("Ignoring sidecar removal failure for path={}: {}", path, e);
        }
        self.store.delete(&location).await?;

        debug!("Removed WebDAV path={}", path);
        Ok(())
    }

    async fn stat_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<(FileDescriptor, Metadata)> {
        ensure_active(cancel)?;

        let meta = self.store.head(&to_object_path(path)).await?;
        let metadata = self.read_sidecar(path).await?.unwrap_or_default();

        let descriptor = FileDescriptor {
            name: path.to_string(),
            size: meta.size as u64,
            modified: Some(meta.last_modified),
            is_directory: false,
        };
        Ok((descriptor, metadata))
    }

    async fn clear_directory_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<()> {
        ensure_active(cancel)?;

        // One level only: nested collections are left in place.
        let listing = match self.store.list_with_delimiter(to_prefix(path).as_ref()).await {
            Ok(listing) => listing,
            Err(object_store::Error::NotFound { .. }) => {
                debug!("Nothing to clear at missing WebDAV path={}", path);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        for object in &listing.objects {
            self.store.delete(&object.location).await?;
        }

        info!(
            "Cleared count={} files under WebDAV path={}",
            listing.objects.len(),
            path
        );
        Ok(())
    }

    async fn make_directory_path_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<()> {
        ensure_active(cancel)?;

        let mkcol = Method::from_bytes(b"MKCOL")
            .map_err(|e| StorageError::Validation(format!("Invalid method: {}", e)))?;
        let mut collection = String::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            collection.push_str(segment);
            collection.push('/');

            let url = self.url_for(&collection, true)?;
            let response = self.client.request(mkcol.clone(), url).send().await?;
            match response.status() {
                // 405: the collection already exists
                StatusCode::CREATED | StatusCode::METHOD_NOT_ALLOWED => {}
                _ => {
                    response.error_for_status()?;
                }
            }
            debug!("Ensured WebDAV collection={}", collection);
        }
        Ok(())
    }
}

impl Debug for WebDavProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider(type=webdav, endpoint={})", self.endpoint)
    }
}
