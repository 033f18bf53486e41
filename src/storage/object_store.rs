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
use futures::stream::{StreamExt, TryStreamExt};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::multipart::MultipartStore;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, ObjectStore, PutOptions, PutPayload,
};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{StorageConfig, StorageType, Tunables};
use super::error::{StorageError, StorageResult};
use super::metadata::{self, Metadata};
use super::provider::{ByteRange, ByteSource, ByteStream, FileDescriptor, StorageProvider};
use super::s3_copy::{MetadataCopy, S3MetadataCopy};
use super::upload::ChunkedUpload;
use crate::util::cancel::run_cancellable;

/// Convert a slash separated string into an object store path.
pub(crate) fn to_object_path(path: &str) -> Path {
    Path::from(path.trim_matches('/'))
}

/// Prefix for listing under `path`; `None` lists the whole store.
pub(crate) fn to_prefix(path: &str) -> Option<Path> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(Path::from(trimmed))
    }
}

/// Object store storage with native per-object metadata
///
/// Metadata travels as `Attribute::Metadata` entries, so no sidecar objects
/// are written. Copies that rewrite metadata go through [`MetadataCopy`].
/// Every network call is raced against the cancellation token.
pub struct ObjectStoreProvider {
    store: Arc<dyn ObjectStore>,
    multipart: Arc<dyn MultipartStore>,
    copier: Arc<dyn MetadataCopy>,
    base_url: String,
    tunables: Tunables,
}

impl ObjectStoreProvider {
    /// Create a new S3 storage provider from configuration.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The 'bucket' option is missing
    /// * A tunable option does not parse
    /// * The S3 client cannot be built
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let tunables = Tunables::from_config(config)?;
        let (store, base_url) = Self::build_aws_store(config)?;
        let store = Arc::new(store);
        let copier = Arc::new(S3MetadataCopy::from_config(config)?);

        info!("Object storage at location={}", base_url);
        Ok(Self {
            store: store.clone(),
            multipart: store,
            copier,
            base_url,
            tunables,
        })
    }

    /// Wrap an existing store that supports both data and multipart calls.
    ///
    /// `copier` performs the server-side copies that replace metadata.
    pub fn from_store<S>(store: Arc<S>, copier: Arc<dyn MetadataCopy>, tunables: Tunables) -> Self
    where
        S: ObjectStore + MultipartStore,
    {
        let base_url = store.to_string();
        Self {
            store: store.clone(),
            multipart: store,
            copier,
            base_url,
            tunables,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an AWS S3 store.
    ///
    /// # Returns
    ///
    /// A tuple of the S3 store and the base S3 URL.
    fn build_aws_store(config: &StorageConfig) -> StorageResult<(AmazonS3, String)> {
        let bucket = config.require_option("bucket")?;
        let mut builder = AmazonS3Builder::new()
            .with_client_options(config.client_options())
            .with_retry(config.retry_config());
        let mut endpoint: Option<&String> = None;

        for (key, value) in &config.options {
            match key.as_str() {
                "bucket" => builder = builder.with_bucket_name(value),
                "region" => builder = builder.with_region(value),
                "access_key_id" => builder = builder.with_access_key_id(value),
                "secret_access_key" => builder = builder.with_secret_access_key(value),
                "session_token" | "token" => builder = builder.with_token(value),
                "endpoint" => {
                    endpoint = Some(value);
                    builder = builder.with_endpoint(value);
                }
                "allow_http" => {
                    if value.to_lowercase() == "true" {
                        builder = builder.with_allow_http(true);
                    }
                }
                key if StorageConfig::is_shared_option(key) => (),
                _ => {
                    warn!("Unknown AWS S3 option: {}", key);
                }
            }
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create S3 store: {}", e)))?;

        let base_url = match endpoint {
            Some(endpoint_url) => format!("{}/{}", endpoint_url.trim_end_matches('/'), bucket),
            None => format!("s3://{}", bucket),
        };

        Ok((store, base_url))
    }

    fn to_attributes(meta: &Metadata) -> Attributes {
        let mut attributes = Attributes::new();
        for (key, value) in meta {
            attributes.insert(
                Attribute::Metadata(key.clone().into()),
                AttributeValue::from(value.clone()),
            );
        }
        attributes
    }

    fn from_attributes(attributes: &Attributes) -> Metadata {
        attributes
            .iter()
            .filter_map(|(attribute, value)| match attribute {
                Attribute::Metadata(key) => {
                    let value: &str = value.as_ref();
                    Some((key.to_string(), value.to_string()))
                }
                _ => None,
            })
            .collect()
    }

    async fn head_with_metadata(
        &self,
        cancel: &CancellationToken,
        location: &Path,
    ) -> StorageResult<(object_store::ObjectMeta, Metadata)> {
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = run_cancellable(cancel, self.store.get_opts(location, options)).await?;
        let metadata = Self::from_attributes(&result.attributes);
        Ok((result.meta, metadata))
    }

    /// Poll until `location` is present (or absent), sleeping between polls.
    async fn wait_for(
        &self,
        cancel: &CancellationToken,
        location: &Path,
        present: bool,
    ) -> StorageResult<()> {
        for attempt in 1..=self.tunables.wait_attempts {
            match run_cancellable(cancel, self.store.head(location)).await {
                Ok(_) if present => return Ok(()),
                Err(StorageError::NotFound(_)) if !present => return Ok(()),
                Ok(_) | Err(StorageError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }

            if attempt < self.tunables.wait_attempts {
                debug!(
                    "Waiting for location={} present={} attempt={}",
                    location, present, attempt
                );
                let interval = self.tunables.wait_interval;
                run_cancellable(cancel, async move {
                    tokio::time::sleep(interval).await;
                    Ok::<_, StorageError>(())
                })
                .await?;
            }
        }

        Err(StorageError::Timeout(format!(
            "{} still {} after {} attempts",
            location,
            if present { "absent" } else { "present" },
            self.tunables.wait_attempts
        )))
    }

    fn log_ignored_expiry(path: &str, expiry: Option<DateTime<Utc>>) {
        if let Some(expiry) = expiry {
            warn!(
                "Object expiry is not supported, ignoring expiry={} for path={}",
                expiry, path
            );
        }
    }
}

#[async_trait]
impl StorageProvider for ObjectStoreProvider {
    fn kind(&self) -> StorageType {
        StorageType::S3
    }

    async fn exists_with_cancel(&self, cancel: &CancellationToken, path: &str) -> bool {
        run_cancellable(cancel, self.store.head(&to_object_path(path)))
            .await
            .is_ok()
    }

    async fn create_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        data: &[u8],
        expiry: Option<DateTime<Utc>>,
        metadata: Option<&Metadata>,
    ) -> StorageResult<()> {
        Self::log_ignored_expiry(path, expiry);

        let options = PutOptions {
            attributes: metadata.map(Self::to_attributes).unwrap_or_default(),
            ..Default::default()
        };
        let payload = PutPayload::from(data.to_vec());
        run_cancellable(
            cancel,
            self.store
                .put_opts(&to_object_path(path), payload, options),
        )
        .await?;

        debug!("Created object path={} size={}", path, data.len());
        Ok(())
    }

    async fn copy_with_cancel(
        &self,
        cancel: &CancellationToken,
        src: &str,
        dst: &str,
        expiry: Option<DateTime<Utc>>,
        metadata_override: Option<&Metadata>,
    ) -> StorageResult<()> {
        Self::log_ignored_expiry(dst, expiry);
        let from = to_object_path(src);
        let to = to_object_path(dst);

        let Some(overrides) = metadata_override else {
            // Server-side copy carries the metadata along.
            run_cancellable(cancel, self.store.copy(&from, &to)).await?;
            debug!("Copied object path={} to path={}", src, dst);
            return Ok(());
        };

        // The destination gets the merged set in place of the source's.
        let (meta, current) = self.head_with_metadata(cancel, &from).await?;
        let merged = metadata::merge(current, Some(overrides));
        run_cancellable(
            cancel,
            self.copier
                .copy_replacing_metadata(&from, &to, meta.size as u64, &merged),
        )
        .await?;

        debug!(
            "Copied object path={} to path={} with keys={}",
            src,
            dst,
            merged.len()
        );
        Ok(())
    }

    async fn move_file_with_cancel(
        &self,
        cancel: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> StorageResult<()> {
        let from = to_object_path(src);
        let to = to_object_path(dst);

        run_cancellable(cancel, self.store.copy(&from, &to)).await?;
        self.wait_for(cancel, &to, true).await?;

        run_cancellable(cancel, self.store.delete(&from)).await?;
        self.wait_for(cancel, &from, false).await?;

        info!("Moved object path={} to path={}", src, dst);
        Ok(())
    }

    async fn stream_in_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
        source: ByteSource<'_>,
        expiry: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        Self::log_ignored_expiry(path, expiry);

        let mut upload = ChunkedUpload::new(
            self.store.as_ref(),
            self.multipart.as_ref(),
            to_object_path(path),
            self.tunables.upload_chunk_size,
        );
        upload.run(cancel, source).await?;

        debug!(
            "Streamed parts={} into object path={}",
            upload.parts().len(),
            path
        );
        Ok(())
    }

    async fn read_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<Vec<u8>> {
        let location = to_object_path(path);
        let bytes = run_cancellable(cancel, async {
            self.store.get(&location).await?.bytes().await
        })
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
        let location = to_object_path(path);
        let options = GetOptions {
            range: Some(range.to_get_range()),
            ..Default::default()
        };
        let bytes = run_cancellable(cancel, async {
            self.store.get_opts(&location, options).await?.bytes().await
        })
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
        let options = GetOptions {
            range: (!range.is_full()).then(|| range.to_get_range()),
            ..Default::default()
        };
        let result = run_cancellable(
            cancel,
            self.store.get_opts(&to_object_path(path), options),
        )
        .await?;

        Ok(result.into_stream().map_err(StorageError::from).boxed())
    }

    async fn remove_with_cancel(&self, cancel: &CancellationToken, path: &str) -> StorageResult<()> {
        let location = to_object_path(path);
        run_cancellable(cancel, self.store.head(&location)).await?;
        run_cancellable(cancel, self.store.delete(&location)).await?;
        debug!("Removed object path={}", path);
        Ok(())
    }

    async fn stat_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<(FileDescriptor, Metadata)> {
        let (meta, metadata) = self
            .head_with_metadata(cancel, &to_object_path(path))
            .await?;

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
        let prefix = to_prefix(path);

        // The listing stream follows continuation tokens until exhausted.
        let locations: Vec<Path> = run_cancellable(cancel, async {
            self.store
                .list(prefix.as_ref())
                .map_ok(|meta| meta.location)
                .try_collect::<Vec<_>>()
                .await
        })
        .await?;

        for location in &locations {
            run_cancellable(cancel, self.store.delete(location)).await?;
        }

        info!(
            "Cleared count={} objects under path={}",
            locations.len(),
            path
        );
        Ok(())
    }

    async fn make_directory_path_with_cancel(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> StorageResult<()> {
        run_cancellable(
            cancel,
            self.store.put(&to_object_path(path), PutPayload::default()),
        )
        .await?;
        debug!("Created directory marker path={}", path);
        Ok(())
    }
}

impl Debug for ObjectStoreProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider(type=s3, base_url={})", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Server-side copy against an in-memory store. Records every call and
    /// rewrites the destination with exactly the metadata it is given.
    struct RecordingCopy {
        store: Arc<InMemory>,
        calls: Mutex<Vec<(String, String, u64, Metadata)>>,
    }

    impl RecordingCopy {
        fn new(store: Arc<InMemory>) -> Self {
            Self {
                store,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String, u64, Metadata)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetadataCopy for RecordingCopy {
        async fn copy_replacing_metadata(
            &self,
            from: &Path,
            to: &Path,
            size: u64,
            metadata: &Metadata,
        ) -> StorageResult<()> {
            self.calls.lock().unwrap().push((
                from.to_string(),
                to.to_string(),
                size,
                metadata.clone(),
            ));
            let bytes = self.store.get(from).await?.bytes().await?;
            let options = PutOptions {
                attributes: ObjectStoreProvider::to_attributes(metadata),
                ..Default::default()
            };
            self.store
                .put_opts(to, PutPayload::from(bytes), options)
                .await?;
            Ok(())
        }
    }

    /// Short polling so move tests finish quickly.
    fn fast_tunables() -> Tunables {
        Tunables {
            wait_attempts: 3,
            wait_interval: Duration::from_millis(5),
            ..Tunables::default()
        }
    }

    fn provider() -> (ObjectStoreProvider, Arc<InMemory>) {
        let (provider, copier) = recording_provider(fast_tunables());
        (provider, copier.store.clone())
    }

    fn recording_provider(tunables: Tunables) -> (ObjectStoreProvider, Arc<RecordingCopy>) {
        let store = Arc::new(InMemory::new());
        let copier = Arc::new(RecordingCopy::new(store.clone()));
        (
            ObjectStoreProvider::from_store(store, copier.clone(), tunables),
            copier,
        )
    }

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_to_object_path() {
        assert_eq!(to_object_path("/a/b.txt").as_ref(), "a/b.txt");
        assert_eq!(to_object_path("a/b/").as_ref(), "a/b");
        assert!(to_prefix("").is_none());
        assert!(to_prefix("/").is_none());
        assert_eq!(to_prefix("dir/").unwrap().as_ref(), "dir");
    }

    #[test]
    fn test_new_requires_bucket() {
        let config = StorageConfig::new(StorageType::S3);
        match ObjectStoreProvider::new(&config) {
            Err(StorageError::ConfigError(msg)) => assert!(msg.contains("bucket")),
            other => panic!("Expected ConfigError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_new_with_custom_endpoint() {
        let config = StorageConfig::s3("test-bucket")
            .with_option("region", "us-east-1")
            .with_option("access_key_id", "AKIA")
            .with_option("secret_access_key", "SECRET")
            .with_option("endpoint", "http://localhost:9000/")
            .with_option("allow_http", "true");

        let provider = ObjectStoreProvider::new(&config).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:9000/test-bucket");
        assert_eq!(provider.kind(), StorageType::S3);
    }

    #[test]
    fn test_attribute_conversion() {
        let original = meta(&[("owner", "bob"), ("team", "x")]);
        let mut attributes = ObjectStoreProvider::to_attributes(&original);
        attributes.insert(Attribute::ContentType, "text/plain".into());

        assert_eq!(ObjectStoreProvider::from_attributes(&attributes), original);
    }

    #[tokio::test]
    async fn test_create_read_round_trip() {
        let (provider, _) = provider();

        provider.create("a/b.bin", b"payload", None, None).await.unwrap();

        assert!(provider.exists("a/b.bin").await);
        assert!(!provider.exists("a/missing").await);
        assert_eq!(provider.read("a/b.bin").await.unwrap(), b"payload");
        assert!(matches!(
            provider.read("a/missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_exists_true_for_empty_object() {
        let (provider, _) = provider();
        provider.create("empty", b"", None, None).await.unwrap();
        assert!(provider.exists("empty").await);
    }

    #[tokio::test]
    async fn test_create_ignores_expiry() {
        let (provider, _) = provider();
        provider
            .create("ttl", b"x", Some(Utc::now()), None)
            .await
            .unwrap();
        assert_eq!(provider.read("ttl").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_metadata_round_trip_through_stat() {
        let (provider, store) = provider();

        provider
            .create("doc", b"content", None, Some(&meta(&[("owner", "bob")])))
            .await
            .unwrap();

        let (descriptor, metadata) = provider.stat("doc").await.unwrap();
        assert_eq!(descriptor.name, "doc");
        assert_eq!(descriptor.size, 7);
        assert!(descriptor.modified.is_some());
        assert!(!descriptor.is_directory);
        assert_eq!(metadata, meta(&[("owner", "bob")]));

        // No sidecar object is written.
        assert!(store.head(&Path::from("doc.meta")).await.is_err());
    }

    #[tokio::test]
    async fn test_stat_missing() {
        let (provider, _) = provider();
        assert!(matches!(
            provider.stat("missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_copy_without_override_keeps_metadata() {
        let (provider, copier) = recording_provider(fast_tunables());
        provider
            .create("src", b"data", None, Some(&meta(&[("owner", "bob")])))
            .await
            .unwrap();

        provider.copy("src", "dst", None, None).await.unwrap();
        assert!(copier.calls().is_empty());

        let (_, metadata) = provider.stat("dst").await.unwrap();
        assert_eq!(metadata, meta(&[("owner", "bob")]));
        assert_eq!(provider.read("dst").await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_copy_merges_metadata() {
        let (provider, copier) = recording_provider(fast_tunables());
        provider
            .create(
                "src",
                b"data",
                None,
                Some(&meta(&[("owner", "bob"), ("team", "x")])),
            )
            .await
            .unwrap();

        provider
            .copy("src", "dst", None, Some(&meta(&[("owner", "alice")])))
            .await
            .unwrap();

        // One server-side copy carrying the full merged set.
        assert_eq!(
            copier.calls(),
            vec![(
                "src".to_string(),
                "dst".to_string(),
                4,
                meta(&[("owner", "alice"), ("team", "x")])
            )]
        );

        let (_, dst_meta) = provider.stat("dst").await.unwrap();
        assert_eq!(dst_meta, meta(&[("owner", "alice"), ("team", "x")]));
        assert_eq!(provider.read("dst").await.unwrap(), b"data");

        let (_, src_meta) = provider.stat("src").await.unwrap();
        assert_eq!(src_meta, meta(&[("owner", "bob"), ("team", "x")]));
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let (provider, copier) = recording_provider(fast_tunables());
        assert!(matches!(
            provider.copy("missing", "dst", None, None).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            provider
                .copy("missing", "dst", None, Some(&meta(&[("k", "v")])))
                .await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!provider.exists("dst").await);
        assert!(copier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_copy_with_cancelled_token() {
        let (provider, copier) = recording_provider(fast_tunables());
        provider.create("src", b"data", None, None).await.unwrap();
        let token = CancellationToken::new();
        token.cancel();

        assert!(matches!(
            provider
                .copy_with_cancel(&token, "src", "dst", None, Some(&meta(&[("k", "v")])))
                .await,
            Err(StorageError::Canceled)
        ));
        assert!(copier.calls().is_empty());
        assert!(!provider.exists("dst").await);
    }

    #[tokio::test]
    async fn test_move() {
        let (provider, _) = provider();
        provider
            .create("src", b"moving", None, Some(&meta(&[("owner", "bob")])))
            .await
            .unwrap();

        provider.move_file("src", "dst").await.unwrap();

        assert!(!provider.exists("src").await);
        assert_eq!(provider.read("dst").await.unwrap(), b"moving");
        let (_, metadata) = provider.stat("dst").await.unwrap();
        assert_eq!(metadata, meta(&[("owner", "bob")]));
    }

    #[tokio::test]
    async fn test_move_missing_source() {
        let (provider, _) = provider();
        assert!(matches!(
            provider.move_file("missing", "dst").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let (provider, _) = provider();
        let result = provider
            .wait_for(&CancellationToken::new(), &Path::from("never"), true)
            .await;
        assert!(matches!(result, Err(StorageError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_stream_in_uses_parts() {
        let tunables = Tunables {
            upload_chunk_size: 10,
            ..fast_tunables()
        };
        let (provider, _) = recording_provider(tunables);

        let data: Vec<u8> = (0..95u8).collect();
        let mut source = &data[..];
        provider.stream_in("big.bin", &mut source, None).await.unwrap();

        assert_eq!(provider.read("big.bin").await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_stream_in_empty_source() {
        let (provider, _) = provider();
        let mut source = &b""[..];
        provider.stream_in("empty.bin", &mut source, None).await.unwrap();

        assert!(provider.exists("empty.bin").await);
        assert!(provider.read("empty.bin").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_range() {
        let (provider, _) = provider();
        provider.create("p", b"hello", None, None).await.unwrap();

        assert_eq!(
            provider.read_range("p", ByteRange::new(2, 3)).await.unwrap(),
            b"llo"
        );
        assert_eq!(
            provider
                .read_range("p", ByteRange::from_offset(1))
                .await
                .unwrap(),
            b"ello"
        );
        assert_eq!(
            provider.read_range("p", ByteRange::new(3, 100)).await.unwrap(),
            b"lo"
        );
        assert!(matches!(
            provider.read_range("p", ByteRange::new(1, 0)).await,
            Err(StorageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_open_reader() {
        let (provider, _) = provider();
        provider.create("p", b"hello world", None, None).await.unwrap();

        let chunks: Vec<_> = provider
            .open_reader("p", ByteRange::new(6, 5))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"world");

        let whole: Vec<_> = provider
            .open_reader("p", ByteRange::full())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(whole.concat(), b"hello world");

        assert!(matches!(
            provider.open_reader("missing", ByteRange::full()).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let (provider, _) = provider();
        provider.create("doc", b"x", None, None).await.unwrap();

        provider.remove("doc").await.unwrap();
        assert!(!provider.exists("doc").await);
        assert!(matches!(
            provider.remove("doc").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_directory() {
        let (provider, _) = provider();
        for i in 0..25 {
            provider
                .create(&format!("data/part-{}.bin", i), b"x", None, None)
                .await
                .unwrap();
        }
        provider.create("data/nested/deep.bin", b"x", None, None).await.unwrap();
        provider.create("other/keep.bin", b"x", None, None).await.unwrap();

        provider.clear_directory("data").await.unwrap();

        assert!(!provider.exists("data/part-0.bin").await);
        assert!(!provider.exists("data/nested/deep.bin").await);
        assert!(provider.exists("other/keep.bin").await);

        // Missing prefixes are a no-op.
        provider.clear_directory("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_make_directory_path() {
        let (provider, _) = provider();
        provider.make_directory_path("x/y").await.unwrap();
        provider.make_directory_path("x/y").await.unwrap();
        assert!(provider.exists("x/y").await);
    }

    #[tokio::test]
    async fn test_cancelled_token() {
        let (provider, _) = provider();
        provider.create("doc", b"x", None, None).await.unwrap();
        let token = CancellationToken::new();
        token.cancel();

        assert!(!provider.exists_with_cancel(&token, "doc").await);
        assert!(matches!(
            provider
                .create_with_cancel(&token, "new", b"x", None, None)
                .await,
            Err(StorageError::Canceled)
        ));
        assert!(matches!(
            provider.read_with_cancel(&token, "doc").await,
            Err(StorageError::Canceled)
        ));
        assert!(matches!(
            provider.move_file_with_cancel(&token, "doc", "moved").await,
            Err(StorageError::Canceled)
        ));
        assert!(!provider.exists("new").await);
        assert!(provider.exists("doc").await);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        use crate::storage::provider::JsonStorageExt;

        let (provider, _) = provider();
        let value: HashMap<String, u32> = HashMap::from([("parts".to_string(), 3)]);
        provider
            .create_json("state.json", &value, None, None)
            .await
            .unwrap();
        let back: HashMap<String, u32> = provider.read_json("state.json").await.unwrap();
        assert_eq!(back, value);
    }
}
