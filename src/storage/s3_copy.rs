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

//! Server-side copies that replace object metadata.
//!
//! `object_store` copies always carry the source metadata along, so copies
//! that rewrite metadata go through the S3 API directly with
//! `MetadataDirective=REPLACE`. Sources larger than a single CopyObject
//! allows are copied part by part with UploadPartCopy.

use async_trait::async_trait;
use aws_config::environment::EnvironmentVariableCredentialsProvider;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, MetadataDirective};
use aws_sdk_s3::Client;
use object_store::path::Path;
use tracing::{debug, info, warn};
use url::Url;

use super::config::StorageConfig;
use super::error::{StorageError, StorageResult};
use super::metadata::Metadata;

/// Largest object a single CopyObject request accepts.
pub const MAX_COPY_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Part size for multipart copies of larger objects.
pub const COPY_PART_SIZE: u64 = 512 * 1024 * 1024;

/// Copies an object on the server while replacing its metadata.
#[async_trait]
pub trait MetadataCopy: Send + Sync {
    /// Copy `from` to `to` without moving the content through the client.
    ///
    /// # Arguments
    ///
    /// * `from` - Source object
    /// * `to` - Destination object
    /// * `size` - Size of the source in bytes
    /// * `metadata` - Metadata the destination ends up with, replacing
    ///   whatever the source carried
    async fn copy_replacing_metadata(
        &self,
        from: &Path,
        to: &Path,
        size: u64,
        metadata: &Metadata,
    ) -> StorageResult<()>;
}

/// [`MetadataCopy`] through the AWS S3 SDK.
pub struct S3MetadataCopy {
    client: Client,
    bucket: String,
    part_size: u64,
}

impl S3MetadataCopy {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            part_size: COPY_PART_SIZE,
        }
    }

    /// Build an S3 client from the same options as the object store.
    ///
    /// Static credentials are used when both keys are configured, otherwise
    /// they are taken from the `AWS_*` environment variables. Requests use
    /// path-style addressing, matching the object store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the 'bucket' option is missing.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let bucket = config.require_option("bucket")?;
        let region = config
            .get_option("region")
            .map_or("us-east-1", |r| r.as_str());

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .force_path_style(true);

        builder = match (
            config.get_option("access_key_id"),
            config.get_option("secret_access_key"),
        ) {
            (Some(key_id), Some(secret)) => {
                let token = config
                    .get_option("session_token")
                    .or_else(|| config.get_option("token"))
                    .cloned();
                builder.credentials_provider(Credentials::new(
                    key_id, secret, token, None, "storekit",
                ))
            }
            _ => builder.credentials_provider(EnvironmentVariableCredentialsProvider::new()),
        };
        if let Some(endpoint) = config.get_option("endpoint") {
            builder = builder.endpoint_url(endpoint);
        }

        debug!("S3 copy client for bucket={} region={}", bucket, region);
        Ok(Self::new(Client::from_conf(builder.build()), bucket.as_str()))
    }

    async fn copy_in_parts(
        &self,
        source: &str,
        to: &Path,
        size: u64,
        metadata: &Metadata,
    ) -> StorageResult<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(to.as_ref())
            .set_metadata(Some(metadata.clone()))
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::Validation(format!("No upload id for {}", to)))?
            .to_string();

        let result = async {
            let parts = self.copy_parts(source, to, size, &upload_id).await?;
            let count = parts.len();
            self.client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(to.as_ref())
                .upload_id(&upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(parts))
                        .build(),
                )
                .send()
                .await
                .map_err(aws_sdk_s3::Error::from)?;
            Ok::<_, StorageError>(count)
        }
        .await;

        match result {
            Ok(count) => {
                info!("Copied parts={} into object path={}", count, to);
                Ok(())
            }
            Err(err) => {
                warn!("Aborting multipart copy to path={}: {}", to, err);
                self.client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(to.as_ref())
                    .upload_id(&upload_id)
                    .send()
                    .await
                    .map_err(aws_sdk_s3::Error::from)?;
                Err(err)
            }
        }
    }

    async fn copy_parts(
        &self,
        source: &str,
        to: &Path,
        size: u64,
        upload_id: &str,
    ) -> StorageResult<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        for (index, (start, end)) in part_ranges(size, self.part_size).into_iter().enumerate() {
            let part_number = index as i32 + 1;
            let response = self
                .client
                .upload_part_copy()
                .bucket(&self.bucket)
                .key(to.as_ref())
                .upload_id(upload_id)
                .part_number(part_number)
                .copy_source(source)
                .copy_source_range(format!("bytes={}-{}", start, end))
                .send()
                .await
                .map_err(aws_sdk_s3::Error::from)?;

            let tag = response
                .copy_part_result()
                .and_then(|result| result.e_tag())
                .map(str::to_string);
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(tag)
                    .part_number(part_number)
                    .build(),
            );
        }
        Ok(parts)
    }
}

#[async_trait]
impl MetadataCopy for S3MetadataCopy {
    async fn copy_replacing_metadata(
        &self,
        from: &Path,
        to: &Path,
        size: u64,
        metadata: &Metadata,
    ) -> StorageResult<()> {
        let source = copy_source(&self.bucket, from)?;
        if size > MAX_COPY_OBJECT_SIZE {
            return self.copy_in_parts(&source, to, size, metadata).await;
        }

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(to.as_ref())
            .copy_source(source)
            .metadata_directive(MetadataDirective::Replace)
            .set_metadata(Some(metadata.clone()))
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;
        Ok(())
    }
}

/// The `bucket/key` copy source, with each segment URL-encoded.
fn copy_source(bucket: &str, key: &Path) -> StorageResult<String> {
    let mut url = Url::parse("http://copy.invalid/")?;
    url.path_segments_mut()
        .map_err(|_| StorageError::Validation(format!("Cannot encode copy source {}", key)))?
        .pop_if_empty()
        .push(bucket)
        .extend(key.as_ref().split('/'));
    Ok(url.path().trim_start_matches('/').to_string())
}

/// Inclusive byte ranges covering `size` bytes in `part_size` pieces.
fn part_ranges(size: u64, part_size: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < size {
        let end = (start + part_size).min(size) - 1;
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::StorageType;

    #[test]
    fn test_copy_source_encodes_segments() {
        assert_eq!(
            copy_source("bucket", &Path::from("a/b.bin")).unwrap(),
            "bucket/a/b.bin"
        );
        assert_eq!(
            copy_source("bucket", &Path::from("dir/my file")).unwrap(),
            "bucket/dir/my%20file"
        );
        // The stored key keeps object_store's own escaping, which is escaped again.
        let key = Path::from("x#y");
        assert_eq!(key.as_ref(), "x%23y");
        assert_eq!(copy_source("bucket", &key).unwrap(), "bucket/x%2523y");
    }

    #[test]
    fn test_part_ranges() {
        assert_eq!(part_ranges(10, 4), vec![(0, 3), (4, 7), (8, 9)]);
        assert_eq!(part_ranges(8, 4), vec![(0, 3), (4, 7)]);
        assert!(part_ranges(0, 4).is_empty());

        let six_gib = 6 * 1024 * 1024 * 1024;
        let ranges = part_ranges(six_gib, COPY_PART_SIZE);
        assert_eq!(ranges.len(), 12);
        assert_eq!(ranges.last(), Some(&(six_gib - COPY_PART_SIZE, six_gib - 1)));
    }

    #[test]
    fn test_from_config() {
        let config = StorageConfig::s3("test-bucket")
            .with_option("region", "eu-west-1")
            .with_option("access_key_id", "AKIA")
            .with_option("secret_access_key", "SECRET")
            .with_option("endpoint", "http://localhost:9000");
        let copier = S3MetadataCopy::from_config(&config).unwrap();
        assert_eq!(copier.bucket, "test-bucket");
        assert_eq!(copier.part_size, COPY_PART_SIZE);

        assert!(matches!(
            S3MetadataCopy::from_config(&StorageConfig::new(StorageType::S3)),
            Err(StorageError::ConfigError(_))
        ));
    }
}
