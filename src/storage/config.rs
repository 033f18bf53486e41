// Copyright 2022 Adobe. All rights reserved.
// This file is licensed to you under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may obtain a copy
// of the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under
// the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR REPRESENTATIONS
// OF ANY KIND, either express or implied. See the License for the specific language
// governing permissions and limitations under the License.

use object_store::{ClientOptions, RetryConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::error::{StorageError, StorageResult};

/// Suffix appended to a primary path to locate its sidecar metadata record.
pub const DEFAULT_SIDECAR_SUFFIX: &str = ".meta";

/// Part size for object-store multipart uploads.
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Buffer size used when streaming into the local and WebDAV backends.
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = 1024 * 1024;

pub const DEFAULT_FILE_MODE: u32 = 0o664;
pub const DEFAULT_DIR_MODE: u32 = 0o775;

/// Number of polls made while waiting for an object-store move to settle.
pub const DEFAULT_WAIT_ATTEMPTS: usize = 20;
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// Options consumed by the transport layer rather than by a specific backend.
const TRANSPORT_OPTIONS: [&str; 6] = [
    "timeout",
    "connect_timeout",
    "max_retries",
    "retry_timeout",
    "pool_idle_timeout",
    "pool_max_idle_per_host",
];

/// Options consumed by [`Tunables::from_config`].
const TUNABLE_OPTIONS: [&str; 7] = [
    "sidecar_suffix",
    "upload_chunk_size",
    "stream_chunk_size",
    "file_mode",
    "dir_mode",
    "wait_attempts",
    "wait_interval_ms",
];

/// Storage backend kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Local filesystem with sidecar metadata
    Local,
    /// Remote WebDAV endpoint with sidecar metadata
    #[serde(rename = "webdav", alias = "remote")]
    WebDav,
    /// S3-compatible object store with native metadata
    #[serde(rename = "s3", alias = "object_store")]
    S3,
    /// Backend that stores nothing
    #[serde(alias = "empty")]
    Null,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Local => "local",
            StorageType::WebDav => "webdav",
            StorageType::S3 => "s3",
            StorageType::Null => "null",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageType::Local),
            "webdav" | "remote" => Ok(StorageType::WebDav),
            "s3" | "aws" | "object_store" => Ok(StorageType::S3),
            "null" | "empty" => Ok(StorageType::Null),
            _ => Err(StorageError::ConfigError(format!(
                "Unknown storage type: {}",
                s
            ))),
        }
    }
}

/// Configuration for a storage backend
///
/// Backend settings live in a flat string map, the same way for every kind,
/// so a configuration can be loaded from JSON without per-backend structs.
///
/// # Examples
///
/// ## Local filesystem
/// ```
/// use storekit::storage::StorageConfig;
///
/// let config = StorageConfig::local("/tmp/data");
/// ```
///
/// ## WebDAV
/// ```
/// use storekit::storage::StorageConfig;
///
/// let config = StorageConfig::webdav("https://dav.example.com/files/")
///     .with_option("username", "alice")
///     .with_option("password", "secret");
/// ```
///
/// ## S3
/// ```
/// use storekit::storage::StorageConfig;
///
/// let config = StorageConfig::s3("my-bucket")
///     .with_option("region", "us-east-1")
///     .with_option("access_key_id", "ACCESS_KEY")
///     .with_option("secret_access_key", "SECRET_ACCESS_KEY");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend kind
    #[serde(rename = "type")]
    pub storage_type: StorageType,

    /// Backend-specific configuration options
    ///
    /// Local:
    /// - path: Root directory (must exist)
    ///
    /// WebDAV:
    /// - endpoint: Base URL of the collection
    /// - username / password: Basic authentication
    ///
    /// S3:
    /// - bucket: Bucket name
    /// - region, access_key_id, secret_access_key, session_token
    /// - endpoint: Custom endpoint URL (for S3-compatible services)
    /// - allow_http: "true" to allow HTTP connections
    ///
    /// Any kind: the transport options (`timeout`, `connect_timeout`,
    /// `max_retries`, `retry_timeout`, `pool_idle_timeout`,
    /// `pool_max_idle_per_host`) and the [`Tunables`] keys.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl StorageConfig {
    /// Create a configuration for the given backend kind with default options.
    pub fn new(storage_type: StorageType) -> Self {
        Self {
            storage_type,
            options: Self::default_options(),
        }
    }

    /// Create a local filesystem configuration rooted at `path`.
    pub fn local(path: impl Into<String>) -> Self {
        Self::new(StorageType::Local).with_option("path", path)
    }

    /// Create a WebDAV configuration for the collection at `endpoint`.
    pub fn webdav(endpoint: impl Into<String>) -> Self {
        Self::new(StorageType::WebDav).with_option("endpoint", endpoint)
    }

    /// Create an S3 configuration for `bucket`.
    pub fn s3(bucket: impl Into<String>) -> Self {
        Self::new(StorageType::S3).with_option("bucket", bucket)
    }

    /// Create a configuration for the null backend.
    pub fn null() -> Self {
        Self {
            storage_type: StorageType::Null,
            options: HashMap::new(),
        }
    }

    /// Get default transport options.
    ///
    /// Transport-level retries are disabled: a failed call surfaces
    /// immediately unless `max_retries` is raised explicitly.
    pub fn default_options() -> HashMap<String, String> {
        [
            ("timeout", "1200"),
            ("connect_timeout", "30"),
            ("max_retries", "0"),
            ("retry_timeout", "1200"),
            ("pool_idle_timeout", "15"),
            ("pool_max_idle_per_host", "5"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Add a configuration option (for method chaining).
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Add multiple configuration options (for method chaining).
    pub fn with_options(mut self, options: HashMap<String, String>) -> Self {
        self.options.extend(options);
        self
    }

    /// Get a configuration option.
    pub fn get_option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }

    /// Get a required configuration option or fail with a `ConfigError`.
    pub(crate) fn require_option(&self, key: &str) -> StorageResult<&String> {
        self.get_option(key).ok_or_else(|| {
            StorageError::ConfigError(format!(
                "{} storage requires '{}' option",
                self.storage_type, key
            ))
        })
    }

    /// Whether `key` is handled outside the backend-specific option match.
    pub(crate) fn is_shared_option(key: &str) -> bool {
        TRANSPORT_OPTIONS.contains(&key) || TUNABLE_OPTIONS.contains(&key)
    }

    /// Build HTTP client options from the transport settings.
    pub(crate) fn client_options(&self) -> ClientOptions {
        let mut client_options = ClientOptions::default();
        if let Some(timeout_str) = self.options.get("timeout") {
            if timeout_str == "0" || timeout_str == "disabled" {
                client_options = client_options.with_timeout_disabled();
            } else if let Ok(sec) = timeout_str.parse::<u64>() {
                client_options = client_options.with_timeout(Duration::from_secs(sec))
            }
        };
        if let Some(connect_timeout_str) = self.options.get("connect_timeout") {
            if connect_timeout_str == "0" || connect_timeout_str == "disabled" {
                client_options = client_options.with_connect_timeout_disabled();
            } else if let Ok(sec) = connect_timeout_str.parse::<u64>() {
                client_options = client_options.with_connect_timeout(Duration::from_secs(sec))
            }
        }
        if let Some(pool_idle_timeout_str) = self.options.get("pool_idle_timeout") {
            if let Ok(sec) = pool_idle_timeout_str.parse::<u64>() {
                client_options = client_options.with_pool_idle_timeout(Duration::from_secs(sec))
            }
        }
        if let Some(pool_max_idle_per_host_str) = self.options.get("pool_max_idle_per_host") {
            if let Ok(max_idle) = pool_max_idle_per_host_str.parse::<usize>() {
                client_options = client_options.with_pool_max_idle_per_host(max_idle)
            }
        }
        client_options
    }

    /// Build transport retry settings.
    ///
    /// Missing or unparsable `max_retries` means no retries.
    pub(crate) fn retry_config(&self) -> RetryConfig {
        let default_retry_config = RetryConfig::default();
        let max_retries = self
            .options
            .get("max_retries")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        let retry_timeout = self
            .options
            .get("retry_timeout")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default_retry_config.retry_timeout);
        RetryConfig {
            backoff: Default::default(),
            max_retries,
            retry_timeout,
        }
    }
}

/// Overridable constants shared by the backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunables {
    pub sidecar_suffix: String,
    pub upload_chunk_size: usize,
    pub stream_chunk_size: usize,
    pub file_mode: u32,
    pub dir_mode: u32,
    pub wait_attempts: usize,
    pub wait_interval: Duration,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            sidecar_suffix: DEFAULT_SIDECAR_SUFFIX.to_string(),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            stream_chunk_size: DEFAULT_STREAM_CHUNK_SIZE,
            file_mode: DEFAULT_FILE_MODE,
            dir_mode: DEFAULT_DIR_MODE,
            wait_attempts: DEFAULT_WAIT_ATTEMPTS,
            wait_interval: DEFAULT_WAIT_INTERVAL,
        }
    }
}

impl Tunables {
    /// Read tunables from the configuration, falling back to defaults for
    /// absent keys.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a present value does not parse, when a chunk
    /// size or attempt count is zero, or when the sidecar suffix is empty.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let mut tunables = Tunables::default();

        if let Some(suffix) = config.get_option("sidecar_suffix") {
            if suffix.is_empty() {
                return Err(StorageError::ConfigError(
                    "'sidecar_suffix' must not be empty".to_string(),
                ));
            }
            tunables.sidecar_suffix = suffix.clone();
        }
        if let Some(v) = config.get_option("upload_chunk_size") {
            tunables.upload_chunk_size = parse_positive(v, "upload_chunk_size")?;
        }
        if let Some(v) = config.get_option("stream_chunk_size") {
            tunables.stream_chunk_size = parse_positive(v, "stream_chunk_size")?;
        }
        if let Some(v) = config.get_option("file_mode") {
            tunables.file_mode = parse_mode(v, "file_mode")?;
        }
        if let Some(v) = config.get_option("dir_mode") {
            tunables.dir_mode = parse_mode(v, "dir_mode")?;
        }
        if let Some(v) = config.get_option("wait_attempts") {
            tunables.wait_attempts = parse_positive(v, "wait_attempts")?;
        }
        if let Some(v) = config.get_option("wait_interval_ms") {
            let ms = v.parse::<u64>().map_err(|e| {
                StorageError::ConfigError(format!("Invalid 'wait_interval_ms' {}: {}", v, e))
            })?;
            tunables.wait_interval = Duration::from_millis(ms);
        }

        Ok(tunables)
    }
}

fn parse_positive(value: &str, key: &str) -> StorageResult<usize> {
    match value.parse::<usize>() {
        Ok(0) => Err(StorageError::ConfigError(format!(
            "'{}' must be greater than zero",
            key
        ))),
        Ok(n) => Ok(n),
        Err(e) => Err(StorageError::ConfigError(format!(
            "Invalid '{}' {}: {}",
            key, value, e
        ))),
    }
}

fn parse_mode(value: &str, key: &str) -> StorageResult<u32> {
    let digits = value.trim_start_matches("0o");
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        _ => Err(StorageError::ConfigError(format!(
            "Invalid '{}' {}: expected octal permission bits",
            key, value
        ))),
    }
}
