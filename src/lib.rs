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

//! # Storekit
//!
//! A Rust library giving applications one file-storage interface over local
//! directories, WebDAV servers, S3-compatible object stores and a null sink.
//!
//! ## Features
//!
//! - **Uniform operations**: create, copy, move, stream in, read, ranged read,
//!   stat, remove, clear and make directory, on every backend
//! - **Per-object metadata**: native on object stores, sidecar records elsewhere
//! - **Chunked uploads**: arbitrary-length sources stream into object stores
//!   through multipart sessions that abort cleanly on failure
//! - **Cancellation**: every operation has a `*_with_cancel` form taking a
//!   `CancellationToken`
//!
//! ## Quick Start
//!
//! ### Local Filesystem Example
//!
//! ```rust,no_run
//! use storekit::{StorageConfig, StorageProvider, StorageProviderFactory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = StorageConfig::local("./data");
//! let storage = StorageProviderFactory::from_config(&config)?;
//!
//! storage.create("greeting.txt", b"hello", None, None).await?;
//! let bytes = storage.read("greeting.txt").await?;
//! assert_eq!(bytes, b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! ### AWS S3 Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use storekit::{StorageConfig, StorageProvider, StorageProviderFactory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = StorageConfig::s3("my-bucket")
//!     .with_option("region", "us-east-1")
//!     .with_option("access_key_id", "ACCESS_KEY")
//!     .with_option("secret_access_key", "SECRET_KEY");
//! let storage = StorageProviderFactory::from_config(&config)?;
//!
//! let meta = HashMap::from([("owner".to_string(), "bob".to_string())]);
//! storage.create("reports/q1.csv", b"a,b\n", None, Some(&meta)).await?;
//!
//! let (descriptor, metadata) = storage.stat("reports/q1.csv").await?;
//! println!("{} bytes, owner={:?}", descriptor.size, metadata.get("owner"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`storage`] - Storage providers, configuration and errors
//! - [`util`] - Cancellation and I/O helpers

pub mod storage;
pub mod util;

// Re-export commonly used types
pub use storage::{
    ByteRange, FileDescriptor, JsonStorageExt, Metadata, StorageConfig, StorageError,
    StorageProvider, StorageProviderFactory, StorageResult, StorageType,
};
