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

//! Storage abstraction layer
//!
//! This module provides one interface, [`StorageProvider`], over four
//! backends:
//!
//! - [`local::LocalProvider`]: a directory on the local filesystem
//! - [`remote::WebDavProvider`]: a WebDAV collection
//! - [`object_store::ObjectStoreProvider`]: an S3-compatible bucket
//! - [`null::NullProvider`]: discards everything
//!
//! The local and WebDAV backends keep metadata in sidecar records next to each
//! object (see [`metadata`]); the object store keeps it natively.

pub mod config;
pub mod error;
pub mod factory;
pub mod local;
pub mod metadata;
pub mod null;
pub mod object_store;
pub mod provider;
pub mod remote;
pub mod s3_copy;
pub mod upload;

// Public exports
pub use config::{StorageConfig, StorageType, Tunables};
pub use error::{StorageError, StorageResult};
pub use factory::StorageProviderFactory;
pub use metadata::Metadata;
pub use provider::{
    ByteRange, ByteSource, ByteStream, FileDescriptor, JsonStorageExt, StorageProvider,
};
