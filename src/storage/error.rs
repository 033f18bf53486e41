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

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Operation canceled")]
    Canceled,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(object_store::Error),

    #[error("S3 error: {0}")]
    S3Error(Box<aws_sdk_s3::Error>),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

impl StorageError {
    /// Map an I/O error on `path` into the storage taxonomy.
    ///
    /// `ErrorKind::NotFound` becomes [`StorageError::NotFound`] carrying the
    /// path; everything else is kept as an I/O error.
    pub(crate) fn from_io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_string())
        } else {
            StorageError::IoError(err)
        }
    }

    /// Whether the error reports an absent path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::ObjectStoreError(other),
        }
    }
}

impl From<aws_sdk_s3::Error> for StorageError {
    fn from(err: aws_sdk_s3::Error) -> Self {
        StorageError::S3Error(Box::new(err))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_error() {
        let error = StorageError::ConfigError("Invalid configuration".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid configuration"
        );
    }

    #[test]
    fn test_not_found_display() {
        let error = StorageError::NotFound("a/b.txt".to_string());
        assert_eq!(error.to_string(), "Not found: a/b.txt");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let storage_error: StorageError = io_error.into();

        match storage_error {
            StorageError::IoError(_) => {
                assert!(storage_error.to_string().contains("IO error"));
            }
            _ => panic!("Expected IoError variant"),
        }
    }

    #[test]
    fn test_from_io_maps_not_found() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "gone");
        match StorageError::from_io("x/y", io_error) {
            StorageError::NotFound(path) => assert_eq!(path, "x/y"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_from_io_keeps_other_kinds() {
        let io_error = io::Error::other("boom");
        assert!(matches!(
            StorageError::from_io("x", io_error),
            StorageError::IoError(_)
        ));
    }

    #[test]
    fn test_object_store_not_found_conversion() {
        let err = object_store::Error::NotFound {
            path: "bucket/key".to_string(),
            source: "missing".into(),
        };
        let storage_error: StorageError = err.into();
        match storage_error {
            StorageError::NotFound(path) => assert_eq!(path, "bucket/key"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_object_store_generic_conversion() {
        let err = object_store::Error::Generic {
            store: "S3",
            source: "throttled".into(),
        };
        let storage_error: StorageError = err.into();
        assert!(matches!(storage_error, StorageError::ObjectStoreError(_)));
        assert!(storage_error.to_string().contains("Object store error"));
    }

    #[test]
    fn test_url_parse_error_conversion() {
        let url_error = url::ParseError::EmptyHost;
        let storage_error: StorageError = url_error.into();

        match storage_error {
            StorageError::UrlParseError(_) => {
                assert!(storage_error.to_string().contains("URL parse error"));
            }
            _ => panic!("Expected UrlParseError variant"),
        }
    }

    #[test]
    fn test_canceled_display() {
        assert_eq!(StorageError::Canceled.to_string(), "Operation canceled");
    }

    #[test]
    fn test_storage_result_err() {
        let result: StorageResult<i32> = Err(StorageError::Validation("bad".to_string()));
        assert!(result.is_err());
    }
}
