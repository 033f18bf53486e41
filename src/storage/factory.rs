use std::sync::Arc;
use tracing::debug;

use super::config::{StorageConfig, StorageType};
use super::error::StorageResult;
use super::local::LocalProvider;
use super::null::NullProvider;
use super::object_store::ObjectStoreProvider;
use super::provider::StorageProvider;
use super::remote::WebDavProvider;

/// Factory for creating storage providers
pub struct StorageProviderFactory;

impl StorageProviderFactory {
    /// Create a storage provider from a configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The storage configuration specifying the backend kind and options
    ///
    /// # Returns
    ///
    /// A `Result` containing:
    /// * `Ok(Arc<dyn StorageProvider>)` - A thread-safe reference to the initialized storage provider
    /// * `Err(StorageError)` - If the provider cannot be created
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * Required configuration options are missing
    /// * A tunable option does not parse
    /// * The backend client cannot be initialized
    pub fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn StorageProvider>> {
        debug!("Creating storage provider type={}", config.storage_type);
        let provider: Arc<dyn StorageProvider> = match config.storage_type {
            StorageType::Local => Arc::new(LocalProvider::from_config(config)?),
            StorageType::WebDav => Arc::new(WebDavProvider::new(config)?),
            StorageType::S3 => Arc::new(ObjectStoreProvider::new(config)?),
            StorageType::Null => Arc::new(NullProvider::new()),
        };
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::StorageError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::local(temp_dir.path().to_string_lossy());

        let provider = StorageProviderFactory::from_config(&config).unwrap();
        assert_eq!(provider.kind(), StorageType::Local);

        provider.create("hello.txt", b"hi", None, None).await.unwrap();
        assert_eq!(provider.read("hello.txt").await.unwrap(), b"hi");
    }

    #[test]
    fn test_null_from_json() {
        let config: StorageConfig = serde_json::from_str(r#"{"type":"empty"}"#).unwrap();
        let provider = StorageProviderFactory::from_config(&config).unwrap();
        assert_eq!(provider.kind(), StorageType::Null);
    }

    #[test]
    fn test_remote_kinds_from_config() {
        let dav = StorageConfig::webdav("https://dav.example.com/files");
        assert_eq!(
            StorageProviderFactory::from_config(&dav).unwrap().kind(),
            StorageType::WebDav
        );

        let s3 = StorageConfig::s3("bucket")
            .with_option("region", "us-east-1")
            .with_option("access_key_id", "AKIA")
            .with_option("secret_access_key", "SECRET");
        assert_eq!(
            StorageProviderFactory::from_config(&s3).unwrap().kind(),
            StorageType::S3
        );
    }

    #[test]
    fn test_missing_required_option() {
        let config = StorageConfig::new(StorageType::Local);
        assert!(matches!(
            StorageProviderFactory::from_config(&config),
            Err(StorageError::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_tunable() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::local(temp_dir.path().to_string_lossy())
            .with_option("stream_chunk_size", "zero");
        assert!(matches!(
            StorageProviderFactory::from_config(&config),
            Err(StorageError::ConfigError(_))
        ));
    }
}
