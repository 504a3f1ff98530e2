//! Document original bytes, addressed by `(disk, storage_path)` (spec §4.8).

use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid blob reference: {0}")]
    InvalidRef(String),
    #[error("blob not found: {0}")]
    NotFound(String),
}

/// Abstract object-store surface for document bytes. The real S3-compatible
/// backend is explicitly out of scope (spec §1); this trait is the contract
/// a deployment's storage layer implements.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, content: &[u8]) -> Result<(), BlobStoreError>;
    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobStoreError>;
    async fn delete(&self, path: &str) -> Result<(), BlobStoreError>;
    async fn exists(&self, path: &str) -> Result<bool, BlobStoreError>;
    /// A time-limited direct-access URL, when the backend supports one.
    /// `None` by default (spec §4.8 lists `url(path)` as a capability, not
    /// every backend need implement it meaningfully).
    async fn url(&self, _path: &str) -> Result<Option<String>, BlobStoreError> {
        Ok(None)
    }
}

/// Local filesystem implementation — the in-process stand-in for the
/// production object store.
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, content: &[u8]) -> Result<(), BlobStoreError> {
        let full_path = self.resolve(path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, content).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobStoreError> {
        let full_path = self.resolve(path);
        if !full_path.exists() {
            return Err(BlobStoreError::NotFound(path.to_string()));
        }
        Ok(tokio::fs::read(full_path).await?)
    }

    async fn delete(&self, path: &str) -> Result<(), BlobStoreError> {
        let full_path = self.resolve(path);
        if full_path.exists() {
            tokio::fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobStoreError> {
        Ok(self.resolve(path).exists())
    }
}

/// In-memory implementation used by tests and the CLI's `--in-memory` mode.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: tokio::sync::RwLock<std::collections::HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, path: &str, content: &[u8]) -> Result<(), BlobStoreError> {
        self.blobs.write().await.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobStoreError> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), BlobStoreError> {
        self.blobs.write().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobStoreError> {
        Ok(self.blobs.read().await.contains_key(path))
    }
}
