//! Artifact sink for downloaded exports
//! Uses Apache Arrow object_store crate

mod fetch;
mod records;

pub use fetch::{ArtifactFetcher, FetchConfig, SavedArtifact, default_file_name, extension_for};
pub use records::{RecordFormat, save_records};

use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, WriteMultipart, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Output directory unavailable: {0}")]
    OutputDir(#[from] std::io::Error),

    #[error("Could not encode records: {0}")]
    Encode(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

impl StorageError {
    /// Worth another attempt: timeouts, connection failures, 429 and 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Timeout | StorageError::DownloadFailed(_) => true,
            StorageError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Where saved artifacts land; a local directory or memory
#[derive(Clone)]
pub struct ArtifactStore {
    store: Arc<dyn ObjectStore>,
    location: String,
}

impl ArtifactStore {
    /// Wrap any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, location: impl Into<String>) -> Self {
        Self {
            store,
            location: location.into(),
        }
    }

    /// Local directory, created if missing
    pub fn local(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let store = LocalFileSystem::new_with_prefix(dir)?;
        Ok(Self::new(Arc::new(store), dir.display().to_string()))
    }

    /// In-memory storage for tests
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Validate a caller-supplied key; no absolute paths or parent hops
    pub fn key(&self, name: &str) -> Result<StoragePath> {
        let name = name.trim();
        if name.is_empty() || name.starts_with('/') || name.split('/').any(|p| p == "..") {
            return Err(StorageError::InvalidDestination(name.to_string()));
        }
        StoragePath::parse(name).map_err(|e| StorageError::InvalidDestination(e.to_string()))
    }

    pub(crate) fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Begin a chunked write; caller must `finish` or `abort` it
    pub(crate) async fn writer(&self, path: &StoragePath) -> Result<WriteMultipart> {
        let upload = self.store.put_multipart(path).await?;
        Ok(WriteMultipart::new(upload))
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.key(key)?;
        let result = self.store.get(&path).await?;
        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Read artifact from storage");

        Ok(bytes.to_vec())
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.key(key)?;

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
