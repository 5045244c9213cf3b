//! Disk-based object storage backend

use crate::{
    error::{MosaicError, MosaicResult},
    object_store::ObjectStore,
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Maps keys to filesystem paths under a base directory. Key segments
/// become nested directories, so `users/{owner}/{digest}.jpg` lands in
/// `{base}/users/{owner}/{digest}.jpg`.
#[derive(Clone)]
pub struct DiskObjectStore {
    base_path: PathBuf,
}

impl DiskObjectStore {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Resolve a key to a path under the base directory
    ///
    /// Rejects empty keys and keys whose segments would escape the base
    /// directory.
    fn object_path(&self, key: &str) -> MosaicResult<PathBuf> {
        if key.is_empty() {
            return Err(MosaicError::Storage("Empty object key".to_string()));
        }

        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(MosaicError::Storage(format!("Invalid object key: {}", key)));
            }
            path.push(segment);
        }

        Ok(path)
    }

    /// Ensure the parent directory for an object exists
    async fn ensure_object_dir(&self, key: &str) -> MosaicResult<PathBuf> {
        let object_path = self.object_path(key)?;
        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                MosaicError::Storage(format!("Failed to create object directory: {}", e))
            })?;
        }
        Ok(object_path)
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> MosaicResult<()> {
        let object_path = self.ensure_object_dir(key).await?;

        fs::write(&object_path, data)
            .await
            .map_err(|e| MosaicError::Storage(format!("Failed to write object {}: {}", key, e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> MosaicResult<Option<Vec<u8>>> {
        let object_path = self.object_path(key)?;

        match fs::read(&object_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MosaicError::Storage(format!(
                "Failed to read object {}: {}",
                key, e
            ))),
        }
    }

    async fn delete(&self, key: &str) -> MosaicResult<()> {
        let object_path = self.object_path(key)?;

        match fs::remove_file(&object_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MosaicError::Storage(format!(
                "Failed to delete object {}: {}",
                key, e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> MosaicResult<bool> {
        let object_path = self.object_path(key)?;
        Ok(object_path.exists())
    }
}
