//! Object storage for binary assets
//!
//! Stores image bytes under opaque, content-addressed keys.
//! Supports multiple backend implementations (disk, S3, etc.)

pub mod disk;

pub use disk::DiskObjectStore;

use crate::error::MosaicResult;
use async_trait::async_trait;

/// Object storage backend trait
///
/// Keys are slash-separated relative paths, e.g. `users/{owner}/{digest}.jpg`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under the given key, overwriting any existing object
    async fn put(&self, key: &str, data: Vec<u8>) -> MosaicResult<()>;

    /// Retrieve an object by key
    async fn get(&self, key: &str) -> MosaicResult<Option<Vec<u8>>>;

    /// Delete an object by key; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> MosaicResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> MosaicResult<bool>;
}
