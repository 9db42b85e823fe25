use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
}

/// A fully materialized object, used for small artifacts only.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub size: u64,
}

/// Metadata returned by a head request.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub size: u64,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Per-key outcome report for a bulk delete.
///
/// Bulk deletion never fails as a whole: the caller gets the subset that
/// could not be removed and decides whether to retry it.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, StorageError)>,
}

/// Key-value object storage.
///
/// Operations do not retry internally; callers own retry policy. Deleting a
/// key that does not exist is a success, not an error.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` at `key`. A failed upload leaves no partial object.
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<UploadReceipt, StorageError>;

    /// Load an entire object into memory.
    async fn get_bytes(&self, key: &str) -> Result<StoredObject, StorageError>;

    /// Retrieve an object as a streaming async reader.
    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        let object = self.get_bytes(key).await?;
        Ok(Box::new(std::io::Cursor::new(object.bytes)))
    }

    /// Delete an object. Idempotent: a missing key is a no-op success.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Delete several objects, reporting per-key failures instead of
    /// aborting on the first one.
    async fn delete_many(&self, keys: &[String]) -> DeleteReport {
        let mut report = DeleteReport::default();
        for key in keys {
            match self.delete(key).await {
                Ok(()) => report.deleted.push(key.clone()),
                Err(err) => report.failed.push((key.clone(), err)),
            }
        }
        report
    }

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Fetch object metadata without the body.
    async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError>;

    /// Produce a time-boxed download URL so clients need not proxy bytes.
    async fn presign_download(
        &self,
        key: &str,
        ttl_minutes: u32,
    ) -> Result<String, StorageError>;
}
