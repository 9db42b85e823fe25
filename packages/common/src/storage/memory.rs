use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::error::StorageError;
use super::traits::{ObjectMetadata, ObjectStore, StoredObject, UploadReceipt};

struct Entry {
    bytes: Vec<u8>,
    content_type: String,
    last_modified: DateTime<Utc>,
}

/// In-memory object store used by tests and local development.
///
/// Behaves like the S3 backend at the trait level: single-writer puts,
/// idempotent deletes, `NotFound` for missing keys.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Entry>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored under `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let objects = self.objects.read().await;
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

fn etag_of(bytes: &[u8]) -> String {
    // Cheap stand-in for a content digest; tests only compare for equality.
    format!("{:016x}-{}", fxhash(bytes), bytes.len())
}

fn fxhash(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<UploadReceipt, StorageError> {
        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            Entry {
                bytes: data.to_vec(),
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(UploadReceipt {
            key: key.to_string(),
            size: data.len() as u64,
            etag: Some(etag_of(data)),
        })
    }

    async fn get_bytes(&self, key: &str) -> Result<StoredObject, StorageError> {
        let objects = self.objects.read().await;
        let entry = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(StoredObject {
            bytes: entry.bytes.clone(),
            content_type: Some(entry.content_type.clone()),
            size: entry.bytes.len() as u64,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let objects = self.objects.read().await;
        let entry = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectMetadata {
            size: entry.bytes.len() as u64,
            etag: Some(etag_of(&entry.bytes)),
            last_modified: Some(entry.last_modified),
        })
    }

    async fn presign_download(
        &self,
        key: &str,
        ttl_minutes: u32,
    ) -> Result<String, StorageError> {
        let objects = self.objects.read().await;
        if !objects.contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!("memory://{key}?ttl={ttl_minutes}m"))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn upload_get_round_trip() {
        let store = InMemoryObjectStore::new();
        let receipt = store
            .upload("a/b/v1/sources/part.stl", b"solid part", "model/stl")
            .await
            .unwrap();
        assert_eq!(receipt.size, 10);

        let object = store.get_bytes("a/b/v1/sources/part.stl").await.unwrap();
        assert_eq!(object.bytes, b"solid part");
        assert_eq!(object.content_type.as_deref(), Some("model/stl"));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get_bytes("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryObjectStore::new();
        store.upload("k", b"x", "application/octet-stream").await.unwrap();

        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());

        // Second delete of the same key, and deleting a key that never
        // existed, are both no-op successes.
        store.delete("k").await.unwrap();
        store.delete("never-there").await.unwrap();
    }

    #[tokio::test]
    async fn delete_many_reports_every_key() {
        let store = InMemoryObjectStore::new();
        store.upload("one", b"1", "text/plain").await.unwrap();
        store.upload("two", b"2", "text/plain").await.unwrap();

        let report = store
            .delete_many(&["one".into(), "two".into(), "three".into()])
            .await;
        assert_eq!(report.deleted.len(), 3);
        assert!(report.failed.is_empty());
        assert_eq!(store.object_count().await, 0);
    }

    #[tokio::test]
    async fn get_stream_default_materializes() {
        let store = InMemoryObjectStore::new();
        store.upload("s", b"stream me", "text/plain").await.unwrap();

        let mut reader = store.get_stream("s").await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"stream me");
    }

    #[tokio::test]
    async fn head_reports_size() {
        let store = InMemoryObjectStore::new();
        store.upload("h", b"12345", "text/plain").await.unwrap();
        let meta = store.head("h").await.unwrap();
        assert_eq!(meta.size, 5);
        assert!(meta.etag.is_some());
    }

    #[tokio::test]
    async fn prefix_listing_sorted() {
        let store = InMemoryObjectStore::new();
        store.upload("p/b", b"", "text/plain").await.unwrap();
        store.upload("p/a", b"", "text/plain").await.unwrap();
        store.upload("q/c", b"", "text/plain").await.unwrap();

        assert_eq!(store.keys_with_prefix("p/").await, vec!["p/a", "p/b"]);
    }
}
