use common::storage::ObjectStore;
use tracing::warn;

/// Reverse-order compensation for storage writes.
///
/// Every successful upload pushes its key; when a later step fails the
/// stack unwinds newest-first. Individual delete failures are logged and
/// swallowed: an orphaned object is an acceptable residual, blocking the
/// user-visible failure response on cleanup is not. An orphaned database
/// row is never acceptable, which is why metadata writes only happen after
/// every storage write of the attempt has succeeded.
#[derive(Debug, Default)]
pub struct CleanupStack {
    keys: Vec<String>,
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: String) {
        self.keys.push(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Delete every tracked object, newest first. "Already gone" is
    /// success; other failures are logged per key and swallowed.
    pub async fn unwind(self, store: &dyn ObjectStore) {
        for key in self.keys.iter().rev() {
            match store.delete(key).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    warn!(key = %key, error = %err, "rollback delete failed; object orphaned");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use common::storage::memory::InMemoryObjectStore;
    use common::storage::{
        ObjectMetadata, ObjectStore, StorageError, StoredObject, UploadReceipt,
    };

    use super::*;

    #[tokio::test]
    async fn unwind_removes_tracked_objects() {
        let store = InMemoryObjectStore::new();
        let mut stack = CleanupStack::new();

        for key in ["a/1", "a/2", "a/3"] {
            store.upload(key, b"x", "application/octet-stream").await.unwrap();
            stack.push(key.to_string());
        }
        // An object uploaded outside this attempt stays untouched.
        store.upload("b/keep", b"y", "application/octet-stream").await.unwrap();

        stack.unwind(&store).await;

        assert!(store.keys_with_prefix("a/").await.is_empty());
        assert_eq!(store.keys_with_prefix("b/").await, vec!["b/keep"]);
    }

    /// Store whose deletes fail for chosen keys and record their order.
    struct StubbornStore {
        inner: InMemoryObjectStore,
        fail_keys: Vec<String>,
        deletions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for StubbornStore {
        async fn upload(
            &self,
            key: &str,
            data: &[u8],
            content_type: &str,
        ) -> Result<UploadReceipt, StorageError> {
            self.inner.upload(key, data, content_type).await
        }

        async fn get_bytes(&self, key: &str) -> Result<StoredObject, StorageError> {
            self.inner.get_bytes(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.deletions.lock().unwrap().push(key.to_string());
            if self.fail_keys.iter().any(|k| k == key) {
                return Err(StorageError::Backend("simulated outage".into()));
            }
            self.inner.delete(key).await
        }

        async fn exists(&self, key: &str) -> Result<bool, StorageError> {
            self.inner.exists(key).await
        }

        async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
            self.inner.head(key).await
        }

        async fn presign_download(
            &self,
            key: &str,
            ttl_minutes: u32,
        ) -> Result<String, StorageError> {
            self.inner.presign_download(key, ttl_minutes).await
        }
    }

    #[tokio::test]
    async fn unwind_is_reverse_order_and_swallows_failures() {
        let store = StubbornStore {
            inner: InMemoryObjectStore::new(),
            fail_keys: vec!["k/2".to_string()],
            deletions: Mutex::new(Vec::new()),
        };

        let mut stack = CleanupStack::new();
        for key in ["k/1", "k/2", "k/3"] {
            store.upload(key, b"x", "application/octet-stream").await.unwrap();
            stack.push(key.to_string());
        }

        // Does not panic or abort despite the failing delete.
        stack.unwind(&store).await;

        let deletions = store.deletions.lock().unwrap().clone();
        assert_eq!(deletions, vec!["k/3", "k/2", "k/1"]);
        // The failed key is orphaned, the rest are gone.
        assert!(store.inner.exists("k/2").await.unwrap());
        assert!(!store.inner.exists("k/1").await.unwrap());
        assert!(!store.inner.exists("k/3").await.unwrap());
    }

    #[tokio::test]
    async fn unwind_of_missing_objects_is_quiet() {
        let store = InMemoryObjectStore::new();
        let mut stack = CleanupStack::new();
        stack.push("never/uploaded".to_string());
        stack.unwind(&store).await;
        assert_eq!(store.object_count().await, 0);
    }
}
