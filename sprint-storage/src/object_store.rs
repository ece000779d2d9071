//! Object storage collaborator.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use sprint_core::ObjectStoreError;

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Handle to pass to [`ObjectStore::delete`].
    pub handle: String,
    /// Durable public URL.
    pub url: String,
}

/// Binary object storage (a CDN bucket or similar).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, ObjectStoreError>;

    /// Delete by handle. Deleting a missing object is not an error.
    async fn delete(&self, handle: &str) -> Result<(), ObjectStoreError>;
}

#[derive(Debug, Clone)]
struct StoredBlob {
    content_type: String,
    bytes: Vec<u8>,
}

/// Object store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, StoredBlob>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.objects.contains_key(handle)
    }

    pub fn content_type(&self, handle: &str) -> Option<String> {
        self.objects.get(handle).map(|b| b.content_type.clone())
    }

    pub fn size(&self, handle: &str) -> Option<usize> {
        self.objects.get(handle).map(|b| b.bytes.len())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, ObjectStoreError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::UploadFailed {
                reason: "simulated upload failure".to_string(),
            });
        }
        self.objects.insert(
            name.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(StoredObject {
            handle: name.to_string(),
            url: format!("memory://objects/{}", name),
        })
    }

    async fn delete(&self, handle: &str) -> Result<(), ObjectStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::DeleteFailed {
                handle: handle.to_string(),
                reason: "simulated delete failure".to_string(),
            });
        }
        self.objects.remove(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_delete() {
        let store = InMemoryObjectStore::new();
        let stored = store.put("1-a.png", "image/png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(stored.handle, "1-a.png");
        assert!(store.contains("1-a.png"));
        assert_eq!(store.size("1-a.png"), Some(3));
        assert_eq!(store.content_type("1-a.png").as_deref(), Some("image/png"));

        store.delete("1-a.png").await.unwrap();
        assert!(store.is_empty());
        // Missing objects delete cleanly.
        store.delete("1-a.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_simulated_failures() {
        let store = InMemoryObjectStore::new();
        store.set_fail_uploads(true);
        assert!(store.put("x", "text/plain", vec![]).await.is_err());
        store.set_fail_uploads(false);
        store.put("x", "text/plain", vec![]).await.unwrap();
        store.set_fail_deletes(true);
        assert!(matches!(
            store.delete("x").await,
            Err(ObjectStoreError::DeleteFailed { .. })
        ));
        assert!(store.contains("x"));
    }
}
