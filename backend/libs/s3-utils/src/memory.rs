/// In-process object storage
use crate::{ObjectStorage, ObjectUpload, S3Error, StoredObject};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Keeps objects in a map; URLs are built from `base_url`.
#[derive(Clone, Default)]
pub struct MemoryObjectStorage {
    base_url: String,
    objects: Arc<Mutex<HashMap<String, StoredBlob>>>,
}

impl MemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Arc::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredBlob>> {
        // A poisoned map still holds consistent entries.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put_object(&self, upload: ObjectUpload) -> Result<StoredObject, S3Error> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), upload.key);
        self.lock().insert(
            upload.key.clone(),
            StoredBlob {
                body: upload.body,
                content_type: upload.content_type,
            },
        );

        Ok(StoredObject {
            url,
            key: upload.key,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), S3Error> {
        self.lock().remove(key);
        Ok(())
    }
}
