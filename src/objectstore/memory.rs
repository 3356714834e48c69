//! In-memory [`ObjectStore`] used by pipeline unit/integration tests so
//! fan-out and move/rebuild logic can be exercised without a running MinIO.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ObjectReader, ObjectStore, ObjectStoreError};

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<ObjectReader, ObjectStoreError> {
        let objects = self.objects.lock().unwrap();
        let bytes = objects
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))?;
        Ok(ObjectReader {
            key: key.to_string(),
            bytes,
        })
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), ObjectStoreError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn mv(&self, from: &str, to: &str) -> Result<(), ObjectStoreError> {
        let bytes = {
            let mut objects = self.objects.lock().unwrap();
            objects
                .remove(from)
                .ok_or_else(|| ObjectStoreError::NotFound(from.to_string()))?
        };
        self.objects.lock().unwrap().insert(to.to_string(), bytes);
        Ok(())
    }

    async fn presign_put(&self, key: &str, _expires_in_secs: u32) -> Result<String, ObjectStoreError> {
        Ok(format!("https://example-bucket.test/{key}?signature=fake"))
    }
}
