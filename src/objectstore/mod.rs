//! ObjectStore gateway — streaming GET, PUT, MOVE, and signed-URL issuance
//! against an S3-compatible (MinIO) bucket.
//!
//! This is the pipeline's one external I/O collaborator besides the record
//! store. Call sites never match on error text; [`ObjectStoreError`] carries
//! a typed `NotFound` variant so the reprocess worker can distinguish "no
//! canonical object to rebuild from" from a transient transport failure
//! without the sentinel-string classification the source used.

pub mod s3_store;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

pub use s3_store::S3ObjectStore;

#[derive(Debug, thiserror::Error, Clone)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object store error: {0}")]
    Other(String),
}

/// A byte buffer obtained from a streaming GET, held behind a RAII guard so
/// the underlying connection/handle is released on every exit path —
/// including early returns from a failed EXIF read or decode.
pub struct ObjectReader {
    pub key: String,
    pub bytes: Vec<u8>,
}

impl Drop for ObjectReader {
    fn drop(&mut self) {
        tracing::trace!(key = %self.key, "released object store reader");
    }
}

impl ObjectReader {
    pub fn as_cursor(&self) -> std::io::Cursor<&[u8]> {
        std::io::Cursor::new(&self.bytes)
    }
}

/// Gateway to the object store. Implementations must be `Send + Sync` so a
/// single instance can be shared across worker tasks via `Arc`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Streams the full object at `key` into memory under a scoped reader.
    async fn get(&self, key: &str) -> Result<ObjectReader, ObjectStoreError>;

    /// Uploads `bytes` to `key`, overwriting any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ObjectStoreError>;

    /// Relocates the object at `from` to `to`. Implemented as a server-side
    /// copy followed by a delete of the source, since S3 has no native
    /// rename primitive.
    async fn mv(&self, from: &str, to: &str) -> Result<(), ObjectStoreError>;

    /// Issues a time-limited pre-signed PUT URL for `key`, handed back to the
    /// client so it can upload the original bytes directly to the bucket.
    async fn presign_put(&self, key: &str, expires_in_secs: u32) -> Result<String, ObjectStoreError>;
}
