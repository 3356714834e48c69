//! S3-compatible (MinIO) implementation of [`ObjectStore`], built on
//! `rust-s3`: a thin struct wrapping a configured bucket handle, one method
//! per operation, errors mapped to our own typed error rather than
//! propagated as raw strings.

use async_trait::async_trait;
use s3::{creds::Credentials, Bucket, Region};

use super::{ObjectReader, ObjectStore, ObjectStoreError};

pub struct S3ObjectStore {
    bucket: Box<Bucket>,
}

impl S3ObjectStore {
    pub fn new(
        bucket_name: &str,
        region: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, ObjectStoreError> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };
        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| ObjectStoreError::Other(format!("credentials: {e}")))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| ObjectStoreError::Other(format!("bucket: {e}")))?
            .with_path_style();

        Ok(Self { bucket })
    }

    /// MinIO (and most S3-compatible stores) return a 404 whose body
    /// mentions "NoSuchKey" or similar. `rust-s3` surfaces the HTTP status
    /// on its error variants, so we classify on status code, never on
    /// substring-matching error text.
    fn classify(err: s3::error::S3Error, key: &str) -> ObjectStoreError {
        if let s3::error::S3Error::HttpFailWithBody(status, _) = &err {
            if *status == 404 {
                return ObjectStoreError::NotFound(key.to_string());
            }
        }
        ObjectStoreError::Other(err.to_string())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<ObjectReader, ObjectStoreError> {
        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| Self::classify(e, key))?;

        Ok(ObjectReader {
            key: key.to_string(),
            bytes: response.bytes().to_vec(),
        })
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ObjectStoreError> {
        self.bucket
            .put_object_with_content_type(key, &bytes, content_type)
            .await
            .map_err(|e| Self::classify(e, key))?;
        Ok(())
    }

    async fn mv(&self, from: &str, to: &str) -> Result<(), ObjectStoreError> {
        self.bucket
            .copy_object_internal(from, to)
            .await
            .map_err(|e| Self::classify(e, from))?;

        self.bucket
            .delete_object(from)
            .await
            .map_err(|e| Self::classify(e, from))?;
        Ok(())
    }

    async fn presign_put(&self, key: &str, expires_in_secs: u32) -> Result<String, ObjectStoreError> {
        self.bucket
            .presign_put(key, expires_in_secs, None, None)
            .map_err(|e| ObjectStoreError::Other(e.to_string()))
    }
}
