//! Webhook ingress — validates the object-storage PUT-complete callback and
//! enqueues it onto the upload channel. Everything past this module runs on
//! the upload worker's task, off the request-handling thread.

use tokio::sync::mpsc;

use crate::db::models::WebhookPutObject;
use crate::error::{AppError, AppResult};

/// Validates `payload` has the fields the upload worker needs, then hands
/// it to the upload channel. A full channel backs up here rather than
/// dropping the event — callers should bound how long they wait with their
/// own request timeout.
pub async fn ingest(payload: WebhookPutObject, sender: &mpsc::Sender<WebhookPutObject>) -> AppResult<()> {
    validate(&payload)?;
    sender
        .send(payload)
        .await
        .map_err(|_| AppError::Internal("upload queue is closed".into()))
}

fn validate(payload: &WebhookPutObject) -> AppResult<()> {
    let key = payload
        .minio_key()
        .ok_or_else(|| AppError::InvalidInput("webhook payload has no object key".into()))?;
    if key.is_empty() {
        return Err(AppError::InvalidInput("webhook object key is empty".into()));
    }
    if !key.starts_with("uploads/") {
        return Err(AppError::InvalidInput(format!(
            "webhook object key '{key}' is outside the uploads/ prefix"
        )));
    }
    if payload.bucket_name().map_or(true, str::is_empty) {
        return Err(AppError::InvalidInput("webhook payload has no bucket name".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{WebhookBucket, WebhookObject, WebhookRecord, WebhookS3};

    fn payload(key: &str) -> WebhookPutObject {
        WebhookPutObject {
            records: vec![WebhookRecord {
                s3: WebhookS3 {
                    bucket: WebhookBucket { name: "photos".into() },
                    object: WebhookObject { key: key.into() },
                },
            }],
        }
    }

    #[tokio::test]
    async fn valid_upload_key_is_enqueued() {
        let (tx, mut rx) = mpsc::channel(4);
        ingest(payload("uploads/11111111-1111-1111-1111-111111111111.jpg"), &tx)
            .await
            .unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.minio_key(), Some("uploads/11111111-1111-1111-1111-111111111111.jpg"));
    }

    #[tokio::test]
    async fn rejects_key_outside_uploads_prefix() {
        let (tx, _rx) = mpsc::channel(4);
        let err = ingest(payload("2023/11111111-1111-1111-1111-111111111111.jpg"), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn rejects_empty_records() {
        let (tx, _rx) = mpsc::channel(4);
        let empty = WebhookPutObject { records: vec![] };
        let err = ingest(empty, &tx).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
