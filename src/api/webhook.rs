//! `HandleImageUploadNotification` — the inbound object-storage webhook.
//! Accepts the PUT-complete callback, validates it, and hands
//! it to the upload worker's channel. Everything past `ingress::ingest` runs
//! on the worker's own task, off this request.

use axum::{extract::State, http::StatusCode, Json};

use crate::db::models::WebhookPutObject;
use crate::error::AppResult;
use crate::pipeline::ingress;
use crate::AppState;

/// `POST /api/webhook/upload`
///
/// Malformed JSON never reaches this handler — axum's `Json` extractor
/// rejects it with 400 before the handler runs. Validation failures inside
/// `ingress::ingest` (missing key, wrong prefix, empty bucket) surface as
/// `AppError::InvalidInput`, mapped to 422 by `error::AppError`.
pub async fn handle_image_upload_notification(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPutObject>,
) -> AppResult<StatusCode> {
    ingress::ingest(payload, &state.upload_tx).await?;
    Ok(StatusCode::OK)
}
