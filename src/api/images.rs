//! HTTP handlers for the image resource.
//!
//!   POST /api/images        — placeholder-creation protocol:
//!                              mints a slug, inserts an unpublished
//!                              placeholder record, returns a pre-signed
//!                              upload URL.
//!   PUT  /api/images/{slug} — metadata edit: may change the image's
//!                              logical directory, in which case it
//!                              enqueues a `ReprocessCmd` for the
//!                              reprocess worker.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use crate::db::models::{AddMetaDataCmd, PlaceholderResponse, ReprocessCmd, UpdateImageMetadata};
use crate::error::{AppError, AppResult};
use crate::pipeline::{key, placeholder};
use crate::services::images;
use crate::AppState;

/// `POST /api/images`
pub async fn create_placeholder(State(state): State<AppState>, Json(cmd): Json<AddMetaDataCmd>) -> AppResult<Json<PlaceholderResponse>> {
    let response = placeholder::build_placeholder(
        &state.pool,
        state.store.as_ref(),
        state.cryptor.as_ref(),
        state.indexer.as_ref(),
        &state.config,
        cmd,
    )
    .await?;
    Ok(Json(response))
}

/// `PUT /api/images/{slug}`
///
/// Only `imageDate` can change the image's directory. Editing
/// title/description without changing the computed year does **not**
/// enqueue a reprocess even if it would otherwise flip `isPublished`.
pub async fn update_metadata(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<UpdateImageMetadata>,
) -> AppResult<Json<serde_json::Value>> {
    let row = images::find_by_slug(&state.pool, state.indexer.as_ref(), &slug).await?;
    let mut decrypted = images::decrypt(&row, state.cryptor.as_ref())?;
    let parsed = key::parse(&row.object_key)?;

    if let Some(title) = body.title {
        decrypted.title = title;
    }
    if let Some(description) = body.description {
        decrypted.description = description;
    }

    let mut reprocess_cmd: Option<ReprocessCmd> = None;
    if let Some(image_date) = body.image_date {
        decrypted.image_date = image_date.to_rfc3339();
        let year = image_date.format("%Y").to_string();
        if year != parsed.dir {
            let updated_obj_key = format!("{year}/{}.{}", parsed.slug, parsed.ext);
            reprocess_cmd = Some(ReprocessCmd {
                id: decrypted.id.clone(),
                file_name: row.file_name.clone(),
                file_type: row.file_type.clone(),
                slug: parsed.slug.clone(),
                current_obj_key: row.object_key.clone(),
                updated_obj_key: updated_obj_key.clone(),
                move_required: true,
                retry_count: 1,
            });
            decrypted.object_key = updated_obj_key;
            decrypted.is_published = year != key::STAGING_DIR;
        }
    }

    let mut updated_row = row.clone();
    updated_row.title = state.cryptor.encrypt(&decrypted.title)?;
    updated_row.description = state.cryptor.encrypt(&decrypted.description)?;
    updated_row.image_date = state.cryptor.encrypt(&decrypted.image_date)?;
    updated_row.object_key = decrypted.object_key.clone();
    updated_row.is_published = decrypted.is_published;

    images::commit(&state.pool, &updated_row).await?;

    if let Some(cmd) = reprocess_cmd {
        state
            .reprocess_tx
            .send(cmd)
            .await
            .map_err(|_| AppError::Internal("reprocess queue is closed".into()))?;
    }

    Ok(Json(json!({ "ok": true, "objectKey": updated_row.object_key })))
}
