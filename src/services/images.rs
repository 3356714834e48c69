//! Image record store.
//!
//! Every query here filters or joins on `slug_index` (the blind index),
//! never on the plaintext `slug` column directly — that column is
//! ciphertext and cannot be searched. Callers decrypt the row's
//! `title`/`description`/`slug`/`image_date` themselves via `crate::crypt`
//! before handing a `DecryptedImage` to pipeline logic.

use sqlx::SqlitePool;

use crate::crypt::{Cryptor, Indexer};
use crate::db::models::{DecryptedImage, Image};
use crate::error::{AppError, AppResult};

/// Decrypts the ciphertext columns of `row` into a plaintext view.
pub fn decrypt(row: &Image, cryptor: &dyn Cryptor) -> AppResult<DecryptedImage> {
    Ok(DecryptedImage {
        id: row.id.clone(),
        slug_index: row.slug_index.clone(),
        title: cryptor.decrypt(&row.title)?,
        description: cryptor.decrypt(&row.description)?,
        slug: cryptor.decrypt(&row.slug)?,
        image_date: cryptor.decrypt(&row.image_date)?,
        file_name: row.file_name.clone(),
        file_type: row.file_type.clone(),
        object_key: row.object_key.clone(),
        width: row.width,
        height: row.height,
        size: row.size,
        is_archived: row.is_archived,
        is_published: row.is_published,
    })
}

/// Inserts a freshly-allocated placeholder row. All
/// plaintext fields are encrypted, and `slug_index` is derived from the
/// plaintext `slug` before this function ever sees it — callers compute it
/// once and pass it in so every caller doesn't have to remember the blind
/// index is derived from `slug`, not `title`.
#[allow(clippy::too_many_arguments)]
pub async fn insert_placeholder(
    pool: &SqlitePool,
    cryptor: &dyn Cryptor,
    id: &str,
    slug: &str,
    slug_index: &str,
    title: &str,
    description: &str,
    file_name: &str,
    file_type: &str,
    object_key: &str,
) -> AppResult<Image> {
    let title_ct = cryptor.encrypt(title)?;
    let description_ct = cryptor.encrypt(description)?;
    let slug_ct = cryptor.encrypt(slug)?;
    // imageDate is unknown until EXIF/upload completes; store an empty
    // ciphertext placeholder so the column stays NOT NULL.
    let image_date_ct = cryptor.encrypt("")?;

    sqlx::query_as::<_, Image>(
        "INSERT INTO image
            (id, slug_index, title, description, slug, image_date,
             file_name, file_type, object_key, width, height, size,
             is_archived, is_published)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0, 0, 0)
         RETURNING *",
    )
    .bind(id)
    .bind(slug_index)
    .bind(title_ct)
    .bind(description_ct)
    .bind(slug_ct)
    .bind(image_date_ct)
    .bind(file_name)
    .bind(file_type)
    .bind(object_key)
    .fetch_one(pool)
    .await
    .map_err(AppError::from)
}

/// Looks an image up by its blind index — the only lawful way to locate a
/// row by `slug`.
pub async fn find_by_slug(pool: &SqlitePool, indexer: &dyn Indexer, slug: &str) -> AppResult<Image> {
    let slug_index = indexer.blind_index(slug);
    sqlx::query_as::<_, Image>("SELECT * FROM image WHERE slug_index = ?")
        .bind(slug_index)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Image> {
    sqlx::query_as::<_, Image>("SELECT * FROM image WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

/// Full row replace — the single commit point every worker calls once it
/// has a fully-updated `Image` ready to persist. `updated_at` is bumped by the database default trigger
/// equivalent: we set it explicitly here since SQLite has no `ON UPDATE`.
pub async fn commit(pool: &SqlitePool, image: &Image) -> AppResult<()> {
    sqlx::query(
        "UPDATE image SET
            title = ?, description = ?, slug = ?, image_date = ?,
            file_name = ?, file_type = ?, object_key = ?,
            width = ?, height = ?, size = ?,
            is_archived = ?, is_published = ?,
            updated_at = datetime('now')
         WHERE id = ?",
    )
    .bind(&image.title)
    .bind(&image.description)
    .bind(&image.slug)
    .bind(&image.image_date)
    .bind(&image.file_name)
    .bind(&image.file_type)
    .bind(&image.object_key)
    .bind(image.width)
    .bind(image.height)
    .bind(image.size)
    .bind(image.is_archived)
    .bind(image.is_published)
    .bind(&image.id)
    .execute(pool)
    .await?;

    Ok(())
}
