//! Album record store and the image↔album cross-reference table.
//!
//! Albums are keyed by year (`title` = the four-digit year string,
//! encrypted like every other textual column) — see
//! `pipeline::album::link_to_album` for the materializer that uses these
//! functions to implement the idempotent-with-a-documented-race
//! "find or create, then xref" dance.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::crypt::{Cryptor, Indexer};
use crate::db::models::Album;
use crate::error::{AppError, AppResult};

pub async fn find_by_slug(pool: &SqlitePool, indexer: &dyn Indexer, slug: &str) -> AppResult<Option<Album>> {
    let slug_index = indexer.blind_index(slug);
    sqlx::query_as::<_, Album>("SELECT * FROM album WHERE slug_index = ?")
        .bind(slug_index)
        .fetch_optional(pool)
        .await
        .map_err(AppError::from)
}

/// Creates a new album row with `title == slug == year`, e.g. both set to
/// `"2023"`. Returns the freshly created row.
pub async fn create(pool: &SqlitePool, cryptor: &dyn Cryptor, indexer: &dyn Indexer, year: &str) -> AppResult<Album> {
    let id = Uuid::new_v4().to_string();
    let slug_index = indexer.blind_index(year);
    let title_ct = cryptor.encrypt(year)?;
    let description_ct = cryptor.encrypt("")?;
    let slug_ct = cryptor.encrypt(year)?;

    sqlx::query_as::<_, Album>(
        "INSERT INTO album (id, slug_index, title, description, slug, is_archived)
         VALUES (?, ?, ?, ?, ?, 0)
         RETURNING *",
    )
    .bind(&id)
    .bind(slug_index)
    .bind(title_ct)
    .bind(description_ct)
    .bind(slug_ct)
    .fetch_one(pool)
    .await
    .map_err(AppError::from)
}

/// Inserts an `album_image` cross-reference. Relies on the table's
/// `UNIQUE (album_id, image_id)` constraint to make a duplicate link a
/// silent no-op rather than a second row (the materializer's idempotence
/// guarantee).
pub async fn link_image(pool: &SqlitePool, album_id: &str, image_id: &str) -> AppResult<()> {
    sqlx::query("INSERT OR IGNORE INTO album_image (album_id, image_id) VALUES (?, ?)")
        .bind(album_id)
        .bind(image_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Removes every `album_image` row for `image_id`, used when an image is
/// reprocessed into a different year and must be unlinked from its old
/// album before being linked to the new one.
pub async fn unlink_image(pool: &SqlitePool, image_id: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM album_image WHERE image_id = ?")
        .bind(image_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Decrypted titles of every album `image_id` is currently linked to — the
/// "has this image already been linked to this year?" check the upload
/// worker makes before invoking the materializer.
pub async fn titles_for_image(
    pool: &SqlitePool,
    cryptor: &dyn Cryptor,
    image_id: &str,
) -> AppResult<std::collections::HashSet<String>> {
    let rows: Vec<Album> = sqlx::query_as(
        "SELECT a.* FROM album a
         INNER JOIN album_image ai ON ai.album_id = a.id
         WHERE ai.image_id = ?",
    )
    .bind(image_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|a| cryptor.decrypt(&a.title).map_err(AppError::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::{ChaChaCryptor, HmacIndexer};
    use crate::db;

    async fn test_pool() -> SqlitePool {
        db::create_pool("sqlite::memory:").await.unwrap()
    }

    fn cryptor() -> ChaChaCryptor {
        ChaChaCryptor::new("MDEyMzQ1Njc4OTAxMjM0NTY3ODkwMTIzNDU2Nzg5MDE=").unwrap()
    }

    fn indexer() -> HmacIndexer {
        HmacIndexer::new("dGVzdC1ibGluZC1pbmRleC1rZXk=").unwrap()
    }

    #[tokio::test]
    async fn create_then_find_by_slug() {
        let pool = test_pool().await;
        let cryptor = cryptor();
        let indexer = indexer();

        let created = create(&pool, &cryptor, &indexer, "2023").await.unwrap();
        let found = find_by_slug(&pool, &indexer, "2023").await.unwrap().unwrap();
        assert_eq!(created.id, found.id);
    }

    #[tokio::test]
    async fn linking_same_image_twice_is_idempotent() {
        let pool = test_pool().await;
        let cryptor = cryptor();
        let indexer = indexer();
        let album = create(&pool, &cryptor, &indexer, "2024").await.unwrap();

        link_image(&pool, &album.id, "image-1").await.unwrap();
        link_image(&pool, &album.id, "image-1").await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM album_image WHERE album_id = ?")
            .bind(&album.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn unlink_removes_all_xrefs_for_image() {
        let pool = test_pool().await;
        let cryptor = cryptor();
        let indexer = indexer();
        let album_a = create(&pool, &cryptor, &indexer, "2022").await.unwrap();
        let album_b = create(&pool, &cryptor, &indexer, "2023").await.unwrap();

        link_image(&pool, &album_a.id, "image-1").await.unwrap();
        link_image(&pool, &album_b.id, "image-1").await.unwrap();
        unlink_image(&pool, "image-1").await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM album_image WHERE image_id = ?")
            .bind("image-1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn titles_for_image_returns_decrypted_titles() {
        let pool = test_pool().await;
        let cryptor = cryptor();
        let indexer = indexer();
        let album = create(&pool, &cryptor, &indexer, "2025").await.unwrap();
        link_image(&pool, &album.id, "image-9").await.unwrap();

        let titles = titles_for_image(&pool, &cryptor, "image-9").await.unwrap();
        assert!(titles.contains("2025"));
        assert_eq!(titles.len(), 1);
    }
}
