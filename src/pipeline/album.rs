//! Album materializer — `linkToAlbum`.
//!
//! Idempotent at the title level on a best-effort basis: two concurrent
//! callers that both observe a missing year-album can both insert one,
//! producing two rows with the same decrypted `title`. This is accepted
//! (scenario S6) because nothing reads albums by title; every read path
//! goes through `slugIndex`.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::crypt::{Cryptor, Indexer};
use crate::error::{AppError, AppResult};
use crate::services::albums;

/// A title must be non-empty, at most 64 characters, and contain only
/// ASCII alphanumerics, `_`, or `-`. Year-titles (`"2023"`) always satisfy
/// this; it exists to reject anything a corrupt `imageDate` might produce.
fn is_valid_title(title: &str) -> bool {
    !title.is_empty()
        && title.len() <= 64
        && title.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Ensures an album titled `title` exists and is cross-referenced with
/// `image_id`, creating the album on first use.
pub async fn link_to_album(
    pool: &SqlitePool,
    cryptor: &dyn Cryptor,
    indexer: &dyn Indexer,
    title: &str,
    image_id: &str,
) -> AppResult<()> {
    if !is_valid_title(title) {
        return Err(AppError::InvalidInput(format!("invalid album title '{title}'")));
    }
    if Uuid::parse_str(image_id).is_err() {
        return Err(AppError::InvalidInput(format!("invalid image id '{image_id}'")));
    }

    let album_id = match albums::find_by_slug(pool, indexer, title).await? {
        Some(existing) => existing.id,
        None => albums::create(pool, cryptor, indexer, title).await?.id,
    };

    albums::link_image(pool, &album_id, image_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::{ChaChaCryptor, HmacIndexer};
    use crate::db;

    fn cryptor() -> ChaChaCryptor {
        ChaChaCryptor::new("MDEyMzQ1Njc4OTAxMjM0NTY3ODkwMTIzNDU2Nzg5MDE=").unwrap()
    }

    fn indexer() -> HmacIndexer {
        HmacIndexer::new("dGVzdC1ibGluZC1pbmRleC1rZXk=").unwrap()
    }

    #[tokio::test]
    async fn creates_album_on_first_use_and_links() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let cryptor = cryptor();
        let indexer = indexer();
        let image_id = Uuid::new_v4().to_string();

        link_to_album(&pool, &cryptor, &indexer, "2023", &image_id).await.unwrap();

        let album = albums::find_by_slug(&pool, &indexer, "2023").await.unwrap().unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM album_image WHERE album_id = ? AND image_id = ?")
            .bind(&album.id)
            .bind(&image_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn reuses_existing_album_for_same_title() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let cryptor = cryptor();
        let indexer = indexer();
        let image_a = Uuid::new_v4().to_string();
        let image_b = Uuid::new_v4().to_string();

        link_to_album(&pool, &cryptor, &indexer, "2024", &image_a).await.unwrap();
        link_to_album(&pool, &cryptor, &indexer, "2024", &image_b).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM album WHERE slug_index = ?")
            .bind(indexer.blind_index("2024"))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn rejects_invalid_title() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let cryptor = cryptor();
        let indexer = indexer();
        let image_id = Uuid::new_v4().to_string();

        let err = link_to_album(&pool, &cryptor, &indexer, "", &image_id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn rejects_invalid_image_id() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let cryptor = cryptor();
        let indexer = indexer();

        let err = link_to_album(&pool, &cryptor, &indexer, "2023", "not-a-uuid").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
