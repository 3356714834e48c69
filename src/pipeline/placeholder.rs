//! Placeholder-creation protocol — the entry gate into the
//! pipeline. Invoked from the HTTP layer, but the allocation rule (fresh
//! slug per image, `uploads/` prefix) is part of the pipeline contract: it
//! is what makes two webhooks for the same slug an impossibility in
//! practice.

use uuid::Uuid;

use crate::config::Config;
use crate::crypt::{Cryptor, Indexer};
use crate::db::models::{AddMetaDataCmd, PlaceholderResponse};
use crate::error::{AppError, AppResult};
use crate::objectstore::ObjectStore;
use crate::services::images;

/// Default pre-signed URL lifetime handed to clients for the direct upload.
const PRESIGN_EXPIRES_SECS: u32 = 15 * 60;

fn ext_from_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Mints a fresh slug, inserts an unpublished placeholder record, and
/// returns a pre-signed PUT URL the client uploads the raw bytes to.
pub async fn build_placeholder(
    pool: &sqlx::SqlitePool,
    store: &dyn ObjectStore,
    cryptor: &dyn Cryptor,
    indexer: &dyn Indexer,
    config: &Config,
    cmd: AddMetaDataCmd,
) -> AppResult<PlaceholderResponse> {
    if !config.allowed_file_types.iter().any(|t| t == &cmd.file_type) {
        return Err(AppError::InvalidInput(format!(
            "file type '{}' is not allowed",
            cmd.file_type
        )));
    }
    let ext = ext_from_mime(&cmd.file_type)
        .ok_or_else(|| AppError::InvalidInput(format!("no known extension for '{}'", cmd.file_type)))?;

    let id = Uuid::new_v4().to_string();
    let slug = Uuid::new_v4().to_string();
    let file_name = format!("{slug}.{ext}");
    let object_key = format!("uploads/{file_name}");
    let slug_index = indexer.blind_index(&slug);

    let row = images::insert_placeholder(
        pool,
        cryptor,
        &id,
        &slug,
        &slug_index,
        &cmd.title,
        &cmd.description,
        &file_name,
        &cmd.file_type,
        &object_key,
    )
    .await?;

    let signed_url = store.presign_put(&object_key, PRESIGN_EXPIRES_SECS).await?;

    Ok(PlaceholderResponse {
        id: row.id,
        slug,
        file_name,
        object_key,
        signed_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::{ChaChaCryptor, HmacIndexer};
    use crate::db;
    use crate::objectstore::memory::MemoryObjectStore;

    fn cryptor() -> ChaChaCryptor {
        ChaChaCryptor::new("MDEyMzQ1Njc4OTAxMjM0NTY3ODkwMTIzNDU2Nzg5MDE=").unwrap()
    }

    fn indexer() -> HmacIndexer {
        HmacIndexer::new("dGVzdC1ibGluZC1pbmRleC1rZXk=").unwrap()
    }

    #[tokio::test]
    async fn mints_placeholder_under_uploads_prefix() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let store = MemoryObjectStore::new();
        let cryptor = cryptor();
        let indexer = indexer();
        let config = Config::test_defaults();

        let cmd = AddMetaDataCmd {
            file_type: "image/jpeg".into(),
            title: "summer trip".into(),
            description: "".into(),
        };

        let response = build_placeholder(&pool, &store, &cryptor, &indexer, &config, cmd)
            .await
            .unwrap();

        assert!(response.object_key.starts_with("uploads/"));
        assert!(response.object_key.ends_with(".jpg"));
        assert!(!response.signed_url.is_empty());

        let row = images::find_by_id(&pool, &response.id).await.unwrap();
        assert!(!row.is_published);
        assert_eq!(row.object_key, response.object_key);
    }

    #[tokio::test]
    async fn rejects_disallowed_file_type() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let store = MemoryObjectStore::new();
        let cryptor = cryptor();
        let indexer = indexer();
        let config = Config::test_defaults();

        let cmd = AddMetaDataCmd {
            file_type: "application/pdf".into(),
            title: "".into(),
            description: "".into(),
        };

        let err = build_placeholder(&pool, &store, &cryptor, &indexer, &config, cmd)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
