use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Read models (database rows) ─────────────────────────────────────────────
//
// `title`, `description`, `slug`, and `image_date` are stored as ciphertext
// (see `crate::crypt`); callers must decrypt them before use and re-encrypt
// before writing them back. `slug_index` is the deterministic blind index of
// `slug` and is the only column a query may filter or join on.

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: String,
    pub slug_index: String,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub image_date: String,
    pub file_name: String,
    pub file_type: String,
    pub object_key: String,
    pub width: i32,
    pub height: i32,
    pub size: i64,
    pub is_archived: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Album {
    pub id: String,
    pub slug_index: String,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlbumImageXref {
    pub id: i64,
    pub album_id: String,
    pub image_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLogEntry {
    pub id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

// ─── Decrypted views ──────────────────────────────────────────────────────────
//
// The plaintext shape of `Image`/`Album` after the encrypted fields have been
// decrypted. Pipeline logic operates on these, never on the raw row, so a
// missed `decrypt()` call is a compile error rather than a silent plaintext
// leak into a log line.

#[derive(Debug, Clone)]
pub struct DecryptedImage {
    pub id: String,
    pub slug_index: String,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub image_date: String,
    pub file_name: String,
    pub file_type: String,
    pub object_key: String,
    pub width: i32,
    pub height: i32,
    pub size: i64,
    pub is_archived: bool,
    pub is_published: bool,
}

// ─── Wire / queue models ──────────────────────────────────────────────────────

/// Inbound object-storage PUT-complete notification (MinIO/S3-compatible
/// webhook shape). Only the fields the pipeline actually reads are modeled;
/// the rest of the vendor payload is accepted and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPutObject {
    #[serde(rename = "Records")]
    pub records: Vec<WebhookRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRecord {
    pub s3: WebhookS3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookS3 {
    pub bucket: WebhookBucket,
    pub object: WebhookObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookObject {
    pub key: String,
}

impl WebhookPutObject {
    /// The object key the webhook refers to, i.e. `uploads/<uuid>.<ext>`.
    /// Named after the field the source exposes (`minioKey`).
    pub fn minio_key(&self) -> Option<&str> {
        self.records.first().map(|r| r.s3.object.key.as_str())
    }

    pub fn bucket_name(&self) -> Option<&str> {
        self.records.first().map(|r| r.s3.bucket.name.as_str())
    }
}

/// A command to move and/or rebuild an image's canonical object and its
/// derivative family. `retry_count` starts at 1 on first enqueue; the
/// reprocess worker drops the command once it reaches
/// `Config::max_reprocess_retries`.
#[derive(Debug, Clone)]
pub struct ReprocessCmd {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    pub slug: String,
    pub current_obj_key: String,
    pub updated_obj_key: String,
    pub move_required: bool,
    pub retry_count: u32,
}

/// Input to the placeholder-creation protocol: the
/// entry gate into the pipeline. `file_type` must be in
/// `Config::allowed_file_types`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddMetaDataCmd {
    pub file_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Response to a successful placeholder-creation request: the freshly
/// inserted record's public fields plus the pre-signed upload URL.
#[derive(Debug, Serialize)]
pub struct PlaceholderResponse {
    pub id: String,
    pub slug: String,
    pub file_name: String,
    pub object_key: String,
    pub signed_url: String,
}

/// Request body for `PUT /api/images/{slug}` — the metadata-edit path that
/// can change an image's logical home.
#[derive(Debug, Deserialize)]
pub struct UpdateImageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// RFC3339 UTC timestamp. Changing the year changes `objectKey`'s
    /// directory and enqueues a `ReprocessCmd`.
    pub image_date: Option<DateTime<Utc>>,
}
