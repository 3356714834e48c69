//! Upload worker — first processing of a freshly-uploaded image.
//! Consumes `WebhookPutObject` events off a bounded
//! channel and drives them end to end: EXIF read, directory decision,
//! album materialization, derivative fan-out, canonical MOVE, and the
//! single record commit.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::crypt::{Cryptor, Indexer};
use crate::db::models::WebhookPutObject;
use crate::error::{AppError, AppResult};
use crate::objectstore::ObjectStore;
use crate::pipeline::{album, derivatives, exif, image_ops, key};
use crate::services::{albums, audit, images};

pub struct UploadWorker {
    pool: SqlitePool,
    store: Arc<dyn ObjectStore>,
    cryptor: Arc<dyn Cryptor>,
    indexer: Arc<dyn Indexer>,
    config: Arc<Config>,
    derivative_semaphore: Arc<Semaphore>,
}

impl UploadWorker {
    pub fn new(
        pool: SqlitePool,
        store: Arc<dyn ObjectStore>,
        cryptor: Arc<dyn Cryptor>,
        indexer: Arc<dyn Indexer>,
        config: Arc<Config>,
    ) -> Self {
        let derivative_semaphore = Arc::new(Semaphore::new(config.max_concurrent_derivative_tasks));
        Self {
            pool,
            store,
            cryptor,
            indexer,
            config,
            derivative_semaphore,
        }
    }

    /// Drains `rx` until the sender side is dropped (graceful shutdown).
    pub async fn run(self, mut rx: mpsc::Receiver<WebhookPutObject>) {
        while let Some(event) = rx.recv().await {
            if let Err(err) = self.process_event(&event).await {
                warn!(error = %err, "upload event dropped");
            }
        }
        info!("upload worker exiting: channel closed");
    }

    async fn process_event(&self, event: &WebhookPutObject) -> AppResult<()> {
        // Step 1/2: validate + parse. Ingress already checked the bucket/key
        // shape, but the worker re-parses independently — it must never
        // trust upstream validation as its only line of defense.
        let minio_key = event
            .minio_key()
            .ok_or_else(|| AppError::InvalidInput("webhook payload has no object key".into()))?;
        let parsed = key::parse(minio_key)?;
        let upload_key = parsed.to_key();

        // Step 3/4: scoped streaming GET + EXIF read. `reader` is dropped
        // (and logs its release) at the end of this function's scope.
        let reader = self.store.get(&upload_key).await?;
        let size = reader.bytes.len() as i64;
        if size == 0 || size as u64 > self.config.image_max_size {
            return Err(AppError::InvalidInput(format!(
                "object '{upload_key}' has size {size}, outside (0, {}]",
                self.config.image_max_size
            )));
        }
        let exif_info = exif::read(&reader.bytes);

        // Step 5: load + decrypt the record.
        let row = images::find_by_slug(&self.pool, self.indexer.as_ref(), &parsed.slug).await?;
        let mut decrypted = images::decrypt(&row, self.cryptor.as_ref())?;

        // Step 6: current album associations.
        let existing_titles: HashSet<String> = albums::titles_for_image(&self.pool, self.cryptor.as_ref(), &decrypted.id).await?;

        // Step 7/8: directory decision.
        let (dir, album_to_link) = match exif_info.taken_at {
            Some(taken_at) => {
                let year = taken_at.format("%Y").to_string();
                decrypted.image_date = taken_at.to_rfc3339();
                let needs_link = !existing_titles.contains(&year);
                (year.clone(), needs_link.then_some(year))
            }
            None => (key::STAGING_DIR.to_string(), None),
        };
        decrypted.object_key = format!("{dir}/{}.{}", parsed.slug, parsed.ext);

        // Step 9: merge EXIF dimensions when non-zero.
        if exif_info.width != 0 && exif_info.height != 0 {
            decrypted.width = exif_info.width as i32;
            decrypted.height = exif_info.height as i32;
        }
        decrypted.size = size;

        // Step 7 (materializer half): invoked here, before the decode/
        // fan-out/commit. This keeps the record commit at step 13 as the single
        // point where a partial failure can leave behind inconsistent
        // state: if the materializer fails, nothing has been decoded,
        // fanned out, or committed yet, so the event is dropped cleanly
        // with no half-updated record. The converse ordering (commit
        // first, link after) would let a successful commit to `YYYY/...`
        // survive a subsequent album-link failure with no album/xref
        // ever created for it.
        if let Some(title) = &album_to_link {
            album::link_to_album(&self.pool, self.cryptor.as_ref(), self.indexer.as_ref(), title, &decrypted.id).await?;
        }

        // Step 10: decode + orient. CPU-bound, runs off the async executor.
        let bytes = reader.bytes.clone();
        let orientation = exif_info.orientation;
        let canonical = tokio::task::spawn_blocking(move || -> AppResult<image::DynamicImage> {
            let decoded = image_ops::decode(&bytes)?;
            Ok(image_ops::apply_orientation(decoded, orientation))
        })
        .await
        .map_err(|err| AppError::Internal(format!("decode task panicked: {err}")))??;
        let canonical = Arc::new(canonical);

        // Step 11: derivative fan-out, all independent, joined via a single
        // channel drained once the whole set completes (no pre-sized error
        // slice — see `pipeline::derivatives`).
        let specs = derivatives::plan(&dir, &parsed.slug, &parsed.ext, &self.config);
        let mut tasks: JoinSet<AppResult<()>> = JoinSet::new();

        for spec in specs {
            let store = self.store.clone();
            let config = self.config.clone();
            let canonical = canonical.clone();
            let permit = self.derivative_semaphore.clone();
            tasks.spawn(async move {
                let _permit = permit
                    .acquire_owned()
                    .await
                    .map_err(|_| AppError::Internal("derivative semaphore closed".into()))?;
                let bytes = tokio::task::spawn_blocking(move || derivatives::build_bytes(spec.kind, &canonical, &config))
                    .await
                    .map_err(|err| AppError::Internal(format!("derivative build panicked: {err}")))??;
                store.put(&spec.key, bytes, "image/jpeg").await?;
                Ok(())
            });
        }

        {
            let store = self.store.clone();
            let from = upload_key.clone();
            let to = decrypted.object_key.clone();
            tasks.spawn(async move { store.mv(&from, &to).await.map_err(AppError::from) });
        }

        // Step 12: join all tasks, collecting errors without aborting peers.
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(err.to_string()),
                Err(join_err) => errors.push(format!("task panicked: {join_err}")),
            }
        }

        if !errors.is_empty() {
            warn!(image_id = %decrypted.id, errors = ?errors, "derivative fan-out failed, record not updated");
            return Err(AppError::Internal(format!("fan-out failed: {}", errors.join("; "))));
        }

        // Step 13: commit. Only reached once every fan-out task succeeded.
        decrypted.is_published = dir != key::STAGING_DIR;

        let mut updated_row = row;
        updated_row.title = self.cryptor.encrypt(&decrypted.title)?;
        updated_row.description = self.cryptor.encrypt(&decrypted.description)?;
        updated_row.slug = self.cryptor.encrypt(&decrypted.slug)?;
        updated_row.image_date = self.cryptor.encrypt(&decrypted.image_date)?;
        updated_row.object_key = decrypted.object_key.clone();
        updated_row.width = decrypted.width;
        updated_row.height = decrypted.height;
        updated_row.size = decrypted.size;
        updated_row.is_published = decrypted.is_published;

        images::commit(&self.pool, &updated_row).await?;

        audit::log_action(
            &self.pool,
            "ingest",
            "image",
            &decrypted.id,
            &json!({ "objectKey": decrypted.object_key, "isPublished": decrypted.is_published }),
        )
        .await?;

        Ok(())
    }
}
