//! Reprocess worker — re-homes and rebuilds an image's derivative family
//! after a metadata edit changes its logical directory, or repairs a
//! partial failure left behind by the upload worker.
//!
//! A retryable failure does not silently stop at "increment
//! `retry_count`": it re-enqueues the command onto its own channel after
//! an exponential-with-jitter delay, capped by
//! `Config::max_reprocess_retries`.

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use rand::Rng;
use serde_json::json;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::crypt::{Cryptor, Indexer};
use crate::db::models::ReprocessCmd;
use crate::error::{AppError, AppResult};
use crate::objectstore::{ObjectStore, ObjectStoreError};
use crate::pipeline::{album, derivatives, image_ops, key};
use crate::services::{albums, audit};

const BASE_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct ReprocessWorker {
    pool: SqlitePool,
    store: Arc<dyn ObjectStore>,
    cryptor: Arc<dyn Cryptor>,
    indexer: Arc<dyn Indexer>,
    config: Arc<Config>,
    derivative_semaphore: Arc<Semaphore>,
    self_tx: mpsc::Sender<ReprocessCmd>,
}

impl ReprocessWorker {
    pub fn new(
        pool: SqlitePool,
        store: Arc<dyn ObjectStore>,
        cryptor: Arc<dyn Cryptor>,
        indexer: Arc<dyn Indexer>,
        config: Arc<Config>,
        self_tx: mpsc::Sender<ReprocessCmd>,
    ) -> Self {
        let derivative_semaphore = Arc::new(Semaphore::new(config.max_concurrent_derivative_tasks));
        Self {
            pool,
            store,
            cryptor,
            indexer,
            config,
            derivative_semaphore,
            self_tx,
        }
    }

    /// Drains `rx` until the sender side is dropped (graceful shutdown).
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<ReprocessCmd>) {
        while let Some(cmd) = rx.recv().await {
            let worker = self.clone();
            if let Err(err) = worker.process_cmd(cmd).await {
                warn!(error = %err, "reprocess command dropped");
            }
        }
        info!("reprocess worker exiting: channel closed");
    }

    async fn process_cmd(&self, cmd: ReprocessCmd) -> AppResult<()> {
        // Step 1: retry budget.
        if cmd.retry_count >= self.config.max_reprocess_retries {
            warn!(image_id = %cmd.id, retry_count = cmd.retry_count, "reprocess retry budget exhausted");
            audit::log_action(&self.pool, "reprocess_exhausted", "image", &cmd.id, &json!({ "retryCount": cmd.retry_count })).await?;
            return Err(AppError::Exhausted);
        }

        // Step 2: reserved no-op.
        if !cmd.move_required {
            debug!(image_id = %cmd.id, "reprocess command has moveRequired=false, reserved no-op");
            return Ok(());
        }

        // Step 3: parse the current key.
        let old_parsed = match key::parse(&cmd.current_obj_key) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(image_id = %cmd.id, error = %err, "reprocess: could not parse currentObjKey");
                return self.requeue_or_drop(cmd).await;
            }
        };
        let new_parsed = match key::parse(&cmd.updated_obj_key) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(image_id = %cmd.id, error = %err, "reprocess: could not parse updatedObjKey");
                return self.requeue_or_drop(cmd).await;
            }
        };

        // Step 4: MOVE the canonical object.
        match self.store.mv(&cmd.current_obj_key, &cmd.updated_obj_key).await {
            Ok(()) => {}
            Err(ObjectStoreError::NotFound(_)) => {
                warn!(image_id = %cmd.id, key = %cmd.current_obj_key, "reprocess: canonical object not found");
                return self.requeue_or_drop(cmd).await;
            }
            Err(ObjectStoreError::Other(msg)) => {
                warn!(image_id = %cmd.id, error = %msg, "reprocess: canonical MOVE failed");
                return self.requeue_or_drop(cmd).await;
            }
        }

        // Step 5: derivative re-home / rebuild fan-out.
        let old_specs = derivatives::plan(&old_parsed.dir, &old_parsed.slug, &old_parsed.ext, &self.config);
        let new_specs = derivatives::plan(&new_parsed.dir, &new_parsed.slug, &new_parsed.ext, &self.config);
        debug_assert_eq!(old_specs.len(), new_specs.len());

        let canonical_cell: Arc<OnceCell<Arc<DynamicImage>>> = Arc::new(OnceCell::new());
        let mut tasks: JoinSet<AppResult<()>> = JoinSet::new();

        for (old_spec, new_spec) in old_specs.into_iter().zip(new_specs.into_iter()) {
            let store = self.store.clone();
            let config = self.config.clone();
            let updated_obj_key = cmd.updated_obj_key.clone();
            let canonical_cell = canonical_cell.clone();
            let permit = self.derivative_semaphore.clone();
            tasks.spawn(async move {
                let _permit = permit
                    .acquire_owned()
                    .await
                    .map_err(|_| AppError::Internal("derivative semaphore closed".into()))?;
                match store.mv(&old_spec.key, &new_spec.key).await {
                    Ok(()) => Ok(()),
                    Err(ObjectStoreError::NotFound(_)) => {
                        let canonical = get_or_init_canonical(&canonical_cell, &store, &updated_obj_key).await?;
                        let kind = new_spec.kind;
                        let bytes = tokio::task::spawn_blocking(move || derivatives::build_bytes(kind, &canonical, &config))
                            .await
                            .map_err(|err| AppError::Internal(format!("derivative rebuild panicked: {err}")))??;
                        store.put(&new_spec.key, bytes, "image/jpeg").await?;
                        Ok(())
                    }
                    Err(ObjectStoreError::Other(msg)) => Err(AppError::StoreIO(msg)),
                }
            });
        }

        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(err.to_string()),
                Err(join_err) => errors.push(format!("task panicked: {join_err}")),
            }
        }

        // Step 6: join.
        if !errors.is_empty() {
            warn!(image_id = %cmd.id, errors = ?errors, "reprocess: derivative re-home/rebuild failed");
            return self.requeue_or_drop(cmd).await;
        }

        // Step 7: parse the new directory as a year and relink the album.
        if !key::is_year(&new_parsed.dir) {
            debug!(image_id = %cmd.id, dir = %new_parsed.dir, "reprocess: updated directory is not a year, skipping album link");
            return self.requeue_or_drop(cmd).await;
        }

        albums::unlink_image(&self.pool, &cmd.id).await?;
        album::link_to_album(&self.pool, self.cryptor.as_ref(), self.indexer.as_ref(), &new_parsed.dir, &cmd.id).await?;

        audit::log_action(
            &self.pool,
            "reprocess",
            "image",
            &cmd.id,
            &json!({ "currentObjKey": cmd.current_obj_key, "updatedObjKey": cmd.updated_obj_key }),
        )
        .await?;

        Ok(())
    }

    /// Increments `retry_count`; if still under budget, schedules a
    /// re-enqueue after an exponential-with-jitter delay on a detached
    /// task. Otherwise logs and drops.
    async fn requeue_or_drop(&self, mut cmd: ReprocessCmd) -> AppResult<()> {
        cmd.retry_count += 1;
        if cmd.retry_count >= self.config.max_reprocess_retries {
            warn!(image_id = %cmd.id, retry_count = cmd.retry_count, "reprocess command dropped, retry budget reached");
            audit::log_action(&self.pool, "reprocess_exhausted", "image", &cmd.id, &json!({ "retryCount": cmd.retry_count })).await?;
            return Err(AppError::Exhausted);
        }

        let delay = backoff_with_jitter(cmd.retry_count);
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(cmd).await;
        });
        Ok(())
    }
}

/// `2^retry_count * BASE_BACKOFF`, capped at `MAX_BACKOFF`, plus up to 20%
/// jitter so a burst of simultaneously-failing commands doesn't retry in
/// lockstep.
fn backoff_with_jitter(retry_count: u32) -> Duration {
    let exp = BASE_BACKOFF.saturating_mul(1u32.checked_shl(retry_count).unwrap_or(u32::MAX));
    let capped = exp.min(MAX_BACKOFF);
    let jitter_ms = rand::thread_rng().gen_range(0..=(capped.as_millis() as u64 / 5).max(1));
    capped + Duration::from_millis(jitter_ms)
}

/// Lazily streams and decodes the now-canonical object at `key`, memoizing
/// the result in `cell` so concurrent rebuild tasks within one command
/// decode it at most once.
async fn get_or_init_canonical(
    cell: &OnceCell<Arc<DynamicImage>>,
    store: &Arc<dyn ObjectStore>,
    key: &str,
) -> AppResult<Arc<DynamicImage>> {
    if let Some(img) = cell.get() {
        return Ok(img.clone());
    }
    let reader = store.get(key).await?;
    let bytes = reader.bytes.clone();
    let decoded = tokio::task::spawn_blocking(move || image_ops::decode(&bytes))
        .await
        .map_err(|err| AppError::Internal(format!("decode task panicked: {err}")))??;
    let decoded = Arc::new(decoded);
    let _ = cell.set(decoded.clone());
    Ok(cell.get().cloned().unwrap_or(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::{ChaChaCryptor, HmacIndexer};
    use crate::db;
    use crate::objectstore::memory::MemoryObjectStore;
    use crate::services::images;

    fn cryptor() -> Arc<dyn Cryptor> {
        Arc::new(ChaChaCryptor::new("MDEyMzQ1Njc4OTAxMjM0NTY3ODkwMTIzNDU2Nzg5MDE=").unwrap())
    }

    fn indexer() -> Arc<dyn Indexer> {
        Arc::new(HmacIndexer::new("dGVzdC1ibGluZC1pbmRleC1rZXk=").unwrap())
    }

    fn sample_jpeg(w: u32, h: u32) -> Vec<u8> {
        use image::{Rgb, RgbImage};
        let img = image::DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])));
        image_ops::encode_jpeg(&img, 90).unwrap()
    }

    async fn make_worker(
        store: Arc<dyn ObjectStore>,
        config: Arc<Config>,
    ) -> (Arc<ReprocessWorker>, mpsc::Sender<ReprocessCmd>, mpsc::Receiver<ReprocessCmd>) {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let (tx, rx) = mpsc::channel(16);
        let worker = Arc::new(ReprocessWorker::new(pool, store, cryptor(), indexer(), config, tx.clone()));
        (worker, tx, rx)
    }

    #[tokio::test]
    async fn drops_when_retry_budget_already_reached() {
        let config = Arc::new(Config {
            max_reprocess_retries: 5,
            ..Config::test_defaults()
        });
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let (worker, _tx, _rx) = make_worker(store, config).await;

        let cmd = ReprocessCmd {
            id: "img-1".into(),
            file_name: "x.jpg".into(),
            file_type: "image/jpeg".into(),
            slug: "11111111-1111-1111-1111-111111111111".into(),
            current_obj_key: "staging/11111111-1111-1111-1111-111111111111.jpg".into(),
            updated_obj_key: "2023/11111111-1111-1111-1111-111111111111.jpg".into(),
            move_required: true,
            retry_count: 5,
        };

        let err = worker.process_cmd(cmd).await.unwrap_err();
        assert!(matches!(err, AppError::Exhausted));
    }

    #[tokio::test]
    async fn no_op_when_move_not_required() {
        let config = Arc::new(Config::test_defaults());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let (worker, _tx, _rx) = make_worker(store, config).await;

        let cmd = ReprocessCmd {
            id: "img-1".into(),
            file_name: "x.jpg".into(),
            file_type: "image/jpeg".into(),
            slug: "11111111-1111-1111-1111-111111111111".into(),
            current_obj_key: "staging/11111111-1111-1111-1111-111111111111.jpg".into(),
            updated_obj_key: "staging/11111111-1111-1111-1111-111111111111.jpg".into(),
            move_required: false,
            retry_count: 1,
        };

        worker.process_cmd(cmd).await.unwrap();
    }

    #[tokio::test]
    async fn rehomes_existing_derivatives_and_rebuilds_missing_one() {
        let config = Arc::new(Config {
            resolution_widths_images: vec![320],
            resolution_widths_tiles: vec![160],
            ..Config::test_defaults()
        });
        let memory = Arc::new(MemoryObjectStore::new());
        let store: Arc<dyn ObjectStore> = memory.clone();

        let slug = "22222222-2222-2222-2222-222222222222";
        let old_key = format!("staging/{slug}.jpg");
        let new_key = format!("2023/{slug}.jpg");

        // Seed the canonical and every derivative except one tile, so the
        // fan-out has to move most keys and rebuild the missing one.
        memory.seed(&old_key, sample_jpeg(800, 600));
        memory.seed(&format!("staging/{slug}_w320.jpg"), sample_jpeg(320, 240));
        memory.seed(&format!("staging/{slug}_blur.jpg"), sample_jpeg(40, 30));
        // Deliberately omit staging/{slug}_tile_w160.jpg so it must be rebuilt.

        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let slug_index = indexer().blind_index(slug);
        images::insert_placeholder(&pool, cryptor().as_ref(), "img-2", slug, &slug_index, "t", "d", "x.jpg", "image/jpeg", &old_key)
            .await
            .unwrap();

        let (tx, _rx) = mpsc::channel(16);
        let indexer = indexer();
        let worker = ReprocessWorker::new(pool.clone(), store, cryptor(), indexer.clone(), config, tx);

        let cmd = ReprocessCmd {
            id: "img-2".into(),
            file_name: "x.jpg".into(),
            file_type: "image/jpeg".into(),
            slug: slug.into(),
            current_obj_key: old_key,
            updated_obj_key: new_key.clone(),
            move_required: true,
            retry_count: 1,
        };

        worker.process_cmd(cmd).await.unwrap();

        assert!(memory.contains(&new_key));
        assert!(memory.contains(&format!("2023/{slug}_w320.jpg")));
        assert!(memory.contains(&format!("2023/{slug}_tile_w160.jpg")));
        assert!(memory.contains(&format!("2023/{slug}_blur.jpg")));

        let album = albums::find_by_slug(&pool, indexer.as_ref(), "2023").await.unwrap().unwrap();
        let xref_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM album_image WHERE album_id = ? AND image_id = ?")
            .bind(&album.id)
            .bind("img-2")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(xref_count, 1);
    }
}
