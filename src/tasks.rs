//! Spawns the pipeline's two long-lived background workers.
//!
//! Two permanent queue-consumer tasks: each drains its `mpsc` channel for
//! the lifetime of the process and exits only when the corresponding
//! sender is dropped (graceful shutdown).

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::db::models::{ReprocessCmd, WebhookPutObject};
use crate::pipeline::{ReprocessWorker, UploadWorker};

pub fn spawn_background_tasks(
    upload_worker: UploadWorker,
    upload_rx: mpsc::Receiver<WebhookPutObject>,
    reprocess_worker: Arc<ReprocessWorker>,
    reprocess_rx: mpsc::Receiver<ReprocessCmd>,
) {
    tokio::spawn(upload_worker.run(upload_rx));
    tokio::spawn(reprocess_worker.run(reprocess_rx));
}
