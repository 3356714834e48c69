mod api;
mod auth;
mod config;
mod crypt;
mod db;
mod error;
mod objectstore;
mod pipeline;
mod services;
mod tasks;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::crypt::{ChaChaCryptor, Cryptor, HmacIndexer, Indexer};
use crate::db::models::{ReprocessCmd, WebhookPutObject};
use crate::objectstore::{ObjectStore, S3ObjectStore};

/// Shared application state passed to every handler via Axum's `State`
/// extractor. Must be `Clone` — Axum clones it once per request. The
/// heavier members (`store`, `cryptor`, `indexer`) are behind `Arc` so the
/// clone is cheap and every worker/handler shares one instance of each.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<config::Config>,
    pub store: Arc<dyn ObjectStore>,
    pub cryptor: Arc<dyn Cryptor>,
    pub indexer: Arc<dyn Indexer>,
    pub upload_tx: tokio::sync::mpsc::Sender<WebhookPutObject>,
    pub reprocess_tx: tokio::sync::mpsc::Sender<ReprocessCmd>,
}

#[tokio::main]
async fn main() {
    // Load .env before anything else so variables are available to both the
    // tracing filter and Config::from_env().
    dotenvy::dotenv().ok(); // .ok() — missing file is fine in production

    // Structured tracing. Level controlled via RUST_LOG env var; defaults to
    // "info" if unset.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(config::Config::from_env());

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database and run migrations");

    let cryptor: Arc<dyn Cryptor> =
        Arc::new(ChaChaCryptor::new(&config.crypt_key_base64).expect("invalid CRYPT_KEY_BASE64"));
    let indexer: Arc<dyn Indexer> =
        Arc::new(HmacIndexer::new(&config.blind_index_key_base64).expect("invalid BLIND_INDEX_KEY_BASE64"));
    let store: Arc<dyn ObjectStore> = Arc::new(
        S3ObjectStore::new(
            &config.object_store_bucket,
            &config.object_store_region,
            &config.object_store_endpoint,
            &config.object_store_access_key,
            &config.object_store_secret_key,
        )
        .expect("failed to configure object store client"),
    );

    let (upload_tx, upload_rx) = tokio::sync::mpsc::channel::<WebhookPutObject>(config.queue_capacity);
    let (reprocess_tx, reprocess_rx) = tokio::sync::mpsc::channel::<ReprocessCmd>(config.queue_capacity);

    let upload_worker = pipeline::UploadWorker::new(pool.clone(), store.clone(), cryptor.clone(), indexer.clone(), config.clone());
    let reprocess_worker = Arc::new(pipeline::ReprocessWorker::new(
        pool.clone(),
        store.clone(),
        cryptor.clone(),
        indexer.clone(),
        config.clone(),
        reprocess_tx.clone(),
    ));

    let port = config.port;

    let state = AppState {
        pool,
        config,
        store,
        cryptor,
        indexer,
        upload_tx,
        reprocess_tx,
    };

    tasks::spawn_background_tasks(upload_worker, upload_rx, reprocess_worker, reprocess_rx);

    // ── Route groups ──────────────────────────────────────────────────────────
    //
    // 1. Public routes — no authentication required.
    let public_routes = Router::new().route("/api/health", get(api::health::health_check));

    // 2. The pipeline's one HTTP-reachable entry gate: the webhook ingress
    //    and the image-metadata surface, both guarded by the service-token
    //    stand-in (full scope verification is an external
    //    collaborator; see `auth::middleware`).
    let pipeline_routes = Router::new()
        .route("/api/webhook/upload", post(api::webhook::handle_image_upload_notification))
        .route("/api/images", post(api::images::create_placeholder))
        .route("/api/images/{slug}", put(api::images::update_metadata))
        .layer(from_fn_with_state(state.clone(), auth::middleware::require_webhook_token));

    let app = Router::new()
        .merge(public_routes)
        .merge(pipeline_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind TCP listener");

    axum::serve(listener, app).await.expect("server error");
}
