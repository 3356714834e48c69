use serde::Deserialize;

/// Application configuration loaded from environment variables via `envy`.
///
/// All fields map directly to environment variable names (uppercased by
/// envy). Provide defaults via `.env` for local development; override via
/// real env vars in production.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// TCP port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite connection string, e.g. `sqlite:data/photovault.db?mode=rwc`.
    pub database_url: String,

    /// S3-compatible (MinIO) bucket holding canonical objects and derivatives.
    pub object_store_bucket: String,
    pub object_store_region: String,
    pub object_store_endpoint: String,
    pub object_store_access_key: String,
    pub object_store_secret_key: String,

    /// 32-byte key (base64) used to derive the ChaCha20-Poly1305 key for
    /// field-level encryption of `title`, `description`, `slug`, `imageDate`.
    pub crypt_key_base64: String,

    /// Secret key used to derive the HMAC-SHA256 blind index over `slug`.
    pub blind_index_key_base64: String,

    /// Bearer token this service accepts on the inbound webhook and the
    /// placeholder-creation endpoint. Stands in for the real service-to-service
    /// and patron-access token verification, which is out of scope for this
    /// crate.
    pub webhook_bearer_token: String,

    /// Output JPEG quality (0-100) applied to every encoded derivative.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Target widths for the responsive resolution family, smallest first.
    #[serde(default = "default_resolution_widths")]
    pub resolution_widths_images: Vec<u32>,

    /// Target widths for the tile family, smallest first.
    #[serde(default = "default_tile_widths")]
    pub resolution_widths_tiles: Vec<u32>,

    /// Longest-side extent for the blur placeholder.
    #[serde(default = "default_blur_extent")]
    pub blur_extent: u32,

    /// Upper bound on the number of reprocess attempts for one command.
    #[serde(default = "default_max_reprocess_retries")]
    pub max_reprocess_retries: u32,

    /// MIME whitelist enforced at placeholder-creation time.
    #[serde(default = "default_allowed_file_types")]
    pub allowed_file_types: Vec<String>,

    /// Byte ceiling for a single image upload.
    #[serde(default = "default_image_max_size")]
    pub image_max_size: u64,

    /// Bound on concurrent derivative I/O tasks across all in-flight events,
    /// guarding against unbounded fan-out.
    #[serde(default = "default_max_concurrent_derivative_tasks")]
    pub max_concurrent_derivative_tasks: usize,

    /// Capacity of the upload and reprocess mpsc channels.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_port() -> u16 {
    8080
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_resolution_widths() -> Vec<u32> {
    vec![320, 768, 1280]
}

fn default_tile_widths() -> Vec<u32> {
    vec![160, 320]
}

fn default_blur_extent() -> u32 {
    40
}

fn default_max_reprocess_retries() -> u32 {
    5
}

fn default_allowed_file_types() -> Vec<String> {
    vec![
        "image/jpeg".into(),
        "image/png".into(),
        "image/webp".into(),
    ]
}

fn default_image_max_size() -> u64 {
    50 * 1024 * 1024
}

fn default_max_concurrent_derivative_tasks() -> usize {
    32
}

fn default_queue_capacity() -> usize {
    256
}

impl Config {
    /// Load configuration from the current process environment.
    ///
    /// Panics with a clear message if any required variable is missing.
    pub fn from_env() -> Self {
        envy::from_env::<Config>().unwrap_or_else(|err| {
            panic!("configuration error: {err}\nCheck that all required environment variables are set (see .env.example).");
        })
    }

    /// A fully-populated `Config` for unit tests, so pipeline tests don't
    /// need a `.env` file or real object-store credentials.
    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Config {
            port: default_port(),
            database_url: "sqlite::memory:".into(),
            object_store_bucket: "test-bucket".into(),
            object_store_region: "us-east-1".into(),
            object_store_endpoint: "http://localhost:9000".into(),
            object_store_access_key: "test".into(),
            object_store_secret_key: "test".into(),
            crypt_key_base64: "MDEyMzQ1Njc4OTAxMjM0NTY3ODkwMTIzNDU2Nzg5MDE=".into(),
            blind_index_key_base64: "dGVzdC1ibGluZC1pbmRleC1rZXk=".into(),
            webhook_bearer_token: "test-token".into(),
            jpeg_quality: default_jpeg_quality(),
            resolution_widths_images: default_resolution_widths(),
            resolution_widths_tiles: default_tile_widths(),
            blur_extent: default_blur_extent(),
            max_reprocess_retries: default_max_reprocess_retries(),
            allowed_file_types: default_allowed_file_types(),
            image_max_size: default_image_max_size(),
            max_concurrent_derivative_tasks: default_max_concurrent_derivative_tasks(),
            queue_capacity: default_queue_capacity(),
        }
    }
}
