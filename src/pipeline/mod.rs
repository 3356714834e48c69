//! The ingestion pipeline core: key parsing, EXIF extraction, image
//! operations, derivative synthesis, the album materializer, and the two
//! long-lived workers (upload, reprocess) that drive them end to end.

pub mod album;
pub mod derivatives;
pub mod exif;
pub mod image_ops;
pub mod ingress;
pub mod key;
pub mod placeholder;
pub mod reprocess;
pub mod upload_worker;

pub use reprocess::ReprocessWorker;
pub use upload_worker::UploadWorker;
