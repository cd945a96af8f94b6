//! S3 Manager Server
//!
//! A web API for browsing and managing buckets and objects on S3-compatible
//! storage (MinIO, Cloudflare R2, Backblaze B2, AWS S3).

pub mod classify;
pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod state;
pub mod storage;

pub use config::Config;
pub use error::{AppError, ErrorKind, Result};
pub use service::StorageService;
pub use state::AppState;
