//! Storage module for S3-compatible backends
//!
//! Supports MinIO, Cloudflare R2, Backblaze B2, and AWS S3 through
//! [`S3Client`], plus an in-process [`MemoryStore`] with the same semantics.

mod memory;
mod s3_client;
mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use s3_client::S3Client;
pub use types::*;

/// Result type for raw backend calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The S3 operations the service layer consumes.
///
/// Implementations report failures as [`StoreError`] without classifying
/// them; classification happens once, in the service layer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `ListObjectsV2`
    async fn list_objects_v2(&self, request: ListObjectsRequest) -> StoreResult<ObjectList>;

    /// `ListBuckets`, one backend page at a time
    async fn list_buckets(&self, continuation_token: Option<String>) -> StoreResult<BucketList>;

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()>;

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Quiet-mode `DeleteObjects`: only the keys that failed are returned.
    ///
    /// Callers must not pass more than [`MAX_DELETE_BATCH`] keys.
    async fn delete_objects(&self, bucket: &str, keys: Vec<String>)
        -> StoreResult<Vec<DeleteFailure>>;

    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutObjectOutput>;

    /// `DeleteObject`; deleting an absent key succeeds
    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput>;

    /// Presigned `GetObject` URL valid for `expires_in`
    async fn presign_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String>;
}
