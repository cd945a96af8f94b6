//! Bucket and object lifecycle
//!
//! Recursive deletes enumerate and batch-delete sequentially and are not
//! atomic: a failure part way leaves whatever was already removed deleted.
//! Deletes are idempotent per key, so callers may simply retry.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{Stream, StreamExt};

use crate::classify::{classify, is_bucket_not_empty, map_error};
use crate::error::{AppError, Result, StoreError};
use crate::storage::{DeleteFailure, ListObjectsRequest, PutObjectRequest};

use super::listing::bucket_error;
use super::{directory_prefix, Object, ObjectDownload, StorageService, DELIMITER};

pub(crate) const DIRECTORY_NOT_EMPTY: &str = "directory is not empty";
pub(crate) const OBJECT_NOT_FOUND: &str = "object not found";

/// Shortest presigned URL lifetime accepted
pub const MIN_PRESIGN_EXPIRY: Duration = Duration::from_secs(1);
/// Longest presigned URL lifetime S3 signs (7 days)
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Whether `key` is `scope` itself or lies below it
fn in_scope(key: &str, scope: &str) -> bool {
    if scope.ends_with(DELIMITER) {
        return key.starts_with(scope);
    }
    key == scope
        || key
            .strip_prefix(scope)
            .is_some_and(|rest| rest.starts_with(DELIMITER))
}

fn failure_error(failure: &DeleteFailure) -> StoreError {
    StoreError::service(
        failure.code.as_deref().unwrap_or("InternalError"),
        failure.message.as_deref().unwrap_or_default(),
    )
}

impl StorageService {
    pub async fn create_bucket(&self, name: &str) -> Result<()> {
        self.store().create_bucket(name).await?;
        tracing::info!(bucket = name, "Bucket created");
        Ok(())
    }

    /// Delete a bucket. With `recursive`, a non-empty bucket is emptied
    /// first and the delete retried once.
    pub async fn delete_bucket(&self, name: &str, recursive: bool) -> Result<()> {
        let err = match self.store().delete_bucket(name).await {
            Ok(()) => {
                tracing::info!(bucket = name, "Bucket deleted");
                return Ok(());
            }
            Err(err) => err,
        };

        if !(recursive && is_bucket_not_empty(&err)) {
            return Err(map_error(err));
        }

        tracing::info!(bucket = name, "Bucket not empty, deleting its objects first");
        let deleted = self.purge(name, None).await?;

        self.store().delete_bucket(name).await?;
        tracing::info!(bucket = name, objects = deleted, "Bucket deleted recursively");
        Ok(())
    }

    /// Delete an object. Without `recursive`, keys that have children
    /// (`key/...`) are refused; with it, the key and all its children go.
    pub async fn delete_object(&self, bucket: &str, key: &str, recursive: bool) -> Result<()> {
        if key.is_empty() {
            return Err(AppError::bad_request("object key is required"));
        }

        if recursive {
            let deleted = self.purge(bucket, Some(key)).await?;
            tracing::info!(bucket, key, objects = deleted, "Deleted objects recursively");
            return Ok(());
        }

        // A key ending in the delimiter may be its own placeholder object
        let probe_size = if key.ends_with(DELIMITER) { 2 } else { 1 };
        let probe = ListObjectsRequest::new(bucket)
            .with_prefix(directory_prefix(key))
            .with_max_keys(probe_size);
        let children = self.store().list_objects_v2(probe).await.map_err(bucket_error)?;
        if children.contents.iter().any(|child| child.key != key) {
            return Err(AppError::bad_request(DIRECTORY_NOT_EMPTY));
        }

        self.store()
            .delete_object(bucket, key)
            .await
            .map_err(bucket_error)?;
        tracing::info!(bucket, key, "Object deleted");
        Ok(())
    }

    /// Store `body` under `key`, overwriting any existing object.
    ///
    /// The body is read up to the configured limit before anything is sent;
    /// larger bodies fail with `PayloadTooLarge` and nothing is written.
    pub async fn put_object<S, E>(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: S,
    ) -> Result<Object>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if key.is_empty() {
            return Err(AppError::bad_request("object key is required"));
        }

        let body = self.read_body(body).await?;
        let size = body.len() as i64;
        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };

        let output = self
            .store()
            .put_object(PutObjectRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                body,
            })
            .await
            .map_err(bucket_error)?;

        tracing::info!(
            bucket,
            key,
            size,
            e_tag = output.e_tag.as_deref().unwrap_or_default(),
            "Object uploaded"
        );

        // Backends do not reliably echo a timestamp back
        Ok(Object::file(key, Some(size), Some(Utc::now())))
    }

    async fn read_body<S, E>(&self, body: S) -> Result<Bytes>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let limit = self.config().max_upload_bytes;
        let mut body = std::pin::pin!(body);
        let mut buffer = BytesMut::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk
                .map_err(|e| AppError::bad_request("failed to read upload body").with_cause(e))?;
            if (buffer.len() + chunk.len()) as u64 > limit {
                tracing::warn!(limit, "Upload rejected: body exceeds limit");
                return Err(AppError::payload_too_large(format!(
                    "file too large: limit is {} bytes",
                    limit
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer.freeze())
    }

    /// Open an object for download. Every backend failure reads as
    /// "object not found"; the real error is kept as the cause.
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectDownload> {
        let output = self
            .store()
            .get_object(bucket, key)
            .await
            .map_err(|e| AppError::not_found(OBJECT_NOT_FOUND).with_cause(e))?;

        Ok(ObjectDownload {
            body: output.body,
            content_type: output.content_type,
            content_length: output.content_length,
            e_tag: output.e_tag,
            last_modified: output.last_modified,
        })
    }

    /// Presigned GET URL for `key`, valid for `expires_in`
    pub async fn presign_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String> {
        if expires_in < MIN_PRESIGN_EXPIRY || expires_in > MAX_PRESIGN_EXPIRY {
            return Err(AppError::bad_request(format!(
                "invalid expiry value: {}",
                expires_in.as_secs()
            )));
        }

        let url = self
            .store()
            .presign_get_object(bucket, key, expires_in)
            .await?;
        tracing::debug!(bucket, key, expires_in = expires_in.as_secs(), "Presigned URL generated");
        Ok(url)
    }

    /// Delete every object in `bucket`, or only those in `scope`.
    ///
    /// Pages are listed and deleted one after the other; each page becomes
    /// at most one `DeleteObjects` call per batch. Returns the number of
    /// keys deleted.
    async fn purge(&self, bucket: &str, scope: Option<&str>) -> Result<usize> {
        let batch_size = self.config().delete_batch_size;
        let mut request = ListObjectsRequest::new(bucket).with_max_keys(batch_size as i32);
        if let Some(scope) = scope {
            request = request.with_prefix(scope);
        }

        let mut deleted = 0;
        loop {
            let listing = self
                .store()
                .list_objects_v2(request.clone())
                .await
                .map_err(bucket_error)?;

            let keys: Vec<String> = listing
                .contents
                .into_iter()
                .map(|entry| entry.key)
                .filter(|key| scope.map_or(true, |scope| in_scope(key, scope)))
                .collect();

            for batch in keys.chunks(batch_size) {
                let failures = self.store().delete_objects(bucket, batch.to_vec()).await?;
                if let Some(first) = failures.first() {
                    for failure in &failures {
                        tracing::warn!(
                            bucket,
                            key = %failure.key,
                            code = ?failure.code,
                            "Backend refused to delete object"
                        );
                    }
                    let err = failure_error(first);
                    tracing::warn!(bucket, kind = ?classify(&err), deleted, "Recursive delete stopped");
                    return Err(map_error(err));
                }
                deleted += batch.len();
            }

            match listing.next_continuation_token {
                Some(token) => request.continuation_token = Some(token),
                None => break,
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::stream;

    use super::*;
    use crate::error::ErrorKind;
    use crate::service::testing::{seeded_store, RecordingStore};
    use crate::service::{ListBucketsOptions, ServiceConfig};
    use crate::storage::{MemoryStore, ObjectStore};

    fn service_for(store: Arc<RecordingStore>) -> StorageService {
        StorageService::new(store, ServiceConfig::default())
    }

    fn body(data: &'static [u8]) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
        stream::iter(vec![Ok(Bytes::from_static(data))])
    }

    #[test]
    fn test_in_scope() {
        assert!(in_scope("dir", "dir"));
        assert!(in_scope("dir/a.txt", "dir"));
        assert!(in_scope("dir/sub/b.txt", "dir"));
        assert!(!in_scope("dir2/a.txt", "dir"));
        assert!(!in_scope("directory.txt", "dir"));
        assert!(in_scope("dir/a.txt", "dir/"));
        assert!(!in_scope("dir", "dir/"));
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let store = Arc::new(RecordingStore::new(MemoryStore::new()));
        let service = service_for(store);

        service.create_bucket("test-bucket").await.unwrap();
        let page = service
            .list_buckets(10, ListBucketsOptions::default())
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "test-bucket");
        assert!(page.items[0].created_at.is_some());
    }

    #[tokio::test]
    async fn test_create_bucket_errors() {
        let store = seeded_store("test-bucket", &[]).await;
        let service = service_for(store);

        let err = service.create_bucket("test-bucket").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.message(), "Bucket already exists");

        let err = service.create_bucket("Not_Valid").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_delete_non_empty_bucket_without_recursive() {
        let store = seeded_store("test-bucket", &["a.txt"]).await;
        let service = service_for(store.clone());

        let err = service.delete_bucket("test-bucket", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.message(), "Bucket is not empty");
        assert_eq!(store.delete_bucket_calls(), 1);
        assert_eq!(store.inner.object_keys("test-bucket").await, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_recursive_bucket_delete_batches() {
        let keys: Vec<String> = (0..25).map(|i| format!("nested/dir/{:02}.bin", i)).collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let store = seeded_store("test-bucket", &key_refs).await;
        let service = StorageService::new(
            store.clone(),
            ServiceConfig {
                delete_batch_size: 10,
                ..ServiceConfig::default()
            },
        );

        service.delete_bucket("test-bucket", true).await.unwrap();

        assert!(!store.inner.bucket_exists("test-bucket").await);
        assert_eq!(store.delete_batches(), vec![10, 10, 5]);
        assert_eq!(store.delete_bucket_calls(), 2);
    }

    #[tokio::test]
    async fn test_recursive_delete_of_empty_bucket_needs_no_purge() {
        let store = seeded_store("test-bucket", &[]).await;
        let service = service_for(store.clone());

        service.delete_bucket("test-bucket", true).await.unwrap();
        assert!(store.delete_batches().is_empty());
        assert_eq!(store.delete_bucket_calls(), 1);
    }

    #[tokio::test]
    async fn test_recursive_delete_surfaces_rejected_keys() {
        let store = seeded_store("test-bucket", &["a.txt", "b.txt"]).await;
        store.reject_next_delete(vec![DeleteFailure {
            key: "b.txt".to_string(),
            code: Some("AccessDenied".to_string()),
            message: Some("Access Denied".to_string()),
        }]);
        let service = service_for(store.clone());

        let err = service.delete_bucket("test-bucket", true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        // Partial progress stays deleted
        assert_eq!(store.inner.object_keys("test-bucket").await, vec!["b.txt"]);
    }

    #[tokio::test]
    async fn test_delete_missing_bucket() {
        let service = service_for(Arc::new(RecordingStore::new(MemoryStore::new())));

        let err = service.delete_bucket("missing-bucket", true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_object_is_idempotent() {
        let store = seeded_store("test-bucket", &["a.txt"]).await;
        let service = service_for(store.clone());

        service.delete_object("test-bucket", "a.txt", false).await.unwrap();
        service.delete_object("test-bucket", "a.txt", false).await.unwrap();
        assert!(store.inner.object_keys("test-bucket").await.is_empty());
    }

    #[tokio::test]
    async fn test_directory_guard() {
        let store = seeded_store("test-bucket", &["dir", "dir/child"]).await;
        let service = service_for(store.clone());

        let err = service.delete_object("test-bucket", "dir", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.message(), DIRECTORY_NOT_EMPTY);
        assert_eq!(
            store.inner.object_keys("test-bucket").await,
            vec!["dir", "dir/child"]
        );
    }

    #[tokio::test]
    async fn test_empty_directory_placeholder_can_be_deleted() {
        let store = seeded_store("test-bucket", &["dir/"]).await;
        let service = service_for(store.clone());

        service.delete_object("test-bucket", "dir/", false).await.unwrap();
        assert!(store.inner.object_keys("test-bucket").await.is_empty());
    }

    #[tokio::test]
    async fn test_recursive_object_delete_keeps_siblings() {
        let store = seeded_store(
            "test-bucket",
            &["dir", "dir/a.txt", "dir/sub/b.txt", "dir2/c.txt", "dirt.txt"],
        )
        .await;
        let service = service_for(store.clone());

        service.delete_object("test-bucket", "dir", true).await.unwrap();
        assert_eq!(
            store.inner.object_keys("test-bucket").await,
            vec!["dir2/c.txt", "dirt.txt"]
        );
    }

    #[tokio::test]
    async fn test_put_object_returns_metadata() {
        let store = seeded_store("test-bucket", &[]).await;
        let service = service_for(store.clone());

        let object = service
            .put_object("test-bucket", "docs/hello.txt", "text/plain", body(b"hello"))
            .await
            .unwrap();

        assert_eq!(object.key, "docs/hello.txt");
        assert_eq!(object.size, Some(5));
        assert!(!object.is_dir);
        assert!(object.last_modified.is_some());

        let download = service.get_object("test-bucket", "docs/hello.txt").await.unwrap();
        assert_eq!(download.content_type.as_deref(), Some("text/plain"));
        assert!(download.e_tag.is_some());
        assert!(download.last_modified.is_some());
        let data = download.body.collect().await.unwrap().into_bytes();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let store = seeded_store("test-bucket", &[]).await;
        let service = StorageService::new(
            store.clone(),
            ServiceConfig {
                max_upload_bytes: 100,
                ..ServiceConfig::default()
            },
        );

        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from(vec![b'a'; 60])),
            Ok(Bytes::from(vec![b'a'; 60])),
        ]);
        let err = service
            .put_object("test-bucket", "large.txt", "text/plain", chunks)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
        assert_eq!(store.put_calls(), 0);
        assert!(store.inner.object_keys("test-bucket").await.is_empty());
    }

    #[tokio::test]
    async fn test_put_into_missing_bucket() {
        let service = service_for(Arc::new(RecordingStore::new(MemoryStore::new())));

        let err = service
            .put_object("missing-bucket", "a.txt", "", body(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_get_object_masks_backend_errors() {
        let store = seeded_store("test-bucket", &["a.txt"]).await;
        store.fail("get_object", "dispatch failure: connection refused");
        let service = service_for(store);

        let err = service.get_object("test-bucket", "a.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), OBJECT_NOT_FOUND);
        assert!(err.cause().unwrap().to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_presign_expiry_bounds() {
        let store = seeded_store("test-bucket", &["a.txt"]).await;
        let service = service_for(store);

        let url = service
            .presign_get_object("test-bucket", "a.txt", Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(url.contains("a.txt"));

        for expiry in [Duration::ZERO, MAX_PRESIGN_EXPIRY + Duration::from_secs(1)] {
            let err = service
                .presign_get_object("test-bucket", "a.txt", expiry)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest);
        }
    }

    #[tokio::test]
    async fn test_recursive_delete_listing_failure() {
        let store = seeded_store("test-bucket", &["a.txt"]).await;
        store.fail("list_objects_v2", "SlowDown: Please reduce your request rate.");
        let service = service_for(store.clone());

        let err = service.delete_object("test-bucket", "a.txt", true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyRequests);
        assert_eq!(store.inner.object_keys("test-bucket").await, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_object_store_trait_object() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let service = StorageService::new(store, ServiceConfig::default());
        service.create_bucket("abc").await.unwrap();
        service.delete_bucket("abc", false).await.unwrap();
    }
}
