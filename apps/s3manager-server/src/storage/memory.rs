//! In-process object store
//!
//! Follows S3 semantics closely enough to stand in for a real backend:
//! error codes, delimiter grouping, start-after continuation tokens,
//! quiet batch deletes and idempotent single deletes.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

use super::types::{
    BucketEntry, BucketList, ByteStream, DeleteFailure, GetObjectOutput, ListObjectsRequest,
    ObjectEntry, ObjectList, PutObjectOutput, PutObjectRequest, MAX_LIST_KEYS,
};
use super::{ObjectStore, StoreResult};

const DEFAULT_BUCKET_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    e_tag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct MemoryBucket {
    created_at: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

/// Thread-safe in-memory [`ObjectStore`]
#[derive(Debug, Clone)]
pub struct MemoryStore {
    buckets: Arc<RwLock<BTreeMap<String, MemoryBucket>>>,
    bucket_page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(RwLock::new(BTreeMap::new())),
            bucket_page_size: DEFAULT_BUCKET_PAGE_SIZE,
        }
    }

    /// Paginate `ListBuckets` responses in pages of `size`
    pub fn with_bucket_page_size(mut self, size: usize) -> Self {
        self.bucket_page_size = size.max(1);
        self
    }

    /// All keys stored in `bucket`, in key order
    pub async fn object_keys(&self, bucket: &str) -> Vec<String> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn bucket_exists(&self, bucket: &str) -> bool {
        self.buckets.read().await.contains_key(bucket)
    }
}

fn no_such_bucket(bucket: &str) -> StoreError {
    StoreError::service(
        "NoSuchBucket",
        format!("The specified bucket does not exist: {}", bucket),
    )
}

fn no_such_key(key: &str) -> StoreError {
    StoreError::service(
        "NoSuchKey",
        format!("The specified key does not exist: {}", key),
    )
}

fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    (3..=63).contains(&bytes.len())
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-' || *b == b'.')
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
}

/// Whether `key` was already covered by the page that ended at `token`
fn already_listed(key: &str, token: &str, delimiter: Option<&str>) -> bool {
    if key <= token {
        return true;
    }
    // A token that is a common prefix covers every key below it
    matches!(delimiter, Some(d) if token.ends_with(d) && key.starts_with(token))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects_v2(&self, request: ListObjectsRequest) -> StoreResult<ObjectList> {
        let buckets = self.buckets.read().await;
        let bucket = buckets
            .get(&request.bucket)
            .ok_or_else(|| no_such_bucket(&request.bucket))?;

        let prefix = request.prefix.as_deref().unwrap_or("");
        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
        let max_keys = request.max_keys.unwrap_or(MAX_LIST_KEYS).clamp(0, MAX_LIST_KEYS) as usize;
        let token = request.continuation_token.as_deref();

        let mut list = ObjectList::default();
        let mut last_emitted: Option<String> = None;
        let mut truncated = false;

        let candidates = bucket
            .objects
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| !token.is_some_and(|t| already_listed(key, t, delimiter)));

        for (key, object) in candidates {
            let common_prefix = delimiter.and_then(|d| {
                key[prefix.len()..]
                    .find(d)
                    .map(|idx| &key[..prefix.len() + idx + d.len()])
            });

            if let Some(common_prefix) = common_prefix {
                if list.common_prefixes.last().map(String::as_str) == Some(common_prefix) {
                    continue;
                }
            }

            if list.contents.len() + list.common_prefixes.len() >= max_keys {
                truncated = true;
                break;
            }

            match common_prefix {
                Some(common_prefix) => {
                    list.common_prefixes.push(common_prefix.to_string());
                    last_emitted = Some(common_prefix.to_string());
                }
                None => {
                    list.contents.push(ObjectEntry {
                        key: key.clone(),
                        size: Some(object.data.len() as i64),
                        last_modified: Some(object.last_modified),
                    });
                    last_emitted = Some(key.clone());
                }
            }
        }

        if truncated {
            list.next_continuation_token = last_emitted;
        }
        Ok(list)
    }

    async fn list_buckets(&self, continuation_token: Option<String>) -> StoreResult<BucketList> {
        let buckets = self.buckets.read().await;
        let lower = match continuation_token.as_deref() {
            Some(token) => Bound::Excluded(token),
            None => Bound::Unbounded,
        };

        let mut remaining = buckets.range::<str, _>((lower, Bound::Unbounded));
        let page: Vec<BucketEntry> = remaining
            .by_ref()
            .take(self.bucket_page_size)
            .map(|(name, bucket)| BucketEntry {
                name: name.clone(),
                creation_date: Some(bucket.created_at),
            })
            .collect();

        let continuation_token = match (remaining.next(), page.last()) {
            (Some(_), Some(last)) => Some(last.name.clone()),
            _ => None,
        };

        Ok(BucketList {
            buckets: page,
            continuation_token,
        })
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        if !is_valid_bucket_name(bucket) {
            return Err(StoreError::service(
                "InvalidBucketName",
                format!("The specified bucket is not valid: {}", bucket),
            ));
        }

        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(bucket) {
            return Err(StoreError::service(
                "BucketAlreadyOwnedByYou",
                "Your previous request to create the named bucket succeeded and you already own it.",
            ));
        }

        buckets.insert(
            bucket.to_string(),
            MemoryBucket {
                created_at: Utc::now(),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.write().await;
        let existing = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        if !existing.objects.is_empty() {
            return Err(StoreError::service(
                "BucketNotEmpty",
                "The bucket you tried to delete is not empty",
            ));
        }
        buckets.remove(bucket);
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: Vec<String>,
    ) -> StoreResult<Vec<DeleteFailure>> {
        let mut buckets = self.buckets.write().await;
        let existing = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        for key in &keys {
            existing.objects.remove(key);
        }
        Ok(Vec::new())
    }

    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutObjectOutput> {
        let mut buckets = self.buckets.write().await;
        let existing = buckets
            .get_mut(&request.bucket)
            .ok_or_else(|| no_such_bucket(&request.bucket))?;

        let e_tag = format!("\"{}\"", Uuid::new_v4().simple());
        existing.objects.insert(
            request.key,
            StoredObject {
                data: request.body,
                content_type: request.content_type,
                e_tag: e_tag.clone(),
                last_modified: Utc::now(),
            },
        );

        Ok(PutObjectOutput { e_tag: Some(e_tag) })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.write().await;
        let existing = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        existing.objects.remove(key);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput> {
        let buckets = self.buckets.read().await;
        let existing = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        let object = existing.objects.get(key).ok_or_else(|| no_such_key(key))?;

        Ok(GetObjectOutput {
            body: ByteStream::from(object.data.clone()),
            content_type: Some(object.content_type.clone()),
            content_length: Some(object.data.len() as i64),
            e_tag: Some(object.e_tag.clone()),
            last_modified: Some(object.last_modified),
        })
    }

    async fn presign_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        if !self.bucket_exists(bucket).await {
            return Err(no_such_bucket(bucket));
        }
        Ok(format!(
            "memory://{}/{}?X-Amz-Expires={}",
            bucket,
            urlencoding::encode(key),
            expires_in.as_secs()
        ))
    }
}
