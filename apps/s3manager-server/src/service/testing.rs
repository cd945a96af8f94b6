//! Test double that records backend traffic and injects failures

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;
use crate::storage::{
    BucketList, DeleteFailure, GetObjectOutput, ListObjectsRequest, MemoryStore, ObjectList,
    ObjectStore, PutObjectOutput, PutObjectRequest, StoreResult,
};

/// Wraps a [`MemoryStore`], counting calls and failing on demand
pub(crate) struct RecordingStore {
    pub inner: MemoryStore,
    list_calls: AtomicUsize,
    put_calls: AtomicUsize,
    delete_bucket_calls: AtomicUsize,
    delete_batches: Mutex<Vec<usize>>,
    failures: Mutex<HashMap<&'static str, String>>,
    stalls: Mutex<HashMap<&'static str, Duration>>,
    delete_failures: Mutex<Vec<DeleteFailure>>,
}

impl RecordingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            list_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
            delete_bucket_calls: AtomicUsize::new(0),
            delete_batches: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            stalls: Mutex::new(HashMap::new()),
            delete_failures: Mutex::new(Vec::new()),
        }
    }

    /// Make every later call to `operation` fail with `message`
    pub fn fail(&self, operation: &'static str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, message.to_string());
    }

    /// Make every later call to `operation` sleep for `delay` first
    pub fn stall(&self, operation: &'static str, delay: Duration) {
        self.stalls.lock().unwrap().insert(operation, delay);
    }

    /// Report `failures` from the next `delete_objects` call
    pub fn reject_next_delete(&self, failures: Vec<DeleteFailure>) {
        *self.delete_failures.lock().unwrap() = failures;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_bucket_calls(&self) -> usize {
        self.delete_bucket_calls.load(Ordering::SeqCst)
    }

    pub fn delete_batches(&self) -> Vec<usize> {
        self.delete_batches.lock().unwrap().clone()
    }

    async fn pause(&self, operation: &'static str) {
        let delay = self.stalls.lock().unwrap().get(operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, operation: &'static str) -> StoreResult<()> {
        match self.failures.lock().unwrap().get(operation) {
            Some(message) => Err(StoreError::Other(message.clone())),
            None => Ok(()),
        }
    }
}

/// A recording store holding `bucket` with `keys`, each containing `b"data"`
pub(crate) async fn seeded_store(bucket: &str, keys: &[&str]) -> Arc<RecordingStore> {
    let memory = MemoryStore::new();
    memory.create_bucket(bucket).await.unwrap();
    for key in keys {
        memory
            .put_object(PutObjectRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: "text/plain".to_string(),
                body: Bytes::from_static(b"data"),
            })
            .await
            .unwrap();
    }
    Arc::new(RecordingStore::new(memory))
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn list_objects_v2(&self, request: ListObjectsRequest) -> StoreResult<ObjectList> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.pause("list_objects_v2").await;
        self.check("list_objects_v2")?;
        self.inner.list_objects_v2(request).await
    }

    async fn list_buckets(&self, continuation_token: Option<String>) -> StoreResult<BucketList> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.pause("list_buckets").await;
        self.check("list_buckets")?;
        self.inner.list_buckets(continuation_token).await
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.pause("create_bucket").await;
        self.check("create_bucket")?;
        self.inner.create_bucket(bucket).await
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.delete_bucket_calls.fetch_add(1, Ordering::SeqCst);
        self.pause("delete_bucket").await;
        self.check("delete_bucket")?;
        self.inner.delete_bucket(bucket).await
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: Vec<String>,
    ) -> StoreResult<Vec<DeleteFailure>> {
        self.delete_batches.lock().unwrap().push(keys.len());
        self.pause("delete_objects").await;
        self.check("delete_objects")?;

        let rejected = std::mem::take(&mut *self.delete_failures.lock().unwrap());
        let keys = keys
            .into_iter()
            .filter(|key| !rejected.iter().any(|f| &f.key == key))
            .collect();
        self.inner.delete_objects(bucket, keys).await?;
        Ok(rejected)
    }

    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutObjectOutput> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.pause("put_object").await;
        self.check("put_object")?;
        self.inner.put_object(request).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.pause("delete_object").await;
        self.check("delete_object")?;
        self.inner.delete_object(bucket, key).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput> {
        self.pause("get_object").await;
        self.check("get_object")?;
        self.inner.get_object(bucket, key).await
    }

    async fn presign_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        self.pause("presign_get_object").await;
        self.check("presign_get_object")?;
        self.inner.presign_get_object(bucket, key, expires_in).await
    }
}
