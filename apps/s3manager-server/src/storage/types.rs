//! Storage types
//!
//! Request and response shapes exchanged with an [`ObjectStore`](super::ObjectStore).
//! They mirror the S3 wire operations closely; the service layer turns them
//! into the domain model.

use bytes::Bytes;
use chrono::{DateTime, Utc};

pub use aws_sdk_s3::primitives::ByteStream;

/// Largest number of keys a single `DeleteObjects` call may carry.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Largest `max-keys` value S3 honours for `ListObjectsV2`.
pub const MAX_LIST_KEYS: i32 = 1000;

/// A bucket as reported by `ListBuckets`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEntry {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// One page of `ListBuckets`
#[derive(Debug, Clone, Default)]
pub struct BucketList {
    pub buckets: Vec<BucketEntry>,
    /// Token for the next page, if the backend paginates bucket listings
    pub continuation_token: Option<String>,
}

/// A stored object as reported by `ListObjectsV2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: Option<i64>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Parameters for `ListObjectsV2`
#[derive(Debug, Clone, Default)]
pub struct ListObjectsRequest {
    pub bucket: String,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub max_keys: Option<i32>,
    pub continuation_token: Option<String>,
}

impl ListObjectsRequest {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_max_keys(mut self, max_keys: i32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

/// One page of `ListObjectsV2`
#[derive(Debug, Clone, Default)]
pub struct ObjectList {
    pub contents: Vec<ObjectEntry>,
    pub common_prefixes: Vec<String>,
    pub next_continuation_token: Option<String>,
}

/// Parameters for `PutObject`
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Result of `PutObject`
#[derive(Debug, Clone, Default)]
pub struct PutObjectOutput {
    pub e_tag: Option<String>,
}

/// A key the backend refused to delete in a quiet `DeleteObjects` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Result of `GetObject`
#[derive(Debug)]
pub struct GetObjectOutput {
    pub body: ByteStream,
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
    pub e_tag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}
