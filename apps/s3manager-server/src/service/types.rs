//! Domain types returned by the storage service

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::ByteStream;

/// A bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// An object, or a directory synthesized from a common prefix.
///
/// Directories never carry a size or timestamp; a real zero-byte object has
/// `size: Some(0)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Object {
    pub key: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Object {
    pub fn directory(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_dir: true,
            size: None,
            last_modified: None,
        }
    }

    pub fn file(
        key: impl Into<String>,
        size: Option<i64>,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            key: key.into(),
            is_dir: false,
            size,
            last_modified,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Present iff more entries exist under the same filter
    pub next_token: Option<String>,
}

/// Options for listing objects
#[derive(Debug, Clone, Default)]
pub struct ListObjectsOptions {
    /// Directory being browsed; stripped from returned keys
    pub path: String,
    /// Key prefix applied below `path`
    pub filter: String,
    pub continuation_token: Option<String>,
    /// List every key below `path` instead of one directory level
    pub recursive: bool,
}

impl ListObjectsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// Options for listing buckets
#[derive(Debug, Clone, Default)]
pub struct ListBucketsOptions {
    /// Bucket name prefix
    pub filter: Option<String>,
    pub continuation_token: Option<String>,
}

/// A downloadable object body.
///
/// The body is read lazily; dropping it releases the backend connection.
#[derive(Debug)]
pub struct ObjectDownload {
    pub body: ByteStream,
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
    pub e_tag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}
