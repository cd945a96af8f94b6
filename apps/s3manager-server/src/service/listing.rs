//! Listing and pagination
//!
//! Object listings delegate pagination to the backend's continuation tokens.
//! Bucket listings are paginated here: many S3-compatible backends ignore
//! prefix and pagination parameters on `ListBuckets`, so the full list is
//! fetched, filtered, and sliced with a decimal start index as the token.

use crate::classify::{is_no_such_bucket, map_error};
use crate::error::{AppError, Result, StoreError};
use crate::storage::{BucketEntry, ListObjectsRequest, MAX_LIST_KEYS};

use super::{
    directory_prefix, Bucket, ListBucketsOptions, ListObjectsOptions, Object, Page,
    StorageService, DELIMITER,
};

pub(crate) const BUCKET_NOT_FOUND: &str = "bucket not found";

/// Map a backend error, naming a missing bucket explicitly
pub(super) fn bucket_error(err: StoreError) -> AppError {
    if is_no_such_bucket(&err) {
        AppError::not_found(BUCKET_NOT_FOUND).with_cause(err)
    } else {
        map_error(err)
    }
}

/// Key relative to `path_prefix`; keys outside it are returned unchanged
fn relative_key<'a>(key: &'a str, path_prefix: &str) -> &'a str {
    key.strip_prefix(path_prefix).unwrap_or(key)
}

/// Directory name for a common prefix: relative, without the trailing delimiter
fn directory_key<'a>(common_prefix: &'a str, path_prefix: &str) -> &'a str {
    let key = relative_key(common_prefix, path_prefix);
    key.strip_suffix(DELIMITER).unwrap_or(key)
}

/// Decode a bucket page token; anything unreadable restarts from the top
fn decode_start(token: Option<&str>) -> usize {
    token
        .and_then(|t| t.trim().parse::<usize>().ok())
        .unwrap_or(0)
}

impl StorageService {
    /// List one page of objects and directories under `options.path`.
    ///
    /// Directories come first, then files, each in backend order.
    pub async fn list_objects(
        &self,
        bucket: &str,
        max_keys: i32,
        options: ListObjectsOptions,
    ) -> Result<Page<Object>> {
        if max_keys < 1 {
            return Err(AppError::bad_request("count must be at least 1"));
        }

        let path_prefix = directory_prefix(&options.path);
        let prefix = format!("{}{}", path_prefix, options.filter);

        let mut request = ListObjectsRequest::new(bucket)
            .with_max_keys(max_keys.min(MAX_LIST_KEYS))
            .with_continuation_token(options.continuation_token);
        if !options.recursive {
            request = request.with_delimiter(DELIMITER);
        }
        if !prefix.is_empty() {
            request = request.with_prefix(prefix);
        }

        let listing = self
            .store()
            .list_objects_v2(request)
            .await
            .map_err(bucket_error)?;

        let mut items = Vec::with_capacity(listing.common_prefixes.len() + listing.contents.len());
        items.extend(
            listing
                .common_prefixes
                .iter()
                .map(|p| Object::directory(directory_key(p, &path_prefix))),
        );
        items.extend(listing.contents.into_iter().map(|entry| {
            let key = relative_key(&entry.key, &path_prefix);
            // Recursive listings surface directory placeholders as plain keys
            if options.recursive && key.ends_with(DELIMITER) {
                return Object::directory(directory_key(&entry.key, &path_prefix));
            }
            Object::file(key, entry.size, entry.last_modified)
        }));

        tracing::debug!(
            bucket,
            path = %path_prefix,
            recursive = options.recursive,
            count = items.len(),
            more = listing.next_continuation_token.is_some(),
            "Listed objects"
        );

        Ok(Page {
            items,
            next_token: listing.next_continuation_token,
        })
    }

    /// List one page of buckets whose names start with `options.filter`.
    pub async fn list_buckets(&self, count: i32, options: ListBucketsOptions) -> Result<Page<Bucket>> {
        let count = usize::try_from(count)
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| AppError::bad_request("count must be at least 1"))?;

        let mut buckets = self.fetch_all_buckets().await?;

        if let Some(filter) = options.filter.as_deref().filter(|f| !f.is_empty()) {
            buckets.retain(|b| b.name.starts_with(filter));
        }

        let total = buckets.len();
        let start = decode_start(options.continuation_token.as_deref()).min(total);
        let end = start.saturating_add(count).min(total);
        let next_token = (end < total).then(|| end.to_string());

        let items = buckets
            .drain(start..end)
            .map(|entry| Bucket {
                name: entry.name,
                created_at: entry.creation_date,
            })
            .collect();

        Ok(Page { items, next_token })
    }

    /// Every bucket the backend reports, following its own pagination
    async fn fetch_all_buckets(&self) -> Result<Vec<BucketEntry>> {
        let mut all_buckets = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self.store().list_buckets(continuation_token.clone()).await?;
            all_buckets.extend(page.buckets);

            match page.continuation_token {
                // A backend echoing the same token back would loop forever
                Some(next) if continuation_token.as_deref() != Some(next.as_str()) => {
                    continuation_token = Some(next);
                }
                _ => break,
            }
        }

        Ok(all_buckets)
    }
}
