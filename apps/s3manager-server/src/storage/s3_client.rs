//! S3-compatible storage client
//!
//! Wraps the AWS SDK for S3-compatible storage access.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier},
    Client,
};
use chrono::{DateTime, Utc};

use crate::config::StorageConfig;
use crate::error::StoreError;

use super::types::{
    BucketEntry, BucketList, DeleteFailure, GetObjectOutput, ListObjectsRequest, ObjectEntry,
    ObjectList, PutObjectOutput, PutObjectRequest,
};
use super::{ObjectStore, StoreResult};

/// Region S3 treats as the default; buckets there take no location constraint
const DEFAULT_REGION: &str = "us-east-1";

/// S3-compatible storage client
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    region: String,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Client {
    /// Create a new S3 client from configuration
    ///
    /// Static credentials are used when both keys are configured; otherwise
    /// the default AWS credential chain is loaded.
    pub async fn new(config: &StorageConfig) -> Self {
        let builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "s3manager");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
            }
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        let mut builder = builder
            .region(Region::new(config.region.clone()))
            .force_path_style(config.force_path_style); // MinIO and friends need path-style

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        // Test connection by listing buckets
        match client.list_buckets().send().await {
            Ok(_) => {
                tracing::info!(
                    "Connected to S3 endpoint: {}",
                    config.endpoint.as_deref().unwrap_or("default")
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Could not list buckets: {}. Will attempt operations anyway.",
                    DisplayErrorContext(&e)
                );
            }
        }

        Self {
            client,
            region: config.region.clone(),
        }
    }

    fn location_constraint(&self) -> Option<CreateBucketConfiguration> {
        if self.region == DEFAULT_REGION {
            return None;
        }
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build(),
        )
    }
}

/// Convert an SDK failure into a [`StoreError`], keeping the S3 error code
fn store_error<E>(err: SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(service_err) => {
            let inner = service_err.err();
            StoreError::Service {
                code: inner.code().unwrap_or("Unknown").to_string(),
                message: inner.message().unwrap_or_default().to_string(),
                status: Some(service_err.raw().status().as_u16()),
            }
        }
        SdkError::TimeoutError(_) => StoreError::Timeout(DisplayErrorContext(&err).to_string()),
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            StoreError::Timeout(DisplayErrorContext(&err).to_string())
        }
        SdkError::DispatchFailure(failure) if failure.is_io() => {
            StoreError::Connection(DisplayErrorContext(&err).to_string())
        }
        _ => StoreError::Other(DisplayErrorContext(&err).to_string()),
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_objects_v2(&self, request: ListObjectsRequest) -> StoreResult<ObjectList> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .set_prefix(request.prefix)
            .set_delimiter(request.delimiter)
            .set_max_keys(request.max_keys)
            .set_continuation_token(request.continuation_token)
            .send()
            .await
            .map_err(store_error)?;

        let contents = response
            .contents()
            .iter()
            .map(|obj| ObjectEntry {
                key: obj.key().unwrap_or_default().to_string(),
                size: obj.size(),
                last_modified: obj.last_modified().and_then(to_chrono),
            })
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(|s| s.to_string()))
            .collect();

        Ok(ObjectList {
            contents,
            common_prefixes,
            next_continuation_token: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn list_buckets(&self, continuation_token: Option<String>) -> StoreResult<BucketList> {
        let response = self
            .client
            .list_buckets()
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(store_error)?;

        let buckets = response
            .buckets()
            .iter()
            .filter_map(|bucket| {
                bucket.name().map(|name| BucketEntry {
                    name: name.to_string(),
                    creation_date: bucket.creation_date().and_then(to_chrono),
                })
            })
            .collect();

        Ok(BucketList {
            buckets,
            continuation_token: response.continuation_token().map(|s| s.to_string()),
        })
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(self.location_constraint())
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: Vec<String>,
    ) -> StoreResult<Vec<DeleteFailure>> {
        let objects = keys
            .into_iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Other(format!("Failed to build delete request: {}", e)))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StoreError::Other(format!("Failed to build delete request: {}", e)))?;

        let response = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(store_error)?;

        Ok(response
            .errors()
            .iter()
            .map(|e| DeleteFailure {
                key: e.key().unwrap_or_default().to_string(),
                code: e.code().map(|s| s.to_string()),
                message: e.message().map(|s| s.to_string()),
            })
            .collect())
    }

    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutObjectOutput> {
        let content_length = request.body.len() as i64;
        let response = self
            .client
            .put_object()
            .bucket(request.bucket)
            .key(request.key)
            .content_type(request.content_type)
            .content_length(content_length)
            .body(ByteStream::from(request.body))
            .send()
            .await
            .map_err(store_error)?;

        Ok(PutObjectOutput {
            e_tag: response.e_tag().map(|s| s.to_string()),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(store_error)?;

        let content_type = response.content_type().map(|s| s.to_string());
        let content_length = response.content_length();
        let e_tag = response.e_tag().map(|s| s.to_string());
        let last_modified = response.last_modified().and_then(to_chrono);

        Ok(GetObjectOutput {
            body: response.body,
            content_type,
            content_length,
            e_tag,
            last_modified,
        })
    }

    async fn presign_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StoreError::Other(format!("InvalidArgument: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(store_error)?;

        Ok(request.uri().to_string())
    }
}
