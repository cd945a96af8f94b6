//! Object API routes
//!
//! - PUT    /api/buckets/:bucket/objects         multipart upload
//! - GET    /api/buckets/:bucket/objects/*key    download
//! - DELETE /api/buckets/:bucket/objects/*key    delete
//! - GET    /api/buckets/:bucket/presign/*key    presigned download URL

use std::time::Duration;

use axum::{
    body::Body,
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, DefaultBodyLimit, Multipart,
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::Response,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::buckets::DeleteQuery;
use super::{ensure_delete_allowed, validate};
use crate::error::{AppError, Result};
use crate::service::{Object, DELIMITER};
use crate::state::AppState;

const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;

/// RFC 7231 IMF-fixdate
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Multipart part carrying the upload
const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub key: Option<String>,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct PresignQuery {
    pub expiry: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PresignResponse {
    pub url: String,
}

/// Create the objects router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/:bucket/objects",
            // Upload size is enforced while streaming
            put(upload_object).layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/:bucket/objects/*key",
            get(download_object).delete(delete_object),
        )
        .route("/:bucket/presign/*key", get(presign_object))
}

/// Key for an upload that did not name one: the file name under `path`
fn upload_key(path: &str, file_name: &str) -> String {
    let path = path.trim_start_matches(DELIMITER);
    if path.is_empty() || path.ends_with(DELIMITER) {
        format!("{}{}", path, file_name)
    } else {
        format!("{}{}{}", path, DELIMITER, file_name)
    }
}

fn content_disposition(key: &str, attachment: bool) -> String {
    let file_name = key.rsplit(DELIMITER).next().unwrap_or(key);
    let disposition = if attachment { "attachment" } else { "inline" };
    format!(
        "{}; filename*=UTF-8''{}",
        disposition,
        urlencoding::encode(file_name)
    )
}

async fn upload_object(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    query: std::result::Result<Query<UploadQuery>, QueryRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Object>)> {
    let Query(query) = query?;
    let mut multipart = multipart?;
    validate::bucket_name(&bucket)?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let key = match (query.key.as_deref(), field.file_name()) {
            (Some(key), _) => key.to_string(),
            (None, Some(file_name)) if !file_name.is_empty() => upload_key(&query.path, file_name),
            _ => return Err(AppError::bad_request("object key is required")),
        };
        validate::object_key(&key)?;

        let content_type = field.content_type().unwrap_or_default().to_string();
        let object = state
            .service()
            .put_object(&bucket, &key, &content_type, field)
            .await?;

        return Ok((StatusCode::CREATED, Json(object)));
    }

    Err(AppError::bad_request(format!(
        "missing multipart field '{}'",
        FILE_FIELD
    )))
}

async fn download_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response> {
    validate::bucket_name(&bucket)?;
    validate::object_key(&key)?;

    let download = state.service().get_object(&bucket, &key).await?;

    // Chunks are forwarded as the backend produces them
    let stream = futures::stream::unfold(download.body, |mut body| async move {
        body.next().await.map(|chunk| (chunk, body))
    });

    let content_type = download
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&key, state.config().features.force_download),
        );
    if let Some(length) = download.content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }
    if let Some(e_tag) = download.e_tag {
        response = response.header(header::ETAG, e_tag);
    }
    if let Some(modified) = download.last_modified {
        response = response.header(
            header::LAST_MODIFIED,
            modified.format(HTTP_DATE_FORMAT).to_string(),
        );
    }

    response
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::internal("failed to build response").with_cause(e))
}

async fn delete_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    query: std::result::Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<StatusCode> {
    let Query(query) = query?;
    ensure_delete_allowed(&state)?;
    validate::bucket_name(&bucket)?;
    validate::object_key(&key)?;
    let recursive = query.recursive()?;

    state
        .service()
        .delete_object(&bucket, &key, recursive)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn presign_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    query: std::result::Result<Query<PresignQuery>, QueryRejection>,
) -> Result<Json<PresignResponse>> {
    let Query(query) = query?;
    validate::bucket_name(&bucket)?;
    validate::object_key(&key)?;

    let expiry = Duration::from_secs(query.expiry.unwrap_or(DEFAULT_PRESIGN_EXPIRY_SECS));
    let url = state
        .service()
        .presign_get_object(&bucket, &key, expiry)
        .await?;

    Ok(Json(PresignResponse { url }))
}
