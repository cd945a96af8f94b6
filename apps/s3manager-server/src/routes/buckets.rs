//! Bucket API routes
//!
//! - GET    /api/buckets           list buckets
//! - POST   /api/buckets           create a bucket
//! - GET    /api/buckets/:bucket   list objects under a path
//! - DELETE /api/buckets/:bucket   delete a bucket

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{ensure_delete_allowed, validate};
use crate::error::Result;
use crate::service::{Bucket, ListBucketsOptions, ListObjectsOptions, Object};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListBucketsQuery {
    pub filter: Option<String>,
    pub token: Option<String>,
    pub count: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct BucketListResponse {
    pub buckets: Vec<Bucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBucketRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListObjectsQuery {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub filter: String,
    pub token: Option<String>,
    pub count: Option<i32>,
    pub recursive: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ObjectListResponse {
    pub list: Vec<Object>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    pub recursive: Option<String>,
}

impl DeleteQuery {
    pub fn recursive(&self) -> Result<bool> {
        Ok(validate::flag("recursive", self.recursive.as_deref())?.unwrap_or(false))
    }
}

/// Create the buckets router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_buckets).post(create_bucket))
        .route("/:bucket", get(list_objects).delete(delete_bucket))
}

async fn list_buckets(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListBucketsQuery>, QueryRejection>,
) -> Result<Json<BucketListResponse>> {
    let Query(query) = query?;
    let count = validate::page_size(query.count)?;

    let options = ListBucketsOptions {
        filter: query.filter,
        continuation_token: query.token,
    };
    let page = state.service().list_buckets(count, options).await?;

    Ok(Json(BucketListResponse {
        buckets: page.items,
        next_token: page.next_token,
    }))
}

async fn create_bucket(
    State(state): State<AppState>,
    request: std::result::Result<Json<CreateBucketRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Bucket>)> {
    let Json(request) = request?;
    validate::bucket_name(&request.name)?;

    state.service().create_bucket(&request.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(Bucket {
            name: request.name,
            created_at: None,
        }),
    ))
}

async fn list_objects(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    query: std::result::Result<Query<ListObjectsQuery>, QueryRejection>,
) -> Result<Json<ObjectListResponse>> {
    let Query(query) = query?;
    validate::bucket_name(&bucket)?;
    let count = validate::page_size(query.count)?;
    let recursive = validate::flag("recursive", query.recursive.as_deref())?
        .unwrap_or(state.config().features.list_recursive);

    let options = ListObjectsOptions::new()
        .with_path(query.path)
        .with_filter(query.filter)
        .with_continuation_token(query.token)
        .with_recursive(recursive);
    let page = state.service().list_objects(&bucket, count, options).await?;

    Ok(Json(ObjectListResponse {
        list: page.items,
        next_token: page.next_token,
    }))
}

async fn delete_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    query: std::result::Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<StatusCode> {
    let Query(query) = query?;
    ensure_delete_allowed(&state)?;
    validate::bucket_name(&bucket)?;
    let recursive = query.recursive()?;

    state.service().delete_bucket(&bucket, recursive).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    use crate::routes::tests::test_app;

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_create_bucket_validates_name() {
        let (app, _) = test_app(true).await;

        let response = app
            .oneshot(
                Request::post("/api/buckets")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"ab"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let json = json_body(response).await;
        assert_eq!(json["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (app, _) = test_app(true).await;

        let response = app
            .oneshot(
                Request::post("/api/buckets")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_count_out_of_range() {
        let (app, _) = test_app(true).await;

        for uri in ["/api/buckets?count=0", "/api/buckets?count=1001", "/api/buckets?count=abc"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), 400, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_delete_disabled() {
        let (app, store) = test_app(false).await;

        let response = app
            .oneshot(
                Request::delete("/api/buckets/test-bucket?recursive=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 403);
        assert!(store.bucket_exists("test-bucket").await);
    }

    #[tokio::test]
    async fn test_recursive_listing_flag() {
        let (app, _) = test_app(true).await;

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/buckets/test-bucket?recursive=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let json = json_body(response).await;
        let keys: Vec<&str> = json["list"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["a.txt", "dir1/a.txt", "dir1/b.txt"]);

        let response = app
            .oneshot(
                Request::get("/api/buckets/test-bucket?recursive=maybe")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_delete_accepts_numeric_flag() {
        let (app, store) = test_app(true).await;

        let response = app
            .oneshot(
                Request::delete("/api/buckets/test-bucket?recursive=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 204);
        assert!(!store.bucket_exists("test-bucket").await);
    }

    #[tokio::test]
    async fn test_list_objects_missing_bucket() {
        let (app, _) = test_app(true).await;

        let response = app
            .oneshot(
                Request::get("/api/buckets/missing-bucket")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 404);
        let json = json_body(response).await;
        assert_eq!(json["message"], "bucket not found");
    }
}
