//! Route modules for S3 Manager Server

pub mod buckets;
pub mod health;
pub mod objects;
pub mod validate;

use axum::{error_handling::HandleErrorLayer, BoxError, Router};
use tower::timeout::error::Elapsed;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, ErrorKind, Result};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let timeout = state.config().request_timeout();

    Router::new()
        .nest("/health", health::router())
        .nest("/api/buckets", buckets::router().merge(objects::router()))
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(timeout),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn route_not_found() -> AppError {
    AppError::not_found("route not found")
}

/// Render failures raised by the middleware stack itself
async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<Elapsed>() {
        tracing::warn!("Request exceeded the configured timeout");
        AppError::new(ErrorKind::GatewayTimeout, "request timed out")
    } else {
        AppError::internal("request failed").with_cause(err)
    }
}

fn ensure_delete_allowed(state: &AppState) -> Result<()> {
    if state.config().features.allow_delete {
        Ok(())
    } else {
        Err(AppError::forbidden("deleting is disabled"))
    }
}
