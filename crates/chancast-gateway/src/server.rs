//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use chancast_core::{ChanCastError, Result};
use chancast_scheduler::AppContext;

use crate::routes;

/// Typed error → HTTP response mapping for every handler.
pub struct ApiError(pub ChanCastError);

impl From<ChanCastError> for ApiError {
    fn from(err: ChanCastError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ChanCastError::NotFound(_) => StatusCode::NOT_FOUND,
            ChanCastError::AlreadyExists(_) | ChanCastError::DuplicateRunning(_) => {
                StatusCode::CONFLICT
            }
            ChanCastError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ChanCastError::CapacityExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            ChanCastError::UnsupportedKind(_) | ChanCastError::InvalidArgument(_) => {
                StatusCode::BAD_REQUEST
            }
            ChanCastError::NotConnected(_) | ChanCastError::AuthorizationFailed(_) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self.0);
        }
        let body = Json(serde_json::json!({ "ok": false, "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Build the Axum router with all routes.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health))
        .route("/api/v1/accounts", post(routes::create_account))
        .route("/api/v1/accounts", get(routes::list_accounts))
        .route("/api/v1/accounts/{id}/connect", post(routes::connect_account))
        .route(
            "/api/v1/accounts/{id}/disconnect",
            post(routes::disconnect_account),
        )
        .route("/api/v1/channels", get(routes::list_channels))
        .route("/api/v1/tasks", post(routes::create_task))
        .route("/api/v1/tasks", get(routes::list_tasks))
        .route("/api/v1/tasks/{id}", get(routes::get_task))
        .route("/api/v1/tasks/{id}", delete(routes::delete_task))
        .route("/api/v1/tasks/{id}/start", post(routes::start_task))
        .route("/api/v1/schedules", post(routes::create_schedule))
        .route("/api/v1/schedules", get(routes::list_schedules))
        .route("/api/v1/schedules/{id}", delete(routes::delete_schedule))
        .route("/api/v1/schedules/{id}/start", post(routes::start_schedule))
        .route("/api/v1/schedules/{id}/stop", post(routes::stop_schedule))
        .route("/api/v1/schedules/{id}/resume", post(routes::resume_schedule))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve until the shutdown future resolves.
pub async fn serve(ctx: Arc<AppContext>, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = format!("{}:{}", ctx.config.gateway.host, ctx.config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChanCastError::Internal(format!("cannot bind {addr}: {e}")))?;
    tracing::info!("🌐 gateway listening on http://{addr}");

    axum::serve(listener, build_router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ChanCastError::Internal(format!("server error: {e}")))
}
