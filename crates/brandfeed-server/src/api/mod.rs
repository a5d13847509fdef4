mod brands;
mod ingest;
mod posts;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use brandfeed_core::{RunRecord, RunSource, StorageKind};
use brandfeed_pipeline::Ingestor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, require_webhook_secret, AuthState,
    RateLimits, RequestId, RouteClass,
};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    /// `None` when no Apify token is configured.
    pub source: Option<Arc<dyn RunSource>>,
    pub webhook_secret: Option<Arc<str>>,
    pub storage: StorageKind,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    storage: String,
    source_configured: bool,
    last_run: Option<RunRecord>,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "not_configured" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(100).clamp(1, 500)
}

pub(super) fn map_store_error(request_id: String, error: &brandfeed_store::StoreError) -> ApiError {
    tracing::error!(error = %error, "feed storage failed");
    ApiError::new(request_id, "internal_error", "feed storage failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(WEBHOOK_SECRET_HEADER),
        ])
}

fn read_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/posts", get(posts::list_posts))
        .route("/api/v1/brands", get(brands::list_brands))
}

/// Authenticated by the shared secret rather than a bearer token.
fn webhook_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/webhook/apify", post(ingest::apify_webhook))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_webhook_secret,
        ))
}

fn admin_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/refresh", post(ingest::refresh))
        .route(
            "/api/v1/maintenance/purge-samples",
            post(ingest::purge_samples),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState, limits: &RateLimits) -> Router {
    let limited = |router: Router<AppState>, class: RouteClass| {
        router.layer(axum::middleware::from_fn_with_state(
            limits.guard(class),
            enforce_rate_limit,
        ))
    };

    Router::new()
        .route("/api/v1/health", get(health))
        .merge(limited(read_router(), RouteClass::Read))
        .merge(limited(webhook_router(&state), RouteClass::Webhook))
        .merge(limited(admin_router(auth), RouteClass::Admin))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(CompressionLayer::new())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let storage = state.storage.to_string();
    let source_configured = state.source.is_some();

    match state.ingestor.ledger().last_run().await {
        Ok(last_run) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    storage,
                    source_configured,
                    last_run,
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: storage unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        storage,
                        source_configured,
                        last_run: None,
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
