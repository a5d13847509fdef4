use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Extension, Json,
};
use brandfeed_pipeline::{IngestFailure, IngestOptions, IngestOutcome};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::middleware::RequestId;

use super::{map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Default, Deserialize)]
pub(super) struct RefreshQuery {
    #[serde(default)]
    pub force: bool,
}

/// Push payload: the run's items, optionally tagged with the run id.
#[derive(Debug, Deserialize)]
pub(super) struct WebhookPayload {
    #[serde(rename = "runId", default)]
    pub run_id: Option<String>,
    pub data: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub(super) struct PurgeData {
    removed: usize,
    remaining: usize,
}

type OutcomeResponse = (StatusCode, Json<ApiResponse<IngestOutcome>>);

fn outcome_status(outcome: &IngestOutcome) -> StatusCode {
    match outcome.failure {
        None => StatusCode::OK,
        Some(IngestFailure::SourceUnavailable) => StatusCode::BAD_GATEWAY,
        Some(IngestFailure::NoQualifyingPosts) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(IngestFailure::Persistence) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(req_id: String, outcome: IngestOutcome) -> OutcomeResponse {
    (
        outcome_status(&outcome),
        Json(ApiResponse {
            data: outcome,
            meta: ResponseMeta::new(req_id),
        }),
    )
}

/// Pull the latest successful run from Apify and ingest it.
pub(super) async fn refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RefreshQuery>,
) -> Result<OutcomeResponse, ApiError> {
    let Some(source) = state.source.as_deref() else {
        return Err(ApiError::new(
            req_id.0,
            "not_configured",
            "no upstream data source is configured",
        ));
    };

    tracing::info!(force = query.force, "refresh requested");
    let outcome = state
        .ingestor
        .refresh(source, IngestOptions { force: query.force })
        .await;
    Ok(respond(req_id.0, outcome))
}

/// Ingest items pushed by an Apify webhook. The shared secret has already
/// been checked by the middleware.
///
/// A payload without a `runId` is ingested under a synthetic
/// `webhook-<millis>` id.
pub(super) async fn apify_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<OutcomeResponse, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        ApiError::new(
            req_id.0.clone(),
            "bad_request",
            format!("invalid webhook payload: {}", e.body_text()),
        )
    })?;

    let run_id = payload
        .run_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("webhook-{}", Utc::now().timestamp_millis()));
    tracing::info!(run_id = %run_id, items = payload.data.len(), "webhook received");

    let outcome = state
        .ingestor
        .ingest(&run_id, &payload.data, IngestOptions::default())
        .await;
    Ok(respond(req_id.0, outcome))
}

/// Remove the seeded placeholder posts from the stored feed.
pub(super) async fn purge_samples(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<PurgeData>>, ApiError> {
    let store = state.ingestor.posts();
    let removed = store
        .purge_samples()
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;
    let remaining = store
        .get_all()
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .len();
    tracing::info!(removed, remaining, "sample posts purged");

    Ok(Json(ApiResponse {
        data: PurgeData { removed, remaining },
        meta: ResponseMeta::new(req_id.0),
    }))
}
