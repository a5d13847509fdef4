use axum::{
    extract::{Query, State},
    Extension, Json,
};
use brandfeed_core::CanonicalPost;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_store_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct PostQuery {
    pub brand: Option<String>,
    pub limit: Option<usize>,
}

/// The feed, newest first, optionally narrowed to one brand.
pub(super) async fn list_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PostQuery>,
) -> Result<Json<ApiResponse<Vec<CanonicalPost>>>, ApiError> {
    let store = state.ingestor.posts();
    let posts = match query.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        Some(brand) => store.by_brand(brand).await,
        None => store.get_all().await,
    }
    .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    let data = posts
        .into_iter()
        .take(normalize_limit(query.limit))
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
