use axum::{extract::State, Extension, Json};
use brandfeed_core::{slugify, BrandDirectory};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct BrandTree {
    tracked: Vec<String>,
    brands: Vec<ParentBrandItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct ParentBrandItem {
    name: String,
    slug: String,
    category: String,
    sub_brands: Vec<SubBrandItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct SubBrandItem {
    name: String,
    slug: String,
    account: String,
    profile_url: String,
    tracked: bool,
}

pub(super) fn brand_tree(directory: &BrandDirectory) -> BrandTree {
    let brands = directory
        .parents()
        .iter()
        .map(|parent| ParentBrandItem {
            name: parent.name.clone(),
            slug: slugify(&parent.name),
            category: parent.category.clone(),
            sub_brands: parent
                .sub_brands
                .iter()
                .map(|sub| SubBrandItem {
                    name: sub.name.clone(),
                    slug: slugify(&sub.name),
                    account: sub.account.clone(),
                    profile_url: format!("https://www.instagram.com/{}/", sub.account),
                    tracked: directory.is_tracked(&sub.name),
                })
                .collect(),
        })
        .collect();

    BrandTree {
        tracked: directory.tracked().to_vec(),
        brands,
    }
}

pub(super) async fn list_brands(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<BrandTree>> {
    Json(ApiResponse {
        data: brand_tree(state.ingestor.directory()),
        meta: ResponseMeta::new(req_id.0),
    })
}
