//! Categories API endpoints.

use std::collections::HashMap;

use api_types::category::{CategoryListResponse, CategoryView};
use axum::{Json, extract::State};

use crate::{ServerError, server::ServerState};

pub async fn list(State(state): State<ServerState>) -> Result<Json<CategoryListResponse>, ServerError> {
    let categories = state
        .engine
        .categories()
        .await?
        .into_iter()
        .map(|category| CategoryView {
            id: category.id,
            name: category.name,
        })
        .collect();
    Ok(Json(CategoryListResponse { categories }))
}

/// Category names by id, for display labels.
pub(crate) async fn names(state: &ServerState) -> Result<HashMap<i32, String>, ServerError> {
    Ok(state
        .engine
        .categories()
        .await?
        .into_iter()
        .map(|category| (category.id, category.name))
        .collect())
}
