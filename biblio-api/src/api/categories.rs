//! Category endpoints
//!
//! Creation is idempotent on the case-insensitive name; deleting a
//! category never touches the books that referenced it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use biblio_common::models::Category;

use crate::db::categories;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let categories = categories::list_categories(&state.db).await?;
    Ok(Json(categories))
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// POST /api/categories
///
/// Returns the existing category (200) when one with the same name is
/// already present, otherwise creates it (201).
pub async fn create_category(
    State(state): State<AppState>,
    Json(request): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "the category name is required".to_string(),
        ));
    }

    let already_present = categories::find_category_by_name(&state.db, name)
        .await?
        .is_some();

    let category = categories::create_category(
        &state.db,
        name,
        request.description.as_deref().unwrap_or(""),
        request.color.as_deref(),
    )
    .await?;

    let status = if already_present {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(category)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// PUT /api/categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    let category = categories::update_category(
        &state.db,
        id,
        request.name.as_deref(),
        request.description.as_deref(),
        request.color.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("category {} not found", id)))?;

    Ok(Json(category))
}

/// DELETE /api/categories/:id
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !categories::delete_category(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("category {} not found", id)));
    }
    Ok(Json(json!({ "message": "category deleted" })))
}

/// Build category routes
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/categories/:id",
            axum::routing::put(update_category).delete(delete_category),
        )
}
