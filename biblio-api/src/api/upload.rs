//! Cover and avatar upload endpoints
//!
//! All routes require authentication. Deletion is allowed for the file's
//! owner (read from the filename) or an admin.

use axum::{
    extract::{Multipart, Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::upload::{self, ImageKind, MAX_IMAGE_BYTES};
use crate::AppState;

async fn read_image_field(multipart: &mut Multipart, field_name: &str) -> ApiResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some(field_name) {
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::BadRequest(format!(
                    "could not read file (max {} MB): {}",
                    MAX_IMAGE_BYTES / (1024 * 1024),
                    e
                ))
            })?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ApiError::BadRequest("no file was provided".to_string()))
}

/// POST /api/upload/avatar
pub async fn upload_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let bytes = read_image_field(&mut multipart, "avatar").await?;
    let stored = upload::save_image(
        &state.config.uploads_dir,
        ImageKind::Avatar,
        user.guid,
        &bytes,
    )
    .await?;

    Ok(Json(json!({
        "message": "image uploaded",
        "avatarUrl": stored.public_path,
    })))
}

/// POST /api/upload/cover
pub async fn upload_cover(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let bytes = read_image_field(&mut multipart, "cover").await?;
    let stored = upload::save_image(
        &state.config.uploads_dir,
        ImageKind::Cover,
        user.guid,
        &bytes,
    )
    .await?;

    Ok(Json(json!({
        "message": "cover uploaded",
        "coverUrl": stored.public_path,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CoverFromUrlRequest {
    pub url: String,
}

/// POST /api/upload/cover-from-url
///
/// Downloads a remote cover (typically a source-provided URL) and stores
/// it locally, so the catalog does not depend on third-party image
/// hosting.
pub async fn cover_from_url(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CoverFromUrlRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if request.url.trim().is_empty() {
        return Err(ApiError::BadRequest("a URL is required".to_string()));
    }

    let bytes = state.image_fetcher.download(request.url.trim()).await?;
    let stored = upload::save_image(
        &state.config.uploads_dir,
        ImageKind::Cover,
        user.guid,
        &bytes,
    )
    .await?;

    Ok(Json(json!({
        "message": "cover downloaded and stored",
        "coverUrl": stored.public_path,
        "originalUrl": request.url,
    })))
}

/// DELETE /api/upload/file/:type/:filename
pub async fn delete_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((kind, filename)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let kind = ImageKind::parse(&kind)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown file type {}", kind)))?;

    if !upload::owns_file(&filename, user.guid) && !user.is_admin() {
        return Err(ApiError::Forbidden(
            "you cannot delete this image".to_string(),
        ));
    }

    if !upload::delete_image(&state.config.uploads_dir, kind, &filename).await? {
        return Err(ApiError::NotFound("image not found".to_string()));
    }

    Ok(Json(json!({ "message": "image deleted" })))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/upload/avatar", post(upload_avatar))
        .route("/api/upload/cover", post(upload_cover))
        .route("/api/upload/cover-from-url", post(cover_from_url))
        .route("/api/upload/file/:type/:filename", delete(delete_file))
}
