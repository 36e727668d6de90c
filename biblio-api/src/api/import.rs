//! Bulk import/export endpoints

use axum::{
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use biblio_common::models::{Book, Location};

use crate::db::books;
use crate::error::{ApiError, ApiResult};
use crate::services::import::{self, ImportBookData, ImportPreview, ImportResult};
use crate::services::spreadsheet;
use crate::AppState;

const EXPORT_FILENAME: &str = "biblioteca_export.xlsx";
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

async fn read_uploaded_file(multipart: &mut Multipart) -> ApiResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("could not read file: {}", e)))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ApiError::BadRequest("no file was provided".to_string()))
}

/// POST /api/import/preview
///
/// Parses the uploaded sheet and classifies every row without saving
/// anything.
pub async fn preview(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ImportPreview>> {
    let bytes = read_uploaded_file(&mut multipart).await?;

    let rows = spreadsheet::parse_import_sheet(&bytes)?;
    if rows.is_empty() {
        return Err(ApiError::BadRequest(
            "the spreadsheet has no data rows".to_string(),
        ));
    }

    tracing::info!(rows = rows.len(), "Previewing import");
    let preview = import::preview_import(&state.db, &rows, state.search.as_ref()).await?;

    Ok(Json(preview))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmItem {
    pub book_data: ImportBookData,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub books: Vec<ConfirmItem>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// POST /api/import/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult<Json<ImportResult>> {
    if request.books.is_empty() {
        return Err(ApiError::BadRequest(
            "there are no books to import".to_string(),
        ));
    }

    let items: Vec<ImportBookData> = request
        .books
        .into_iter()
        .map(|item| item.book_data)
        .collect();
    let location = request.location.unwrap_or_default();

    let result = import::confirm_import(&state.db, &items, location).await?;
    tracing::info!(
        imported = result.imported.len(),
        failed = result.failed.len(),
        "Import confirmed"
    );

    Ok(Json(result))
}

/// GET /api/import/export
///
/// The whole catalog as an xlsx attachment, sorted by title.
pub async fn export(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let catalog = books::list_all_books(&state.db).await?;
    let bytes = spreadsheet::export_books(&catalog)?;

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", EXPORT_FILENAME),
            ),
        ],
        bytes,
    ))
}

/// GET /api/import/pending-images
pub async fn pending_images(State(state): State<AppState>) -> ApiResult<Json<Vec<Book>>> {
    let books = books::list_books_without_cover(&state.db).await?;
    Ok(Json(books))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/import/preview", post(preview))
        .route("/api/import/confirm", post(confirm))
        .route("/api/import/export", get(export))
        .route("/api/import/pending-images", get(pending_images))
}
