//! Book CRUD and ISBN lookup endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use biblio_common::models::{Book, Location, ReadingStatus, Reviewer};

use crate::auth::AuthUser;
use crate::db::books::{self, BookFilter, BookUpdate};
use crate::error::{ApiError, ApiResult};
use crate::services::ResolvedBook;
use crate::AppState;

/// Strip dashes and whitespace from user-entered ISBNs.
fn clean_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// GET /api/books
pub async fn list_books(
    State(state): State<AppState>,
    Query(filter): Query<BookFilter>,
) -> ApiResult<Json<Vec<Book>>> {
    let books = books::list_books(&state.db, &filter).await?;
    Ok(Json(books))
}

/// GET /api/books/:id
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Book>> {
    let book = books::load_book(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("book {} not found", id)))?;
    Ok(Json(book))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsbnLookupRequest {
    pub isbn: String,
    /// Optional cover override applied before saving (add-by-isbn only)
    #[serde(default)]
    pub cover_image: Option<String>,
}

/// POST /api/books/search-by-isbn
///
/// Resolves metadata without saving anything. An ISBN already in the
/// catalog is rejected up front so the client can tell the user before
/// they pick a cover.
pub async fn search_by_isbn(
    State(state): State<AppState>,
    Json(request): Json<IsbnLookupRequest>,
) -> ApiResult<Json<ResolvedBook>> {
    let isbn = clean_isbn(&request.isbn);
    if isbn.is_empty() {
        return Err(ApiError::BadRequest("a valid ISBN is required".to_string()));
    }

    if books::find_by_isbn(&state.db, &isbn).await?.is_some() {
        return Err(ApiError::Conflict(
            "this book is already in the catalog".to_string(),
        ));
    }

    let book = state.resolver.resolve(&isbn).await?;
    Ok(Json(book))
}

/// POST /api/books/add-by-isbn
pub async fn add_by_isbn(
    State(state): State<AppState>,
    Json(request): Json<IsbnLookupRequest>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let isbn = clean_isbn(&request.isbn);
    if isbn.is_empty() {
        return Err(ApiError::BadRequest("a valid ISBN is required".to_string()));
    }

    if books::find_by_isbn(&state.db, &isbn).await?.is_some() {
        return Err(ApiError::Conflict(
            "this book is already in the catalog".to_string(),
        ));
    }

    let mut resolved = state.resolver.resolve(&isbn).await?;
    if let Some(cover) = request.cover_image {
        resolved.cover_image = cover;
    }

    let book = Book {
        guid: Uuid::new_v4(),
        isbn: resolved.isbn,
        title: resolved.title,
        author: resolved.author,
        publisher: resolved.publisher,
        publish_date: resolved.publish_date,
        description: resolved.description,
        page_count: resolved.page_count,
        language: resolved.language,
        cover_image: resolved.cover_image,
        categories: Vec::new(),
        location: Location::default(),
        custom_location: String::new(),
        genre: resolved.genre,
        reading_status: ReadingStatus::default(),
        added_date: Utc::now(),
    };

    books::insert_book(&state.db, &book).await?;
    let saved = books::load_book(&state.db, book.guid).await?.unwrap_or(book);

    Ok((StatusCode::CREATED, Json(saved)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddManualRequest {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub page_count: Option<i64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub categories: Vec<Uuid>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub custom_location: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
}

/// POST /api/books/add-manual
///
/// Entry without any external lookup. Books with no ISBN get a synthetic
/// `manual-` placeholder so the uniqueness constraint holds.
pub async fn add_manual(
    State(state): State<AppState>,
    Json(request): Json<AddManualRequest>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let title = request.title.trim();
    let author = request.author.trim();
    if title.is_empty() || author.is_empty() {
        return Err(ApiError::BadRequest(
            "title and author are required".to_string(),
        ));
    }

    let isbn = request
        .isbn
        .filter(|isbn| !isbn.trim().is_empty())
        .unwrap_or_else(|| format!("manual-{}", Utc::now().timestamp_millis()));

    let book = Book {
        guid: Uuid::new_v4(),
        isbn,
        title: title.to_string(),
        author: author.to_string(),
        publisher: request.publisher.unwrap_or_default(),
        publish_date: request.publish_date,
        description: request.description.unwrap_or_default(),
        page_count: request.page_count.unwrap_or(0),
        language: request.language.unwrap_or_else(|| "es".to_string()),
        cover_image: request.cover_image.unwrap_or_default(),
        categories: Vec::new(),
        location: request.location.unwrap_or_default(),
        custom_location: request.custom_location.unwrap_or_default(),
        genre: request.genre.unwrap_or_default(),
        reading_status: ReadingStatus::default(),
        added_date: Utc::now(),
    };

    books::insert_book(&state.db, &book).await?;
    if !request.categories.is_empty() {
        books::set_book_categories(&state.db, book.guid, &request.categories).await?;
    }

    let saved = books::load_book(&state.db, book.guid).await?.unwrap_or(book);
    Ok((StatusCode::CREATED, Json(saved)))
}

#[derive(Debug, Deserialize)]
pub struct ExternalSearchRequest {
    pub query: String,
}

/// POST /api/books/search-external
pub async fn search_external(
    State(state): State<AppState>,
    Json(request): Json<ExternalSearchRequest>,
) -> ApiResult<Json<Vec<ResolvedBook>>> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("a search query is required".to_string()));
    }

    let results = state
        .search
        .search(request.query.trim())
        .await
        .map_err(|e| ApiError::Internal(format!("external search failed: {}", e)))?;

    Ok(Json(results))
}

/// PUT /api/books/:id
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<BookUpdate>,
) -> ApiResult<Json<Book>> {
    let book = books::update_book(&state.db, id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("book {} not found", id)))?;
    Ok(Json(book))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingStatusRequest {
    /// Reviewer key, "adaly" or "sebastian"
    pub person: String,
    pub read: bool,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub review_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub goodreads_url: Option<String>,
}

/// PUT /api/books/:id/reading-status
///
/// Non-admin accounts may only touch the entry their `review_key` names.
/// When marking read without an explicit date, the review date defaults
/// to now; unmarking clears it.
pub async fn update_reading_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ReadingStatusRequest>,
) -> ApiResult<Json<Book>> {
    let reviewer = Reviewer::parse(&request.person)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown reviewer {}", request.person)))?;

    if !user.can_edit_reading_status(reviewer) {
        return Err(ApiError::Forbidden(
            "you cannot modify another user's review".to_string(),
        ));
    }

    if let Some(rating) = request.rating {
        if !(0..=10).contains(&rating) {
            return Err(ApiError::BadRequest(
                "rating must be between 0 and 10".to_string(),
            ));
        }
    }

    let mut book = books::load_book(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("book {} not found", id)))?;

    let entry = book.reading_status.entry_mut(reviewer);
    entry.read = request.read;
    if let Some(rating) = request.rating {
        entry.rating = rating;
    }
    if let Some(review) = request.review {
        entry.review = review;
    }
    if let Some(url) = request.goodreads_url {
        entry.goodreads_url = url;
    }
    entry.review_date = match request.review_date {
        Some(date) => Some(date),
        None if request.read => Some(Utc::now()),
        None => None,
    };

    books::update_reading_status(&state.db, id, &book.reading_status).await?;

    Ok(Json(book))
}

/// DELETE /api/books/:id
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !books::delete_book(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("book {} not found", id)));
    }
    Ok(Json(json!({ "message": "book deleted" })))
}

/// Build book routes
pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/api/books", get(list_books))
        .route("/api/books/search-by-isbn", post(search_by_isbn))
        .route("/api/books/add-by-isbn", post(add_by_isbn))
        .route("/api/books/add-manual", post(add_manual))
        .route("/api/books/search-external", post(search_external))
        .route(
            "/api/books/:id",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/api/books/:id/reading-status", put(update_reading_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isbn_cleaning_strips_dashes_and_spaces() {
        assert_eq!(clean_isbn("978-956-1234-56-7"), "9789561234567");
        assert_eq!(clean_isbn(" 978 0261 103344 "), "9780261103344");
        assert_eq!(clean_isbn("- -"), "");
    }
}
