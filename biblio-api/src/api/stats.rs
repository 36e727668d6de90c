//! Reading statistics endpoints
//!
//! The catalog is small (hundreds of books), so the aggregations load the
//! relevant books and count in memory instead of pushing JSON extraction
//! into SQL.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

use biblio_common::models::Book;

use crate::db::books;
use crate::error::ApiResult;
use crate::AppState;

const MONTH_LABELS: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_books: usize,
    pub adaly_read: usize,
    pub sebastian_read: usize,
    pub both_read: usize,
    pub unread_by_adaly: usize,
    pub unread_by_sebastian: usize,
}

fn overview_from_books(books: &[Book]) -> OverviewStats {
    let adaly_read = books.iter().filter(|b| b.reading_status.adaly.read).count();
    let sebastian_read = books
        .iter()
        .filter(|b| b.reading_status.sebastian.read)
        .count();
    let both_read = books
        .iter()
        .filter(|b| b.reading_status.adaly.read && b.reading_status.sebastian.read)
        .count();

    OverviewStats {
        total_books: books.len(),
        adaly_read,
        sebastian_read,
        both_read,
        unread_by_adaly: books.len() - adaly_read,
        unread_by_sebastian: books.len() - sebastian_read,
    }
}

/// GET /api/stats/overview
pub async fn overview(State(state): State<AppState>) -> ApiResult<Json<OverviewStats>> {
    let books = books::list_all_books(&state.db).await?;
    Ok(Json(overview_from_books(&books)))
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStats {
    pub months: Vec<&'static str>,
    pub adaly_data: Vec<usize>,
    pub sebastian_data: Vec<usize>,
}

fn monthly_from_books(books: &[Book], year: i32) -> MonthlyStats {
    let mut adaly_data = vec![0usize; 12];
    let mut sebastian_data = vec![0usize; 12];

    for book in books {
        let adaly = &book.reading_status.adaly;
        if adaly.read {
            if let Some(date) = adaly.review_date {
                if date.year() == year {
                    adaly_data[date.month0() as usize] += 1;
                }
            }
        }
        let sebastian = &book.reading_status.sebastian;
        if sebastian.read {
            if let Some(date) = sebastian.review_date {
                if date.year() == year {
                    sebastian_data[date.month0() as usize] += 1;
                }
            }
        }
    }

    MonthlyStats {
        months: MONTH_LABELS.to_vec(),
        adaly_data,
        sebastian_data,
    }
}

/// GET /api/stats/reading-by-month?year=2025
pub async fn reading_by_month(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> ApiResult<Json<MonthlyStats>> {
    let year = query.year.unwrap_or_else(|| chrono::Utc::now().year());
    let books = books::list_all_books(&state.db).await?;
    Ok(Json(monthly_from_books(&books, year)))
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub total: usize,
    pub adaly_read: usize,
    pub sebastian_read: usize,
    pub both_read: usize,
}

fn accumulate(stats: &mut GroupStats, book: &Book) {
    stats.total += 1;
    let adaly = book.reading_status.adaly.read;
    let sebastian = book.reading_status.sebastian.read;
    if adaly {
        stats.adaly_read += 1;
    }
    if sebastian {
        stats.sebastian_read += 1;
    }
    if adaly && sebastian {
        stats.both_read += 1;
    }
}

fn by_category_from_books(books: &[Book]) -> BTreeMap<String, GroupStats> {
    let mut stats: BTreeMap<String, GroupStats> = BTreeMap::new();
    for book in books {
        for category in &book.categories {
            accumulate(stats.entry(category.name.clone()).or_default(), book);
        }
    }
    stats
}

/// GET /api/stats/by-category
pub async fn by_category(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, GroupStats>>> {
    let books = books::list_all_books(&state.db).await?;
    Ok(Json(by_category_from_books(&books)))
}

fn by_location_from_books(books: &[Book]) -> BTreeMap<String, GroupStats> {
    let mut stats: BTreeMap<String, GroupStats> = BTreeMap::new();
    for book in books {
        accumulate(
            stats.entry(book.location.as_str().to_string()).or_default(),
            book,
        );
    }
    stats
}

/// GET /api/stats/by-location
pub async fn by_location(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, GroupStats>>> {
    let books = books::list_all_books(&state.db).await?;
    Ok(Json(by_location_from_books(&books)))
}

/// Build stats routes
pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/api/stats/overview", get(overview))
        .route("/api/stats/reading-by-month", get(reading_by_month))
        .route("/api/stats/by-category", get(by_category))
        .route("/api/stats/by-location", get(by_location))
}
