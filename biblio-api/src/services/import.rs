//! Bulk import orchestration
//!
//! Preview classifies every spreadsheet row into one of four buckets
//! without writing anything; confirm persists the rows the user picked.
//! Rows are processed strictly in sheet order so the reported row numbers
//! line up with what the user sees in Excel.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use async_trait::async_trait;
use biblio_common::models::{Book, Location, ReadingStatus, ReviewerStatus};
use biblio_common::Result;

use super::google_books::GoogleBooksClient;
use super::matcher::{find_match, MatchOutcome};
use super::spreadsheet::ImportRow;
use super::ResolvedBook;
use crate::db::books;

/// Matches one spreadsheet row against an external catalog. Abstracted so
/// preview can be exercised without the network.
#[async_trait]
pub trait RowMatcher: Send + Sync {
    async fn match_row(&self, title: &str, author: &str) -> MatchOutcome;
}

#[async_trait]
impl RowMatcher for GoogleBooksClient {
    async fn match_row(&self, title: &str, author: &str) -> MatchOutcome {
        match find_match(self, title, author).await {
            Ok(outcome) => outcome,
            Err(err) => MatchOutcome::NotFound {
                reason: format!("search failed: {}", err),
            },
        }
    }
}

/// A candidate record ready to persist: the matched book plus the reading
/// flags derived from the sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBookData {
    #[serde(flatten)]
    pub book: ResolvedBook,
    pub reading_status: ReadingStatus,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundEntry {
    pub row: usize,
    pub title: String,
    pub author: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingEntry {
    pub row: usize,
    pub title: String,
    pub author: String,
    pub existing_title: String,
    pub existing_author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingImageEntry {
    pub row: usize,
    pub title: String,
    pub author: String,
    pub original_title: String,
    pub original_author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToImportEntry {
    pub row: usize,
    pub original_title: String,
    pub original_author: String,
    pub book_data: ImportBookData,
    pub has_image: bool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub to_import: Vec<ToImportEntry>,
    pub not_found: Vec<NotFoundEntry>,
    pub already_exists: Vec<ExistingEntry>,
    pub pending_image: Vec<PendingImageEntry>,
    pub total: usize,
}

/// Spreadsheet flag cells are boolean-ish: anything non-empty counts as
/// yes unless it literally says no.
fn flag_is_set(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.to_lowercase() != "no"
}

fn derive_reading_status(row: &ImportRow) -> ReadingStatus {
    let entry = |read: &str, unfinished: &str| ReviewerStatus {
        read: flag_is_set(read),
        rating: 0,
        review: if unfinished.trim().is_empty() {
            String::new()
        } else {
            "Sin terminar".to_string()
        },
        review_date: None,
        goodreads_url: String::new(),
    };

    ReadingStatus {
        adaly: entry(&row.read_adaly, &row.unfinished_adaly),
        sebastian: entry(&row.read_sebastian, &row.unfinished_sebastian),
    }
}

/// Classify every row: empty title, already in the catalog, matched, or
/// unmatched. Nothing is written.
pub async fn preview_import(
    pool: &SqlitePool,
    rows: &[ImportRow],
    matcher: &dyn RowMatcher,
) -> Result<ImportPreview> {
    let mut preview = ImportPreview {
        total: rows.len(),
        ..Default::default()
    };

    for (index, row) in rows.iter().enumerate() {
        if row.title.is_empty() {
            preview.not_found.push(NotFoundEntry {
                row: row.row,
                title: "(vacío)".to_string(),
                author: row.author.clone(),
                reason: "empty title".to_string(),
            });
            continue;
        }

        if let Some(existing) = books::find_loose_match(pool, &row.title, &row.author).await? {
            preview.already_exists.push(ExistingEntry {
                row: row.row,
                title: row.title.clone(),
                author: row.author.clone(),
                existing_title: existing.title,
                existing_author: existing.author,
            });
            continue;
        }

        let (mut book, confidence) = match matcher.match_row(&row.title, &row.author).await {
            MatchOutcome::Found { book, confidence } => (book, confidence),
            MatchOutcome::NotFound { reason } => {
                preview.not_found.push(NotFoundEntry {
                    row: row.row,
                    title: row.title.clone(),
                    author: row.author.clone(),
                    reason,
                });
                continue;
            }
        };

        if book.isbn.is_empty() {
            book.isbn = format!("import-{}-{}", Utc::now().timestamp_millis(), index);
        }

        if book.cover_image.is_empty() {
            preview.pending_image.push(PendingImageEntry {
                row: row.row,
                title: book.title.clone(),
                author: book.author.clone(),
                original_title: row.title.clone(),
                original_author: row.author.clone(),
            });
        }

        let has_image = !book.cover_image.is_empty();
        preview.to_import.push(ToImportEntry {
            row: row.row,
            original_title: row.title.clone(),
            original_author: row.author.clone(),
            book_data: ImportBookData {
                book,
                reading_status: derive_reading_status(row),
                confidence,
            },
            has_image,
        });
    }

    Ok(preview)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedEntry {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub has_image: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEntry {
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported: Vec<ImportedEntry>,
    pub failed: Vec<FailedEntry>,
}

/// Persist the selected rows. Real ISBNs are re-checked for collisions in
/// case the catalog changed between preview and confirm; synthetic
/// placeholders skip the check. Per-row failures are collected, never
/// fatal.
pub async fn confirm_import(
    pool: &SqlitePool,
    items: &[ImportBookData],
    location: Location,
) -> Result<ImportResult> {
    let mut result = ImportResult::default();

    for item in items {
        let data = &item.book;

        if !data.isbn.is_empty() && !data.isbn.starts_with("import-") {
            if books::find_by_isbn(pool, &data.isbn).await?.is_some() {
                result.failed.push(FailedEntry {
                    title: data.title.clone(),
                    reason: "duplicate ISBN".to_string(),
                });
                continue;
            }
        }

        let isbn = if data.isbn.is_empty() {
            format!("import-{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4())
        } else {
            data.isbn.clone()
        };

        let book = Book {
            guid: Uuid::new_v4(),
            isbn,
            title: data.title.clone(),
            author: data.author.clone(),
            publisher: data.publisher.clone(),
            publish_date: data.publish_date.clone(),
            description: data.description.clone(),
            page_count: data.page_count,
            language: data.language.clone(),
            cover_image: data.cover_image.clone(),
            categories: Vec::new(),
            location,
            custom_location: String::new(),
            genre: data.genre.clone(),
            reading_status: item.reading_status.clone(),
            added_date: Utc::now(),
        };

        match books::insert_book(pool, &book).await {
            Ok(()) => result.imported.push(ImportedEntry {
                id: book.guid,
                title: book.title,
                author: book.author,
                has_image: !book.cover_image.is_empty(),
            }),
            Err(err) => {
                tracing::warn!(title = %book.title, error = %err, "Import row failed");
                result.failed.push(FailedEntry {
                    title: book.title,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(result)
}
