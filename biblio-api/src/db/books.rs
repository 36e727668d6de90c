//! Book persistence
//!
//! Reading status is stored as one JSON document per book; the closed
//! reviewer set lives in the model type, not in the schema.

use biblio_common::models::{Book, Category, Location, ReadingStatus};
use biblio_common::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::escape_like;
use crate::db::categories::category_from_row;

/// Filters for the book listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct BookFilter {
    /// Category guid
    pub category: Option<Uuid>,
    /// Location wire value, e.g. "Biblioteca Principal"
    pub location: Option<String>,
    /// Substring match over title and author
    pub search: Option<String>,
}

/// Optional field updates for `PUT /api/books/:id`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publish_date: Option<String>,
    pub description: Option<String>,
    pub page_count: Option<i64>,
    pub language: Option<String>,
    pub cover_image: Option<String>,
    pub categories: Option<Vec<Uuid>>,
    pub location: Option<Location>,
    pub custom_location: Option<String>,
    pub genre: Option<String>,
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

fn book_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Book> {
    let guid_str: String = row.get("guid");
    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| Error::Internal(format!("invalid UUID in database: {}", e)))?;

    let status_json: String = row.get("reading_status");
    let reading_status: ReadingStatus = serde_json::from_str(&status_json)
        .map_err(|e| Error::Internal(format!("invalid reading status document: {}", e)))?;

    let location_str: String = row.get("location");
    let added_date: String = row.get("added_date");

    Ok(Book {
        guid,
        isbn: row.get("isbn"),
        title: row.get("title"),
        author: row.get("author"),
        publisher: row.get("publisher"),
        publish_date: row.get("publish_date"),
        description: row.get("description"),
        page_count: row.get("page_count"),
        language: row.get("language"),
        cover_image: row.get("cover_image"),
        categories: Vec::new(),
        location: Location::parse(&location_str).unwrap_or_default(),
        custom_location: row.get("custom_location"),
        genre: row.get("genre"),
        reading_status,
        added_date: parse_timestamp(&added_date),
    })
}

/// Insert a new book. A UNIQUE violation on the ISBN column is reported as a
/// conflict so callers can surface a duplicate message.
pub async fn insert_book(pool: &SqlitePool, book: &Book) -> Result<()> {
    let status_json = serde_json::to_string(&book.reading_status)
        .map_err(|e| Error::Internal(format!("failed to serialize reading status: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO books (
            guid, isbn, title, author, publisher, publish_date, description,
            page_count, language, cover_image, location, custom_location,
            genre, reading_status, added_date
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(book.guid.to_string())
    .bind(&book.isbn)
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.publisher)
    .bind(&book.publish_date)
    .bind(&book.description)
    .bind(book.page_count)
    .bind(&book.language)
    .bind(&book.cover_image)
    .bind(book.location.as_str())
    .bind(&book.custom_location)
    .bind(&book.genre)
    .bind(&status_json)
    .bind(book.added_date.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            return Err(Error::Conflict(format!(
                "a book with ISBN {} already exists",
                book.isbn
            )));
        }
        Err(err) => return Err(err.into()),
    }

    if !book.categories.is_empty() {
        let ids: Vec<Uuid> = book.categories.iter().map(|c| c.guid).collect();
        set_book_categories(pool, book.guid, &ids).await?;
    }

    tracing::debug!(guid = %book.guid, isbn = %book.isbn, title = %book.title, "Inserted book");

    Ok(())
}

/// Load one book with its categories populated.
pub async fn load_book(pool: &SqlitePool, guid: Uuid) -> Result<Option<Book>> {
    let row = sqlx::query("SELECT * FROM books WHERE guid = ?")
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let mut book = book_from_row(&row)?;
            book.categories = load_categories_for_book(pool, guid).await?;
            Ok(Some(book))
        }
        None => Ok(None),
    }
}

/// Look up a book by exact ISBN.
pub async fn find_by_isbn(pool: &SqlitePool, isbn: &str) -> Result<Option<Book>> {
    let row = sqlx::query("SELECT * FROM books WHERE isbn = ?")
        .bind(isbn)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(book_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Loose duplicate detection used by the import preview: an exact
/// case-insensitive title match, or a title sharing its first 20 characters
/// combined with the author's first word. Deliberately cheaper and broader
/// than the similarity scorer.
pub async fn find_loose_match(
    pool: &SqlitePool,
    title: &str,
    author: &str,
) -> Result<Option<Book>> {
    let prefix: String = title.chars().take(20).collect();
    let author_first_word = author.split_whitespace().next().unwrap_or("");

    let row = sqlx::query(
        r#"
        SELECT * FROM books
        WHERE title = ? COLLATE NOCASE
           OR (title LIKE ? ESCAPE '\' AND author LIKE ? ESCAPE '\')
        LIMIT 1
        "#,
    )
    .bind(title)
    .bind(format!("%{}%", escape_like(&prefix)))
    .bind(format!("%{}%", escape_like(author_first_word)))
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(book_from_row(&row)?)),
        None => Ok(None),
    }
}

/// List books with optional category/location/search filters, sorted by
/// title, with categories populated.
pub async fn list_books(pool: &SqlitePool, filter: &BookFilter) -> Result<Vec<Book>> {
    let mut sql = String::from("SELECT b.* FROM books b");
    if filter.category.is_some() {
        sql.push_str(" JOIN book_categories bc ON bc.book_id = b.guid AND bc.category_id = ?");
    }
    sql.push_str(" WHERE 1=1");
    if filter.location.is_some() {
        sql.push_str(" AND b.location = ?");
    }
    if filter.search.is_some() {
        sql.push_str(" AND (b.title LIKE ? ESCAPE '\\' OR b.author LIKE ? ESCAPE '\\')");
    }
    sql.push_str(" ORDER BY b.title COLLATE NOCASE ASC");

    let mut query = sqlx::query(&sql);
    if let Some(category) = &filter.category {
        query = query.bind(category.to_string());
    }
    if let Some(location) = &filter.location {
        query = query.bind(location);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        query = query.bind(pattern.clone()).bind(pattern);
    }

    let rows = query.fetch_all(pool).await?;

    let mut books = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut book = book_from_row(row)?;
        book.categories = load_categories_for_book(pool, book.guid).await?;
        books.push(book);
    }

    Ok(books)
}

/// All books, sorted by title. Used by the exporter and the statistics
/// aggregations.
pub async fn list_all_books(pool: &SqlitePool) -> Result<Vec<Book>> {
    list_books(pool, &BookFilter::default()).await
}

/// Books with no cover image, sorted by title.
pub async fn list_books_without_cover(pool: &SqlitePool) -> Result<Vec<Book>> {
    let rows = sqlx::query(
        "SELECT * FROM books WHERE cover_image = '' ORDER BY title COLLATE NOCASE ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut books = Vec::with_capacity(rows.len());
    for row in &rows {
        books.push(book_from_row(row)?);
    }
    Ok(books)
}

/// Apply field updates. Returns the updated book, or None when it does not
/// exist.
pub async fn update_book(
    pool: &SqlitePool,
    guid: Uuid,
    update: &BookUpdate,
) -> Result<Option<Book>> {
    let existing = match load_book(pool, guid).await? {
        Some(book) => book,
        None => return Ok(None),
    };

    sqlx::query(
        r#"
        UPDATE books SET
            title = ?, author = ?, publisher = ?, publish_date = ?,
            description = ?, page_count = ?, language = ?, cover_image = ?,
            location = ?, custom_location = ?, genre = ?
        WHERE guid = ?
        "#,
    )
    .bind(update.title.as_deref().unwrap_or(&existing.title))
    .bind(update.author.as_deref().unwrap_or(&existing.author))
    .bind(update.publisher.as_deref().unwrap_or(&existing.publisher))
    .bind(
        update
            .publish_date
            .as_deref()
            .or(existing.publish_date.as_deref()),
    )
    .bind(update.description.as_deref().unwrap_or(&existing.description))
    .bind(update.page_count.unwrap_or(existing.page_count))
    .bind(update.language.as_deref().unwrap_or(&existing.language))
    .bind(update.cover_image.as_deref().unwrap_or(&existing.cover_image))
    .bind(update.location.unwrap_or(existing.location).as_str())
    .bind(
        update
            .custom_location
            .as_deref()
            .unwrap_or(&existing.custom_location),
    )
    .bind(update.genre.as_deref().unwrap_or(&existing.genre))
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    if let Some(categories) = &update.categories {
        set_book_categories(pool, guid, categories).await?;
    }

    load_book(pool, guid).await
}

/// Replace the stored reading-status document.
pub async fn update_reading_status(
    pool: &SqlitePool,
    guid: Uuid,
    status: &ReadingStatus,
) -> Result<()> {
    let status_json = serde_json::to_string(status)
        .map_err(|e| Error::Internal(format!("failed to serialize reading status: {}", e)))?;

    sqlx::query("UPDATE books SET reading_status = ? WHERE guid = ?")
        .bind(&status_json)
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete a book and its category references. Returns false when the book
/// did not exist.
pub async fn delete_book(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM books WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    sqlx::query("DELETE FROM book_categories WHERE book_id = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace the category references of a book.
pub async fn set_book_categories(
    pool: &SqlitePool,
    book_id: Uuid,
    category_ids: &[Uuid],
) -> Result<()> {
    sqlx::query("DELETE FROM book_categories WHERE book_id = ?")
        .bind(book_id.to_string())
        .execute(pool)
        .await?;

    for category_id in category_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO book_categories (book_id, category_id) VALUES (?, ?)",
        )
        .bind(book_id.to_string())
        .bind(category_id.to_string())
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Categories referenced by a book. References to deleted categories simply
/// resolve to nothing here; book records are never touched by category
/// deletion.
pub async fn load_categories_for_book(pool: &SqlitePool, book_id: Uuid) -> Result<Vec<Category>> {
    let rows = sqlx::query(
        r#"
        SELECT c.* FROM categories c
        JOIN book_categories bc ON bc.category_id = c.guid
        WHERE bc.book_id = ?
        ORDER BY c.name COLLATE NOCASE ASC
        "#,
    )
    .bind(book_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut categories = Vec::with_capacity(rows.len());
    for row in &rows {
        categories.push(category_from_row(row)?);
    }
    Ok(categories)
}
