//! Category persistence
//!
//! Category names are unique case-insensitively. Deleting a category does
//! not cascade to the books referencing it; their references just stop
//! resolving (soft orphaning, preserved from the original catalog).

use biblio_common::models::{Category, DEFAULT_CATEGORY_COLOR};
use biblio_common::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub(crate) fn category_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
    let guid_str: String = row.get("guid");
    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| Error::Internal(format!("invalid UUID in database: {}", e)))?;

    let created: String = row.get("created_date");
    let created_date = DateTime::parse_from_rfc3339(&created)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(&created, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc())
        })
        .unwrap_or_else(|_| Utc::now());

    Ok(Category {
        guid,
        name: row.get("name"),
        description: row.get("description"),
        color: row.get("color"),
        created_date,
    })
}

pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<Category>> {
    let rows = sqlx::query("SELECT * FROM categories ORDER BY name COLLATE NOCASE ASC")
        .fetch_all(pool)
        .await?;

    let mut categories = Vec::with_capacity(rows.len());
    for row in &rows {
        categories.push(category_from_row(row)?);
    }
    Ok(categories)
}

pub async fn load_category(pool: &SqlitePool, guid: Uuid) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT * FROM categories WHERE guid = ?")
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(category_from_row(&row)?)),
        None => Ok(None),
    }
}

pub async fn find_category_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT * FROM categories WHERE name = ? COLLATE NOCASE")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(category_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Create a category. Creation is idempotent on the case-insensitive name:
/// when a category with the same name already exists it is returned instead
/// (inline creation during book editing relies on this).
pub async fn create_category(
    pool: &SqlitePool,
    name: &str,
    description: &str,
    color: Option<&str>,
) -> Result<Category> {
    if let Some(existing) = find_category_by_name(pool, name).await? {
        return Ok(existing);
    }

    let category = Category {
        guid: Uuid::new_v4(),
        name: name.to_string(),
        description: description.to_string(),
        color: color.unwrap_or(DEFAULT_CATEGORY_COLOR).to_string(),
        created_date: Utc::now(),
    };

    let result = sqlx::query(
        "INSERT INTO categories (guid, name, description, color, created_date) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(category.guid.to_string())
    .bind(&category.name)
    .bind(&category.description)
    .bind(&category.color)
    .bind(category.created_date.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(category),
        // Lost a race with a concurrent insert of the same name
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            find_category_by_name(pool, name)
                .await?
                .ok_or_else(|| Error::Conflict(format!("category {} already exists", name)))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn update_category(
    pool: &SqlitePool,
    guid: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    color: Option<&str>,
) -> Result<Option<Category>> {
    let existing = match load_category(pool, guid).await? {
        Some(category) => category,
        None => return Ok(None),
    };

    sqlx::query("UPDATE categories SET name = ?, description = ?, color = ? WHERE guid = ?")
        .bind(name.unwrap_or(&existing.name))
        .bind(description.unwrap_or(&existing.description))
        .bind(color.unwrap_or(&existing.color))
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    load_category(pool, guid).await
}

/// Delete a category. Join rows are cleaned up; books are left untouched.
pub async fn delete_category(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM categories WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    sqlx::query("DELETE FROM book_categories WHERE category_id = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::books::tests::setup_test_db;

    #[tokio::test]
    async fn test_create_category_idempotent_on_name() {
        let pool = setup_test_db().await;

        let first = create_category(&pool, "Novela", "", None).await.unwrap();
        let second = create_category(&pool, "NOVELA", "ignored", Some("#FF0000"))
            .await
            .unwrap();

        assert_eq!(first.guid, second.guid);
        assert_eq!(second.color, DEFAULT_CATEGORY_COLOR);

        let all = list_categories(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_category_does_not_touch_books() {
        let pool = setup_test_db().await;
        let category = create_category(&pool, "Poesía", "", None).await.unwrap();

        let book = crate::db::books::tests::sample_book("9780000000010", "Altazor", "Huidobro");
        crate::db::books::insert_book(&pool, &book).await.unwrap();
        crate::db::books::set_book_categories(&pool, book.guid, &[category.guid])
            .await
            .unwrap();

        assert!(delete_category(&pool, category.guid).await.unwrap());

        // The book survives; its reference just resolves to nothing
        let loaded = crate::db::books::load_book(&pool, book.guid)
            .await
            .unwrap()
            .expect("book should survive category deletion");
        assert!(loaded.categories.is_empty());
    }
}
