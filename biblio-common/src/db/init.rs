//! Table creation
//!
//! Idempotent `CREATE TABLE IF NOT EXISTS` statements. Exposed per table so
//! tests can build exactly the schema slice they need against an in-memory
//! pool.

use crate::Result;
use sqlx::SqlitePool;

/// Create every table the catalog needs.
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    create_books_table(pool).await?;
    create_categories_table(pool).await?;
    create_book_categories_table(pool).await?;
    create_users_table(pool).await?;

    tracing::info!("Database tables initialized (books, categories, book_categories, users)");

    Ok(())
}

/// Books, with the closed-set reading status stored as a JSON document.
/// The unique ISBN constraint also covers synthetic placeholders, which are
/// minted with unique suffixes.
pub async fn create_books_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            guid TEXT PRIMARY KEY,
            isbn TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            publisher TEXT NOT NULL DEFAULT '',
            publish_date TEXT,
            description TEXT NOT NULL DEFAULT '',
            page_count INTEGER NOT NULL DEFAULT 0,
            language TEXT NOT NULL DEFAULT '',
            cover_image TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL DEFAULT 'Biblioteca Principal',
            custom_location TEXT NOT NULL DEFAULT '',
            genre TEXT NOT NULL DEFAULT '',
            reading_status TEXT NOT NULL DEFAULT '{}',
            added_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_categories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            description TEXT NOT NULL DEFAULT '',
            color TEXT NOT NULL DEFAULT '#3B82F6',
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Book-to-category references. Category deletion does not cascade here:
/// a deleted category simply leaves no rows behind for new joins, and the
/// join rows of a deleted category are removed, but books themselves are
/// never touched by category deletion.
pub async fn create_book_categories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS book_categories (
            book_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            PRIMARY KEY (book_id, category_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            review_key TEXT,
            avatar TEXT NOT NULL DEFAULT '',
            bio TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_all_tables() {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        create_all_tables(&pool).await.expect("Failed to create tables");

        // Creation is idempotent
        create_all_tables(&pool).await.expect("Second create failed");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_isbn_uniqueness_enforced() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        create_books_table(&pool).await.unwrap();

        let insert = "INSERT INTO books (guid, isbn, title, author) VALUES (?, ?, 'T', 'A')";
        sqlx::query(insert)
            .bind(uuid::Uuid::new_v4().to_string())
            .bind("9789561111111")
            .execute(&pool)
            .await
            .unwrap();

        let dup = sqlx::query(insert)
            .bind(uuid::Uuid::new_v4().to_string())
            .bind("9789561111111")
            .execute(&pool)
            .await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_category_name_unique_case_insensitive() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        create_categories_table(&pool).await.unwrap();

        let insert = "INSERT INTO categories (guid, name) VALUES (?, ?)";
        sqlx::query(insert)
            .bind(uuid::Uuid::new_v4().to_string())
            .bind("Novela")
            .execute(&pool)
            .await
            .unwrap();

        let dup = sqlx::query(insert)
            .bind(uuid::Uuid::new_v4().to_string())
            .bind("NOVELA")
            .execute(&pool)
            .await;
        assert!(dup.is_err());
    }
}
