//! User account persistence

use biblio_common::models::{Reviewer, Role, User};
use biblio_common::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let guid_str: String = row.get("guid");
    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| Error::Internal(format!("invalid UUID in database: {}", e)))?;

    let role_str: String = row.get("role");
    let role = Role::parse(&role_str)
        .ok_or_else(|| Error::Internal(format!("invalid role in database: {}", role_str)))?;

    let review_key: Option<String> = row.get("review_key");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(User {
        guid,
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        review_key: review_key.as_deref().and_then(Reviewer::parse),
        avatar: row.get("avatar"),
        bio: row.get("bio"),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

/// Insert a new user. Duplicate email or username is a conflict.
pub async fn insert_user(pool: &SqlitePool, user: &User) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (
            guid, username, email, password_hash, role, review_key,
            avatar, bio, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.guid.to_string())
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.review_key.map(|r| r.key()))
    .bind(&user.avatar)
    .bind(&user.bio)
    .bind(user.created_at.to_rfc3339())
    .bind(user.updated_at.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(Error::Conflict(
            "email or username already in use".to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}

pub async fn load_user(pool: &SqlitePool, guid: Uuid) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE guid = ?")
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(user_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Look up by email; emails are stored lowercased.
pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE email = ?")
        .bind(email.to_lowercase())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(user_from_row(&row)?)),
        None => Ok(None),
    }
}

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(user_from_row(&row)?)),
        None => Ok(None),
    }
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in &rows {
        users.push(user_from_row(row)?);
    }
    Ok(users)
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Persist the mutable fields of a user record.
pub async fn update_user(pool: &SqlitePool, user: &User) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users SET
            username = ?, email = ?, password_hash = ?, role = ?,
            review_key = ?, avatar = ?, bio = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.review_key.map(|r| r.key()))
    .bind(&user.avatar)
    .bind(&user.bio)
    .bind(Utc::now().to_rfc3339())
    .bind(user.guid.to_string())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(Error::Conflict(
            "email or username already in use".to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}

pub async fn delete_user(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::books::tests::setup_test_db;

    fn sample_user(username: &str, email: &str) -> User {
        User {
            guid: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$12$fakehash".to_string(),
            role: Role::User,
            review_key: Some(Reviewer::Adaly),
            avatar: String::new(),
            bio: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_email() {
        let pool = setup_test_db().await;
        insert_user(&pool, &sample_user("Adaly", "adaly@example.com"))
            .await
            .unwrap();

        // Lookup is lowercase-normalized
        let user = find_user_by_email(&pool, "ADALY@example.com")
            .await
            .unwrap()
            .expect("user not found");
        assert_eq!(user.username, "Adaly");
        assert_eq!(user.review_key, Some(Reviewer::Adaly));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let pool = setup_test_db().await;
        insert_user(&pool, &sample_user("One", "same@example.com")).await.unwrap();

        let err = insert_user(&pool, &sample_user("Two", "same@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
