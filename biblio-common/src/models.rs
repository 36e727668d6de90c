//! Canonical data models
//!
//! Every metadata source and every API payload maps into the shapes defined
//! here. The reading-status map is a closed set of two named reviewers; it is
//! a pair of struct fields rather than an open collection on purpose (the
//! two-person-household schema from the original catalog).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed reviewer identities that can hold a reading-status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reviewer {
    Adaly,
    Sebastian,
}

impl Reviewer {
    /// Parse a reviewer key as it appears in API payloads and user records.
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "adaly" => Some(Reviewer::Adaly),
            "sebastian" => Some(Reviewer::Sebastian),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Reviewer::Adaly => "adaly",
            Reviewer::Sebastian => "sebastian",
        }
    }
}

/// One reviewer's reading state for a book
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReviewerStatus {
    pub read: bool,
    /// Rating on a 0..=10 scale
    pub rating: i64,
    pub review: String,
    pub review_date: Option<DateTime<Utc>>,
    pub goodreads_url: String,
}

/// Reading status for the closed reviewer set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingStatus {
    pub adaly: ReviewerStatus,
    pub sebastian: ReviewerStatus,
}

impl ReadingStatus {
    pub fn entry(&self, reviewer: Reviewer) -> &ReviewerStatus {
        match reviewer {
            Reviewer::Adaly => &self.adaly,
            Reviewer::Sebastian => &self.sebastian,
        }
    }

    pub fn entry_mut(&mut self, reviewer: Reviewer) -> &mut ReviewerStatus {
        match reviewer {
            Reviewer::Adaly => &mut self.adaly,
            Reviewer::Sebastian => &mut self.sebastian,
        }
    }
}

/// Shelf location of a physical book
///
/// Serialized with the location names the catalog has always used, so
/// exported spreadsheets and the SPA keep their wire values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    #[default]
    #[serde(rename = "Biblioteca Principal")]
    Principal,
    #[serde(rename = "Biblioteca Blanca")]
    Blanca,
    #[serde(rename = "Otro")]
    Otro,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Principal => "Biblioteca Principal",
            Location::Blanca => "Biblioteca Blanca",
            Location::Otro => "Otro",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Biblioteca Principal" => Some(Location::Principal),
            "Biblioteca Blanca" => Some(Location::Blanca),
            "Otro" => Some(Location::Otro),
            _ => None,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cataloged book
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub guid: Uuid,
    /// Unique across all books when real; synthetic placeholders use a
    /// `manual-` or `import-` prefix and are exempt from collision checks.
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publisher: String,
    /// Free text; format depends on the source that produced it
    pub publish_date: Option<String>,
    pub description: String,
    pub page_count: i64,
    pub language: String,
    pub cover_image: String,
    pub categories: Vec<Category>,
    pub location: Location,
    pub custom_location: String,
    pub genre: String,
    pub reading_status: ReadingStatus,
    pub added_date: DateTime<Utc>,
}

impl Book {
    /// True when the ISBN is a locally generated placeholder rather than a
    /// real identifier.
    pub fn has_synthetic_isbn(&self) -> bool {
        is_synthetic_isbn(&self.isbn)
    }
}

/// Synthetic ISBN placeholders are minted for manual entry and bulk import
/// when no real identifier is known.
pub fn is_synthetic_isbn(isbn: &str) -> bool {
    isbn.starts_with("manual-") || isbn.starts_with("import-")
}

/// A user-defined book category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub guid: Uuid,
    pub name: String,
    pub description: String,
    pub color: String,
    pub created_date: DateTime<Utc>,
}

pub const DEFAULT_CATEGORY_COLOR: &str = "#3B82F6";

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

/// An account that can log in to the catalog
///
/// `review_key` ties an account to one of the fixed reviewer identities;
/// admin accounts typically have none.
#[derive(Debug, Clone)]
pub struct User {
    pub guid: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub review_key: Option<Reviewer>,
    pub avatar: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this user may mutate the reading-status entry of `reviewer`.
    /// Admins may edit any entry; everyone else only their own.
    pub fn can_edit_reading_status(&self, reviewer: Reviewer) -> bool {
        self.is_admin() || self.review_key == Some(reviewer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reviewer_keys_round_trip() {
        assert_eq!(Reviewer::parse("adaly"), Some(Reviewer::Adaly));
        assert_eq!(Reviewer::parse("sebastian"), Some(Reviewer::Sebastian));
        assert_eq!(Reviewer::parse("someone"), None);
        assert_eq!(Reviewer::Adaly.key(), "adaly");
    }

    #[test]
    fn location_wire_values_preserved() {
        let json = serde_json::to_string(&Location::Blanca).unwrap();
        assert_eq!(json, "\"Biblioteca Blanca\"");
        assert_eq!(Location::parse("Otro"), Some(Location::Otro));
        assert_eq!(Location::parse("garage"), None);
    }

    #[test]
    fn reading_status_deserializes_missing_entries_to_defaults() {
        let status: ReadingStatus = serde_json::from_str("{}").unwrap();
        assert!(!status.adaly.read);
        assert_eq!(status.sebastian.rating, 0);
    }

    #[test]
    fn synthetic_isbn_detection() {
        assert!(is_synthetic_isbn("manual-1730000000"));
        assert!(is_synthetic_isbn("import-1730000000-3"));
        assert!(!is_synthetic_isbn("9789561111111"));
    }

    #[test]
    fn reading_status_permission_rules() {
        let sebastian = User {
            guid: Uuid::new_v4(),
            username: "Sebastian".into(),
            email: "sebastian@example.com".into(),
            password_hash: String::new(),
            role: Role::User,
            review_key: Some(Reviewer::Sebastian),
            avatar: String::new(),
            bio: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(sebastian.can_edit_reading_status(Reviewer::Sebastian));
        assert!(!sebastian.can_edit_reading_status(Reviewer::Adaly));

        let admin = User {
            role: Role::Admin,
            review_key: None,
            ..sebastian.clone()
        };
        assert!(admin.can_edit_reading_status(Reviewer::Adaly));
        assert!(admin.can_edit_reading_status(Reviewer::Sebastian));
    }
}
