//! Open Library API client
//!
//! Second source in the resolver chain. The response is a map keyed by
//! `ISBN:{isbn}`; a missing key means the catalog has no record.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{ResolvedBook, UNKNOWN_AUTHOR, UNTITLED};

const OPEN_LIBRARY_BASE_URL: &str = "https://openlibrary.org";
const USER_AGENT: &str = concat!("biblio/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OlBook {
    title: Option<String>,
    authors: Option<Vec<OlAuthor>>,
    publishers: Option<Vec<OlPublisher>>,
    publish_date: Option<String>,
    notes: Option<String>,
    excerpts: Option<Vec<OlExcerpt>>,
    number_of_pages: Option<i64>,
    cover: Option<OlCover>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OlAuthor {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OlPublisher {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OlExcerpt {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OlCover {
    large: Option<String>,
    medium: Option<String>,
    small: Option<String>,
}

/// Open Library API client
pub struct OpenLibraryClient {
    http_client: reqwest::Client,
}

impl OpenLibraryClient {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http_client })
    }

    /// Look up a book by ISBN. Returns None when the catalog has no record.
    pub async fn lookup_isbn(&self, isbn: &str) -> Result<Option<ResolvedBook>> {
        let url = format!(
            "{}/api/books?bibkeys=ISBN:{}&format=json&jscmd=data",
            OPEN_LIBRARY_BASE_URL, isbn
        );
        tracing::debug!(isbn = %isbn, url = %url, "Querying Open Library");

        let response: HashMap<String, OlBook> = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let key = format!("ISBN:{}", isbn);
        let Some(record) = response.get(&key) else {
            return Ok(None);
        };

        let book = normalize_record(isbn, record);
        tracing::info!(isbn = %isbn, title = %book.title, "Open Library hit");

        Ok(Some(book))
    }
}

/// Map an Open Library record into the canonical shape.
fn normalize_record(isbn: &str, record: &OlBook) -> ResolvedBook {
    let cover = record
        .cover
        .as_ref()
        .and_then(|cover| {
            cover
                .large
                .as_deref()
                .or(cover.medium.as_deref())
                .or(cover.small.as_deref())
        })
        .unwrap_or_default()
        .replace("http://", "https://");

    let description = record
        .notes
        .clone()
        .filter(|notes| !notes.is_empty())
        .or_else(|| {
            record
                .excerpts
                .as_ref()
                .and_then(|excerpts| excerpts.first())
                .map(|excerpt| excerpt.text.clone())
        })
        .unwrap_or_default();

    ResolvedBook {
        id: String::new(),
        isbn: isbn.to_string(),
        title: record.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
        author: record
            .authors
            .as_ref()
            .map(|authors| {
                authors
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        publisher: record
            .publishers
            .as_ref()
            .and_then(|publishers| publishers.first())
            .map(|publisher| publisher.name.clone())
            .unwrap_or_default(),
        publish_date: record.publish_date.clone(),
        description,
        page_count: record.number_of_pages.unwrap_or(0),
        language: String::new(),
        cover_image: cover,
        categories: Vec::new(),
        genre: String::new(),
        source: "openlibrary".to_string(),
    }
}
