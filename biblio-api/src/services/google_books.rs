//! Google Books API client
//!
//! First source in the resolver chain, and the keyword-search backend for
//! the import matcher.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use super::{ResolvedBook, UNKNOWN_AUTHOR, UNTITLED};

const GOOGLE_BOOKS_BASE_URL: &str = "https://www.googleapis.com/books/v1";
const USER_AGENT: &str = concat!("biblio/", env!("CARGO_PKG_VERSION"));
const SEARCH_RESULT_CAP: usize = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VolumesResponse {
    #[serde(rename = "totalItems")]
    total_items: i64,
    items: Vec<Volume>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Volume {
    id: String,
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    authors: Option<Vec<String>>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    page_count: Option<i64>,
    language: Option<String>,
    image_links: Option<ImageLinks>,
    industry_identifiers: Option<Vec<IndustryIdentifier>>,
    categories: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ImageLinks {
    extra_large: Option<String>,
    large: Option<String>,
    medium: Option<String>,
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IndustryIdentifier {
    identifier: String,
}

/// Google Books API client
pub struct GoogleBooksClient {
    http_client: reqwest::Client,
}

impl GoogleBooksClient {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http_client })
    }

    /// Look up a single volume by ISBN. Returns None when the API has no
    /// matching item.
    pub async fn lookup_isbn(&self, isbn: &str) -> Result<Option<ResolvedBook>> {
        let url = format!("{}/volumes?q=isbn:{}", GOOGLE_BOOKS_BASE_URL, isbn);
        tracing::debug!(isbn = %isbn, url = %url, "Querying Google Books");

        let response: VolumesResponse = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.total_items == 0 || response.items.is_empty() {
            return Ok(None);
        }

        let info = &response.items[0].volume_info;
        let mut book = normalize_volume(info);
        book.isbn = isbn.to_string();

        tracing::info!(isbn = %isbn, title = %book.title, "Google Books hit");

        Ok(Some(book))
    }

    /// Keyword search, capped at 20 results.
    pub async fn search(&self, query: &str) -> Result<Vec<ResolvedBook>> {
        let url = format!(
            "{}/volumes?q={}&maxResults={}",
            GOOGLE_BOOKS_BASE_URL,
            urlencode(query),
            SEARCH_RESULT_CAP
        );
        tracing::debug!(query = %query, "Searching Google Books");

        let response: VolumesResponse = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let results = response
            .items
            .iter()
            .take(SEARCH_RESULT_CAP)
            .map(|item| {
                let mut book = normalize_volume(&item.volume_info);
                book.id = item.id.clone();
                book.isbn = item
                    .volume_info
                    .industry_identifiers
                    .as_ref()
                    .and_then(|ids| ids.first())
                    .map(|id| id.identifier.clone())
                    .unwrap_or_default();
                book
            })
            .collect();

        Ok(results)
    }
}

/// Map a Google Books volume into the canonical record shape.
fn normalize_volume(info: &VolumeInfo) -> ResolvedBook {
    ResolvedBook {
        id: String::new(),
        isbn: String::new(),
        title: info.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
        author: info
            .authors
            .as_ref()
            .map(|authors| authors.join(", "))
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        publisher: info.publisher.clone().unwrap_or_default(),
        publish_date: info.published_date.clone(),
        description: info.description.clone().unwrap_or_default(),
        page_count: info.page_count.unwrap_or(0),
        language: info.language.clone().unwrap_or_default(),
        cover_image: pick_cover(info.image_links.as_ref()),
        categories: info.categories.clone().unwrap_or_default(),
        genre: String::new(),
        source: "googlebooks".to_string(),
    }
}

/// Pick the largest available cover, upgrade the scheme and request the
/// higher-resolution zoom variant.
fn pick_cover(links: Option<&ImageLinks>) -> String {
    let Some(links) = links else {
        return String::new();
    };

    let cover = links
        .extra_large
        .as_deref()
        .or(links.large.as_deref())
        .or(links.medium.as_deref())
        .or(links.thumbnail.as_deref())
        .or(links.small_thumbnail.as_deref())
        .unwrap_or_default();

    if cover.is_empty() {
        return String::new();
    }

    cover
        .replace("http://", "https://")
        .replace("zoom=1", "zoom=2")
}

/// Minimal percent-encoding for the query string.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume_info(json: serde_json::Value) -> VolumeInfo {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn normalize_fills_defaults_for_missing_fields() {
        let book = normalize_volume(&volume_info(serde_json::json!({})));
        assert_eq!(book.title, UNTITLED);
        assert_eq!(book.author, UNKNOWN_AUTHOR);
        assert_eq!(book.page_count, 0);
        assert_eq!(book.cover_image, "");
        assert!(book.categories.is_empty());
    }

    #[test]
    fn normalize_joins_authors() {
        let book = normalize_volume(&volume_info(serde_json::json!({
            "title": "Good Omens",
            "authors": ["Terry Pratchett", "Neil Gaiman"]
        })));
        assert_eq!(book.author, "Terry Pratchett, Neil Gaiman");
    }

    #[test]
    fn cover_prefers_largest_and_upgrades_url() {
        let book = normalize_volume(&volume_info(serde_json::json!({
            "imageLinks": {
                "thumbnail": "http://books.google.com/thumb?zoom=1",
                "large": "http://books.google.com/large?zoom=1"
            }
        })));
        assert_eq!(book.cover_image, "https://books.google.com/large?zoom=2");
    }

    #[test]
    fn cover_falls_back_to_small_thumbnail() {
        let book = normalize_volume(&volume_info(serde_json::json!({
            "imageLinks": { "smallThumbnail": "https://books.google.com/small" }
        })));
        assert_eq!(book.cover_image, "https://books.google.com/small");
    }

    #[test]
    fn urlencode_query() {
        assert_eq!(urlencode("cien años"), "cien+a%C3%B1os");
    }
}
