//! Service layer: metadata resolution, import matching, spreadsheets, uploads

pub mod google_books;
pub mod import;
pub mod isbn_chile;
pub mod matcher;
pub mod open_library;
pub mod resolver;
pub mod similarity;
pub mod spreadsheet;
pub mod upload;

use serde::{Deserialize, Serialize};

/// Fallback titles for sources that return an item without one. The source
/// catalogs are Spanish-language; these are the placeholder values the
/// existing data set already carries.
pub const UNTITLED: &str = "Sin título";
pub const UNKNOWN_AUTHOR: &str = "Autor desconocido";

/// Canonical normalized record every metadata source maps into.
///
/// Missing fields default to empty / zero / None, never an absent key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolvedBook {
    /// External id at the source, when it has one (search results only)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub publish_date: Option<String>,
    pub description: String,
    pub page_count: i64,
    pub language: String,
    pub cover_image: String,
    /// Category names suggested by the source (never persisted as-is)
    pub categories: Vec<String>,
    pub genre: String,
    /// Which source produced this record
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
}
