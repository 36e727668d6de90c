//! ISBN Chile catalog scrape
//!
//! Last-resort source in the resolver chain. The regional catalog has no
//! API, so this adapter fetches the search page, follows the first result
//! link and pulls fields out of the page's visible text with regex
//! heuristics keyed to the site's Spanish labels. The extraction is
//! inherently fragile and is isolated behind the same source interface as
//! the API-backed clients: any failure here reads as "source unavailable".

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use super::ResolvedBook;

const ISBN_CHILE_BASE_URL: &str = "https://isbnchile.cl";
const USER_AGENT: &str = concat!("biblio/", env!("CARGO_PKG_VERSION"));
/// Explicit page fetch timeout; the catalog can be slow.
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const DESCRIPTION_CAP: usize = 1000;

struct DetailPatterns {
    title_after_isbn: Regex,
    author: Regex,
    publisher: Regex,
    description: Regex,
    page_count: Regex,
    isbn: Regex,
    publish_date: Regex,
    genre: Regex,
    result_link: Regex,
    href: Regex,
    cover: Regex,
}

impl DetailPatterns {
    fn compile() -> Self {
        // Hardcoded patterns; failure here is a programming error.
        Self {
            title_after_isbn: Regex::new(r"ISBN\s+[\d-]+\s*\n\s*([^\n]+)").expect("static regex"),
            author: Regex::new(r"(?i)Autor[:\s]+([^\n]+)").expect("static regex"),
            publisher: Regex::new(r"(?i)Editorial[:\s]+([^\n]+)").expect("static regex"),
            description: Regex::new(r"(?is)Reseña\s*\n(.*?)(?:Contáctenos|$)")
                .expect("static regex"),
            page_count: Regex::new(r"(?i)Número de páginas[:\s]+(\d+)").expect("static regex"),
            isbn: Regex::new(r"ISBN\s+([\d-]+)").expect("static regex"),
            publish_date: Regex::new(r"(?i)Publicado[:\s]+([\d-]+)").expect("static regex"),
            genre: Regex::new(r"(?i)Materia[:\s]+([^\n]+)").expect("static regex"),
            result_link: Regex::new(r#"(?is)<a\s[^>]*class="[^"]*titulo[^"]*"[^>]*>"#)
                .expect("static regex"),
            href: Regex::new(r#"href="([^"]+)""#).expect("static regex"),
            cover: Regex::new(r#"(?is)<div[^>]*class="[^"]*col-md-5[^"]*"[^>]*>.*?<img[^>]+src="([^"]+)""#)
                .expect("static regex"),
        }
    }
}

fn patterns() -> &'static DetailPatterns {
    static PATTERNS: OnceLock<DetailPatterns> = OnceLock::new();
    PATTERNS.get_or_init(DetailPatterns::compile)
}

/// ISBN Chile scrape client
pub struct IsbnChileClient {
    http_client: reqwest::Client,
}

impl IsbnChileClient {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(PAGE_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http_client })
    }

    /// Search the catalog for an ISBN and scrape the first result's detail
    /// page. Returns None when there is no result or the page yields no
    /// title.
    pub async fn lookup_isbn(&self, isbn: &str) -> Result<Option<ResolvedBook>> {
        let formatted = format_isbn_with_dashes(isbn);
        let search_url = format!(
            "{}/catalogo.php?mode=resultados_rapidos&palabra={}",
            ISBN_CHILE_BASE_URL, formatted
        );
        tracing::debug!(isbn = %isbn, url = %search_url, "Searching ISBN Chile");

        let search_html = self
            .http_client
            .get(&search_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let Some(detail_path) = first_result_link(&search_html) else {
            tracing::debug!(isbn = %isbn, "No results on ISBN Chile");
            return Ok(None);
        };

        let detail_url = if detail_path.starts_with("http") {
            detail_path
        } else {
            format!("{}/{}", ISBN_CHILE_BASE_URL, detail_path.trim_start_matches('/'))
        };

        let detail_html = self
            .http_client
            .get(&detail_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let book = extract_book(&detail_html, isbn);
        if let Some(book) = &book {
            tracing::info!(isbn = %isbn, title = %book.title, "ISBN Chile hit");
        }

        Ok(book)
    }
}

/// ISBN-13s with the Chilean prefix get the dashing the catalog search
/// expects; anything else is passed through untouched.
pub fn format_isbn_with_dashes(isbn: &str) -> String {
    let clean: String = isbn.chars().filter(|c| *c != '-').collect();
    if clean.len() == 13 && clean.starts_with("978956") {
        format!(
            "978-956-{}-{}-{}",
            &clean[6..11],
            &clean[11..12],
            &clean[12..]
        )
    } else {
        isbn.to_string()
    }
}

/// Find the href of the first search result link (`a.titulo`).
fn first_result_link(html: &str) -> Option<String> {
    let pats = patterns();
    let tag = pats.result_link.find(html)?;
    pats.href
        .captures(tag.as_str())
        .map(|caps| caps[1].to_string())
}

/// Pull the book fields out of the detail page. Returns None when no title
/// can be located, which the resolver treats as a miss.
fn extract_book(html: &str, requested_isbn: &str) -> Option<ResolvedBook> {
    let pats = patterns();
    let text = visible_text(html);

    let title = pats
        .title_after_isbn
        .captures(&text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default();
    if title.is_empty() {
        return None;
    }

    let capture = |re: &Regex| {
        re.captures(&text)
            .map(|caps| caps[1].trim().to_string())
            .unwrap_or_default()
    };

    let author = capture(&pats.author);
    let publisher = capture(&pats.publisher);
    let genre = capture(&pats.genre);
    let publish_date = capture(&pats.publish_date);

    let description: String = pats
        .description
        .captures(&text)
        .map(|caps| caps[1].trim().chars().take(DESCRIPTION_CAP).collect())
        .unwrap_or_default();

    let page_count = pats
        .page_count
        .captures(&text)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .unwrap_or(0);

    let found_isbn = pats
        .isbn
        .captures(&text)
        .map(|caps| caps[1].replace('-', ""))
        .unwrap_or_default();

    let cover_image = pats
        .cover
        .captures(html)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default();

    Some(ResolvedBook {
        id: String::new(),
        isbn: if found_isbn.is_empty() {
            requested_isbn.to_string()
        } else {
            found_isbn
        },
        title,
        author: if author.is_empty() {
            super::UNKNOWN_AUTHOR.to_string()
        } else {
            author
        },
        publisher,
        publish_date: if publish_date.is_empty() {
            None
        } else {
            Some(publish_date)
        },
        description,
        page_count,
        language: "es".to_string(),
        cover_image,
        categories: Vec::new(),
        genre,
        source: "isbnchile".to_string(),
    })
}

/// Reduce an HTML document to the visible text the field regexes run over.
/// Block-level closers become newlines so label/value lines keep their
/// structure.
fn visible_text(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();

    let script = SCRIPT.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("static regex")
    });
    let block = BLOCK.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(p|div|td|tr|li|h[1-6]|title)>").expect("static regex")
    });
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"));

    let without_scripts = script.replace_all(html, "");
    let with_newlines = block.replace_all(&without_scripts, "\n");
    let stripped = tag.replace_all(&with_newlines, "");

    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    // Collapse runs of blank lines so "label \n\n value" stays adjacent
    let mut lines: Vec<&str> = Vec::new();
    for line in decoded.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }
    lines.join("\n")
}
