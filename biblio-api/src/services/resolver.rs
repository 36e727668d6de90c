//! ISBN metadata resolution
//!
//! An ordered list of source strategies behind one trait, tried in priority
//! order until the first hit. Source errors never escape the chain: a source
//! that fails is a source with no answer, and only exhaustion of the whole
//! chain becomes a caller-visible NotFound.

use async_trait::async_trait;
use biblio_common::{Error, Result};

use super::google_books::GoogleBooksClient;
use super::isbn_chile::IsbnChileClient;
use super::open_library::OpenLibraryClient;
use super::ResolvedBook;

/// A metadata source that can be asked about one ISBN.
///
/// Implementations return `Ok(None)` for "I have no record"; an `Err` means
/// the source itself failed, which the resolver also treats as a miss.
#[async_trait]
pub trait BookSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn try_resolve(&self, isbn: &str) -> anyhow::Result<Option<ResolvedBook>>;
}

#[async_trait]
impl BookSource for GoogleBooksClient {
    fn name(&self) -> &'static str {
        "googlebooks"
    }

    async fn try_resolve(&self, isbn: &str) -> anyhow::Result<Option<ResolvedBook>> {
        self.lookup_isbn(isbn).await
    }
}

#[async_trait]
impl BookSource for OpenLibraryClient {
    fn name(&self) -> &'static str {
        "openlibrary"
    }

    async fn try_resolve(&self, isbn: &str) -> anyhow::Result<Option<ResolvedBook>> {
        self.lookup_isbn(isbn).await
    }
}

#[async_trait]
impl BookSource for IsbnChileClient {
    fn name(&self) -> &'static str {
        "isbnchile"
    }

    async fn try_resolve(&self, isbn: &str) -> anyhow::Result<Option<ResolvedBook>> {
        self.lookup_isbn(isbn).await
    }
}

/// The fallback chain. Holds its sources as data so the order is explicit
/// and tests can substitute their own.
pub struct MetadataResolver {
    sources: Vec<Box<dyn BookSource>>,
}

impl MetadataResolver {
    /// Production chain: Google Books, then Open Library, then the regional
    /// catalog scrape (unless disabled by configuration).
    pub fn from_config(scrape_enabled: bool) -> anyhow::Result<Self> {
        let mut sources: Vec<Box<dyn BookSource>> = vec![
            Box::new(GoogleBooksClient::new()?),
            Box::new(OpenLibraryClient::new()?),
        ];
        if scrape_enabled {
            sources.push(Box::new(IsbnChileClient::new()?));
        }
        Ok(Self { sources })
    }

    /// Build a resolver over an explicit source list (tests).
    pub fn with_sources(sources: Vec<Box<dyn BookSource>>) -> Self {
        Self { sources }
    }

    /// Resolve an ISBN (already stripped of punctuation and whitespace by
    /// the caller; no checksum validation happens here) into the canonical
    /// book shape, or NotFound once every source has been exhausted.
    pub async fn resolve(&self, isbn: &str) -> Result<ResolvedBook> {
        for source in &self.sources {
            match source.try_resolve(isbn).await {
                Ok(Some(book)) => {
                    tracing::info!(isbn = %isbn, source = source.name(), "Resolved ISBN");
                    return Ok(book);
                }
                Ok(None) => {
                    tracing::debug!(isbn = %isbn, source = source.name(), "Source has no record");
                }
                Err(err) => {
                    // Diagnostic only; a failing source is a source with no answer
                    tracing::warn!(isbn = %isbn, source = source.name(), error = %err, "Source failed");
                }
            }
        }

        Err(Error::NotFound(format!(
            "no source could resolve ISBN {}",
            isbn
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum MockBehavior {
        Hit(&'static str),
        Miss,
        Fail,
    }

    struct MockSource {
        name: &'static str,
        behavior: MockBehavior,
        calls: Arc<AtomicUsize>,
    }

    impl MockSource {
        fn new(name: &'static str, behavior: MockBehavior) -> (Box<dyn BookSource>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    name,
                    behavior,
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl BookSource for MockSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn try_resolve(&self, isbn: &str) -> anyhow::Result<Option<ResolvedBook>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                MockBehavior::Hit(source) => Ok(Some(ResolvedBook {
                    isbn: isbn.to_string(),
                    title: "Mock Title".to_string(),
                    source: source.to_string(),
                    ..Default::default()
                })),
                MockBehavior::Miss => Ok(None),
                MockBehavior::Fail => Err(anyhow::anyhow!("network down")),
            }
        }
    }

    #[tokio::test]
    async fn first_source_hit_short_circuits() {
        let (a, a_calls) = MockSource::new("a", MockBehavior::Hit("a"));
        let (b, b_calls) = MockSource::new("b", MockBehavior::Hit("b"));
        let (c, c_calls) = MockSource::new("c", MockBehavior::Hit("c"));

        let resolver = MetadataResolver::with_sources(vec![a, b, c]);
        let book = resolver.resolve("9789561234567").await.unwrap();

        assert_eq!(book.isbn, "9789561234567");
        assert_eq!(book.source, "a");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_through_to_regional_source() {
        let (a, _) = MockSource::new("a", MockBehavior::Miss);
        let (b, _) = MockSource::new("b", MockBehavior::Fail);
        let (c, c_calls) = MockSource::new("isbnchile", MockBehavior::Hit("isbnchile"));

        let resolver = MetadataResolver::with_sources(vec![a, b, c]);
        let book = resolver.resolve("9789561234567").await.unwrap();

        assert_eq!(book.source, "isbnchile");
        assert_eq!(c_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_is_not_found() {
        let (a, _) = MockSource::new("a", MockBehavior::Fail);
        let (b, _) = MockSource::new("b", MockBehavior::Miss);
        let (c, _) = MockSource::new("c", MockBehavior::Fail);

        let resolver = MetadataResolver::with_sources(vec![a, b, c]);
        let err = resolver.resolve("0000000000000").await.unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn source_error_does_not_abort_the_chain() {
        let (a, a_calls) = MockSource::new("a", MockBehavior::Fail);
        let (b, b_calls) = MockSource::new("b", MockBehavior::Hit("b"));

        let resolver = MetadataResolver::with_sources(vec![a, b]);
        let book = resolver.resolve("123").await.unwrap();

        assert_eq!(book.source, "b");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }
}
