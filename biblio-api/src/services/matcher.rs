//! Fuzzy matching of spreadsheet rows against external search results
//!
//! Import rows only carry a title and an author, so the matcher searches
//! Google Books by keyword and scores every candidate against the row.
//! Scoring is pure and separated from the network search so it can be
//! exercised directly.

use anyhow::Result;

use super::google_books::GoogleBooksClient;
use super::similarity::similarity;
use super::ResolvedBook;

/// A candidate's author must reach this similarity before its title is
/// even considered. Keeps homonymous titles by other authors out.
const AUTHOR_GATE: f64 = 0.5;
/// Weighted acceptance threshold for the combined score.
const ACCEPT_THRESHOLD: f64 = 0.5;
const TITLE_WEIGHT: f64 = 0.6;
const AUTHOR_WEIGHT: f64 = 0.4;

/// Outcome of matching one import row.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Found {
        book: ResolvedBook,
        confidence: f64,
    },
    NotFound {
        reason: String,
    },
}

/// Score every candidate and pick the best acceptable one.
///
/// Candidates whose author falls under the gate are rejected outright but
/// remembered, so a miss can explain what the closest rejected result was.
pub fn best_match(title: &str, author: &str, candidates: &[ResolvedBook]) -> MatchOutcome {
    if candidates.is_empty() {
        return MatchOutcome::NotFound {
            reason: "no search results".to_string(),
        };
    }

    let mut best: Option<(f64, &ResolvedBook)> = None;
    let mut best_rejected: Option<(f64, &ResolvedBook)> = None;

    for candidate in candidates {
        let title_sim = similarity(title, &candidate.title);
        let author_sim = similarity(author, &candidate.author);
        let score = TITLE_WEIGHT * title_sim + AUTHOR_WEIGHT * author_sim;

        if author_sim < AUTHOR_GATE {
            if best_rejected.map_or(true, |(s, _)| score > s) {
                best_rejected = Some((score, candidate));
            }
            continue;
        }

        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, candidate));
        }
    }

    match best {
        Some((score, candidate)) if score >= ACCEPT_THRESHOLD => MatchOutcome::Found {
            book: candidate.clone(),
            confidence: score,
        },
        Some((score, candidate)) => MatchOutcome::NotFound {
            reason: format!(
                "best candidate \"{}\" by {} scored {:.2}, below threshold",
                candidate.title, candidate.author, score
            ),
        },
        None => match best_rejected {
            Some((_, candidate)) => MatchOutcome::NotFound {
                reason: format!(
                    "closest result \"{}\" is by {}, author mismatch",
                    candidate.title, candidate.author
                ),
            },
            None => MatchOutcome::NotFound {
                reason: "no search results".to_string(),
            },
        },
    }
}

/// Search Google Books for a row's title and author and match the results.
/// Search failures degrade to a miss with the error in the reason.
pub async fn find_match(
    client: &GoogleBooksClient,
    title: &str,
    author: &str,
) -> Result<MatchOutcome> {
    let query = format!("{} {}", title, author);
    let candidates = match client.search(query.trim()).await {
        Ok(candidates) => candidates,
        Err(err) => {
            tracing::warn!(title = %title, error = %err, "Search failed during match");
            return Ok(MatchOutcome::NotFound {
                reason: format!("search failed: {}", err),
            });
        }
    };

    let outcome = best_match(title, author, &candidates);
    if let MatchOutcome::Found { book, confidence } = &outcome {
        tracing::debug!(
            title = %title,
            matched = %book.title,
            confidence = %format!("{:.2}", confidence),
            "Matched import row"
        );
    }

    Ok(outcome)
}
