//! Text similarity heuristic for import matching
//!
//! A cheap bag-of-words comparison, not an edit-distance metric. It only
//! pre-filters import suggestions that a person reviews before anything is
//! persisted, so false positives are acceptable.

/// Normalize a string for comparison: lowercase, fold Latin diacritics,
/// keep only alphanumerics and spaces, trim.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        for folded in fold_diacritic(c) {
            let lower = folded.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() || lower == ' ' {
                out.push(lower);
            }
        }
    }
    out.trim().to_string()
}

/// Decompose the Latin accented characters that show up in book metadata to
/// their base letters, matching NFD-plus-strip-marks behavior for this
/// repertoire.
fn fold_diacritic(c: char) -> impl Iterator<Item = char> {
    let folded = match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' | 'Á' | 'À' | 'Ä' | 'Â' | 'Ã' | 'Å' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' | 'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        'ý' | 'ÿ' | 'Ý' => 'y',
        other => other,
    };
    std::iter::once(folded)
}

/// Similarity of two strings in `[0, 1]`.
///
/// Exact match after normalization scores 1.0; an empty side scores 0.0;
/// substring containment either way scores a fixed 0.8 (a deliberate
/// simplification, not proportional to length); otherwise the score is the
/// fraction of words (longer than two characters) of one string contained
/// in or containing a word of the other, over the larger word count.
pub fn similarity(a: &str, b: &str) -> f64 {
    let s1 = normalize_text(a);
    let s2 = normalize_text(b);

    if s1 == s2 {
        return if s1.is_empty() { 0.0 } else { 1.0 };
    }
    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }
    if s1.contains(&s2) || s2.contains(&s1) {
        return 0.8;
    }

    let words1: Vec<&str> = s1.split_whitespace().collect();
    let words2: Vec<&str> = s2.split_whitespace().collect();

    let match_count = words1
        .iter()
        .filter(|word| {
            word.len() > 2
                && words2
                    .iter()
                    .any(|other| other.contains(**word) || word.contains(*other))
        })
        .count();

    match_count as f64 / words1.len().max(words2.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_ignores_case_and_diacritics() {
        assert_eq!(similarity("Cien años de soledad", "cien anos de soledad"), 1.0);
    }

    #[test]
    fn empty_side_scores_zero() {
        assert_eq!(similarity("Harry Potter", ""), 0.0);
        assert_eq!(similarity("", "Harry Potter"), 0.0);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn substring_containment_scores_fixed_constant() {
        assert_eq!(similarity("The Hobbit", "Hobbit"), 0.8);
        assert_eq!(similarity("Hobbit", "The Hobbit"), 0.8);
    }

    #[test]
    fn punctuation_stripped_before_comparison() {
        assert_eq!(similarity("¿Qué es la vida?", "que es la vida"), 1.0);
    }

    #[test]
    fn word_overlap_is_proportional() {
        // "harry" and "potter" match, "azkaban" does not; 2 matches over
        // max(3, 4) words
        let score = similarity(
            "Harry Potter Azkaban",
            "Harry Potter and the Goblet",
        );
        assert!((score - 2.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn short_words_do_not_count() {
        // Every shared word is <= 2 chars
        assert_eq!(similarity("el la de", "la de un"), 0.0);
    }

    #[test]
    fn normalize_folds_enye() {
        assert_eq!(normalize_text("Años"), "anos");
        assert_eq!(normalize_text("  ¡Ñandú!  "), "nandu");
    }
}
