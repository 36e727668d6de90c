//! Database access for biblio-api

pub mod books;
pub mod categories;
pub mod users;

/// Escape `%`, `_` and the escape character itself for a LIKE pattern
/// bound with `ESCAPE '\'`.
pub(crate) fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_handles_wildcards() {
        assert_eq!(escape_like("100% _real_"), "100\\% \\_real\\_");
        assert_eq!(escape_like("plain title"), "plain title");
    }
}
