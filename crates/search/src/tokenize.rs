use std::collections::HashSet;

const MIN_TOKEN_LEN: usize = 2;

/// Lower-cased query terms: split on anything outside `[a-z0-9_-]`, drop terms shorter than two
/// characters, de-duplicate keeping first-seen order.
#[must_use]
pub fn tokenize(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut seen = HashSet::new();
    lowered
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'))
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}

/// Terms a query token may match in `text`: every term [`tokenize`] yields, plus the `-`/`_`
/// separated parts of compound terms, so `auth` matches `auth-flow` but `ui` never matches
/// `build`.
#[must_use]
pub fn word_set(text: &str) -> HashSet<String> {
    let mut words = HashSet::new();
    for term in tokenize(text) {
        if term.contains(is_joiner) {
            words.extend(
                term.split(is_joiner)
                    .filter(|part| part.len() >= MIN_TOKEN_LEN)
                    .map(str::to_string),
            );
        }
        words.insert(term);
    }
    words
}

fn is_joiner(c: char) -> bool {
    c == '-' || c == '_'
}

/// Number of whitespace-separated words, the unit of every budget.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
