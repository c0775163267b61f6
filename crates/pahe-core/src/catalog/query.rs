//! Search query parsing: the `(Dub)` / `(Sub)` suffix convention.

use super::AnimeSummary;

/// Audio preference expressed by a `(Dub)` or `(Sub)` query suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguagePreference {
    Dub,
    Sub,
}

impl std::fmt::Display for LanguagePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LanguagePreference::Dub => f.write_str("DUB"),
            LanguagePreference::Sub => f.write_str("SUB"),
        }
    }
}

/// Splits a raw query into the title to search for and an optional language
/// preference. The suffix match is case-insensitive and only applies at the
/// end of the query.
///
/// - `"Jujutsu Kaisen (Dub)"` → `("Jujutsu Kaisen", Some(Dub))`
/// - `"Jujutsu Kaisen"` → `("Jujutsu Kaisen", None)`
pub fn parse_search_query(raw: &str) -> (String, Option<LanguagePreference>) {
    let query = raw.trim();
    for (suffix, pref) in [("(dub)", LanguagePreference::Dub), ("(sub)", LanguagePreference::Sub)] {
        if query.len() >= suffix.len() {
            let split = query.len() - suffix.len();
            if query.is_char_boundary(split) && query[split..].eq_ignore_ascii_case(suffix) {
                return (query[..split].trim().to_string(), Some(pref));
            }
        }
    }
    (query.to_string(), None)
}

/// Applies a language preference to search results.
///
/// `Dub` keeps titles containing "dub"; `Sub` drops them. When the filter
/// would remove everything, the original list is returned unchanged.
pub fn filter_by_language(
    results: Vec<AnimeSummary>,
    pref: Option<LanguagePreference>,
) -> Vec<AnimeSummary> {
    let Some(pref) = pref else {
        return results;
    };
    let filtered: Vec<AnimeSummary> = results
        .iter()
        .filter(|r| match pref {
            LanguagePreference::Dub => r.is_dub(),
            LanguagePreference::Sub => !r.is_dub(),
        })
        .cloned()
        .collect();
    if filtered.is_empty() {
        results
    } else {
        filtered
    }
}
