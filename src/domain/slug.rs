//! Slugs used in public detail URLs.
//!
//! Detail pages live at `/{listing}/{slug}/{id}`. The id is authoritative; the
//! slug is derived from the title and checked on every request so stale or
//! hand-edited links resolve to a 404 instead of the wrong record.

use slug::slugify;
use thiserror::Error;

const FALLBACK_SLUG: &str = "untitled";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a slug from a human-readable title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(strip_parenthesized(input));
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Slug for a listed record; titles without a representable slug share a fixed one.
pub fn listing_slug(title: &str) -> String {
    derive_slug(title).unwrap_or_else(|_| FALLBACK_SLUG.to_string())
}

/// Path of a record's detail page.
pub fn detail_path(listing: &str, title: &str, id: i64) -> String {
    format!("/{listing}/{}/{id}", listing_slug(title))
}

/// Slug for a facet name used as a filter value, e.g. `North America` -> `north-america`.
pub fn facet_name_slug(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Title as advertised in sitemap image entries: whitespace runs become `+`, then
/// the result is percent-encoded.
pub fn seo_title(title: &str) -> String {
    let joined = title.split_whitespace().collect::<Vec<_>>().join("+");
    url::form_urlencoded::byte_serialize(joined.as_bytes()).collect()
}

fn strip_parenthesized(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut depth = 0usize;
    for ch in input.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => {
                depth -= 1;
                output.push(' ');
            }
            _ if depth == 0 => output.push(ch),
            _ => {}
        }
    }
    // An unbalanced `(` keeps its tail rather than swallowing the rest of the title.
    if depth > 0 {
        return input.to_string();
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        assert_eq!(
            derive_slug("ETHGlobal: Brussels 2024!").expect("slug"),
            "ethglobal-brussels-2024"
        );
    }

    #[test]
    fn derive_slug_drops_parenthesized_text() {
        assert_eq!(
            derive_slug("Solana Hacker House (Online)").expect("slug"),
            "solana-hacker-house"
        );
        assert_eq!(
            derive_slug("Unbalanced (paren").expect("slug"),
            "unbalanced-paren"
        );
    }

    #[test]
    fn empty_titles_fall_back() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
        assert_eq!(listing_slug("!!!"), "untitled");
        assert_eq!(detail_path("jobs", "", 4), "/jobs/untitled/4");
    }

    #[test]
    fn facet_names_keep_punctuation() {
        assert_eq!(facet_name_slug("North  America"), "north-america");
        assert_eq!(facet_name_slug("DeFi"), "defi");
    }

    #[test]
    fn seo_title_escapes_plus_joined_words() {
        assert_eq!(seo_title("Build on Base"), "Build%2Bon%2BBase");
        assert_eq!(seo_title("A&B"), "A%26B");
    }
}
