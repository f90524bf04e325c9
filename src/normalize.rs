//! Field normalization rules shared by the source adapters.
//!
//! Every adapter maps its raw fields into a [`crate::models::CanonicalRecord`]
//! exactly once, at extraction time. The helpers here encode the common rules:
//!
//! - an absent or blank source field becomes `None`, never `""`
//! - author lists are ordered, trimmed and free of empty names, or `None`
//! - derived fields come from bounded splits and degrade to `None` on
//!   malformed input instead of failing the record

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NON_AUTHOR_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9, ]").expect("static regex"));

/// Trim `s`; blank input becomes `None`.
pub fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Render a JSON scalar as a string. Strings are trimmed, numbers are printed
/// as-is, anything else is `None`.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a JSON scalar as a float; numeric strings are accepted.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Split an author string on `delimiter`, trimming names and dropping empty
/// ones. Returns `None` when no name survives.
pub fn split_authors(raw: &str, delimiter: char) -> Option<Vec<String>> {
    let authors: Vec<String> = raw
        .split(delimiter)
        .filter_map(non_empty)
        .collect();
    if authors.is_empty() { None } else { Some(authors) }
}

/// Strip every character outside `[A-Za-z0-9, ]`.
pub fn sanitize_author_text(raw: &str) -> String {
    NON_AUTHOR_CHARS.replace_all(raw, "").into_owned()
}

/// Last non-empty path segment of a link, without query or fragment.
///
/// `https://host/index.php/x/article/view/1234` gives `1234`.
pub fn trailing_segment(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(non_empty)
}

/// Sub-fields recovered from a citation legend.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LegendParts {
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub year: Option<String>,
}

/// Parse a legend such as `"AtoZ: Novas Práticas, v. 10, n. 3, 2021"`.
///
/// The first comma-separated segment is the journal. The remaining segments
/// are scanned token by token for a `v.` volume, an `n.` number and a
/// four-digit year, so both `"v. 10, n. 3, 2021"` and `"v. 10 n. 3 2021"`
/// work. Whatever is not found stays `None`.
pub fn parse_legend(legend: &str) -> LegendParts {
    let mut segments = legend.split(',');
    let mut parts = LegendParts {
        journal: segments.next().and_then(non_empty),
        ..LegendParts::default()
    };

    let tokens: Vec<&str> = segments.flat_map(str::split_whitespace).collect();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let slot = if let Some(rest) = token.strip_prefix("v.") {
            Some((&mut parts.volume, rest))
        } else if let Some(rest) = token.strip_prefix("n.") {
            Some((&mut parts.number, rest))
        } else {
            None
        };

        match slot {
            Some((field, rest)) => {
                let value = if rest.is_empty() {
                    i += 1;
                    tokens.get(i).copied()
                } else {
                    Some(rest)
                };
                if field.is_none() {
                    *field = value.and_then(non_empty);
                }
            }
            None if parts.year.is_none() && is_year(token) => {
                parts.year = Some(token.to_string());
            }
            None => {}
        }
        i += 1;
    }
    parts
}

fn is_year(token: &str) -> bool {
    token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit())
}
