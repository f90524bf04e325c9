//! Data models shared by every source adapter.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SearchQuery`]: The query term and optional year bounds sent to each source
//! - [`CanonicalRecord`]: The one record shape every adapter emits
//! - [`Keywords`]: Keywords as a single string or as a list, depending on the source
//!
//! Field names are snake_case on the wire too, matching the dataset schema
//! consumed downstream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What to search for, shared by every source in a harvest run.
///
/// Year bounds are `None` when unbounded. Empty or blank strings are folded
/// into `None` by [`SearchQuery::new`], so adapters never have to tell an
/// unset bound apart from an empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// The free-text search term.
    pub term: String,
    /// Lower publication-year bound, inclusive.
    pub from_year: Option<String>,
    /// Upper publication-year bound, inclusive.
    pub to_year: Option<String>,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>, from_year: Option<&str>, to_year: Option<&str>) -> Self {
        let bound = |y: Option<&str>| {
            y.map(str::trim)
                .filter(|y| !y.is_empty())
                .map(str::to_string)
        };
        Self {
            term: term.into(),
            from_year: bound(from_year),
            to_year: bound(to_year),
        }
    }
}

/// Keywords as reported by the source: either one delimited string or a list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Keywords {
    Text(String),
    List(Vec<String>),
}

/// A harvested work in the canonical schema.
///
/// Every field except `database` may be `None`, and every field is always
/// serialized (as `null` when absent). `metadata` holds source-specific
/// extras; it is a `BTreeMap` so serialization order is stable.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CanonicalRecord {
    /// Source-native identifier, unique within `database`.
    pub id: Option<String>,
    /// Source-reported document type (e.g. "article").
    pub document_type: Option<String>,
    /// Absolute link to the work.
    pub document_url: Option<String>,
    /// Source-specific grouping tag.
    pub session: Option<String>,
    pub publication_year: Option<String>,
    /// Ordered, trimmed, non-empty author names.
    pub authors: Option<Vec<String>>,
    pub journal: Option<String>,
    pub keywords: Option<Keywords>,
    pub title: Option<String>,
    /// Raw citation string, e.g. "AtoZ, v. 10, n. 3, 2021".
    pub legend: Option<String>,
    pub cover: Option<String>,
    /// Only meaningful for ranked sources.
    pub relevance_score: Option<f64>,
    /// Label of the adapter that produced this record.
    pub database: String,
    /// Open extension bag for fields without a canonical slot.
    pub metadata: BTreeMap<String, Value>,
}

impl CanonicalRecord {
    /// An all-null record attributed to `database`.
    pub fn empty(database: &str) -> Self {
        Self {
            id: None,
            document_type: None,
            document_url: None,
            session: None,
            publication_year: None,
            authors: None,
            journal: None,
            keywords: None,
            title: None,
            legend: None,
            cover: None,
            relevance_score: None,
            database: database.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    /// Whether the record carries anything besides its `database` label.
    ///
    /// Records that fail this check are dropped before they reach the sink.
    pub fn is_valid(&self) -> bool {
        self.id.is_some()
            || self.document_type.is_some()
            || self.document_url.is_some()
            || self.session.is_some()
            || self.publication_year.is_some()
            || self.authors.is_some()
            || self.journal.is_some()
            || self.keywords.is_some()
            || self.title.is_some()
            || self.legend.is_some()
            || self.cover.is_some()
            || self.relevance_score.is_some()
            || self.metadata.values().any(|v| !v.is_null())
    }

    /// Insert a metadata entry, storing `null` when the value is absent.
    pub fn set_meta(&mut self, key: &str, value: Option<String>) {
        let value = value.map(Value::String).unwrap_or(Value::Null);
        self.metadata.insert(key.to_string(), value);
    }
}
