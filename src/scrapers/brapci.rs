//! Brapci search API adapter.
//!
//! [Brapci](https://brapci.inf.br) exposes a JSON search endpoint that takes a
//! form-encoded POST. Works come back ranked, with most bibliographic detail
//! packed into a `data` object and a citation `LEGEND` such as
//! `"AtoZ: Novas Práticas em Informação e Conhecimento, v. 10, n. 3, 2021"`.
//!
//! # Request
//!
//! `year_start` / `year_end` are only sent when the bound is set. The API reads
//! an empty `year_start` as a literal constraint, not as "no filter".

use super::Source;
use crate::errors::FetchError;
use crate::http::fetch_text;
use crate::models::{CanonicalRecord, Keywords, SearchQuery};
use crate::normalize::{parse_legend, split_authors, value_to_f64, value_to_string};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

pub const ID: &str = "brapci";
pub const LABEL: &str = "Brapci";

/// Endpoint and fixed request tokens.
///
/// `session` and `offset` are opaque tokens the web client sends verbatim;
/// they are kept configurable rather than derived from the query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrapciOptions {
    pub endpoint: String,
    /// Prefix joined with a work id to build `document_url`.
    pub viewer_base: String,
    pub session: String,
    pub field: String,
    pub collection: String,
    pub api_version: String,
    pub offset: String,
}

impl Default for BrapciOptions {
    fn default() -> Self {
        Self {
            endpoint: "https://cip.brapci.inf.br/api/brapci/search/v3".to_string(),
            viewer_base: "https://brapci.inf.br/v/".to_string(),
            session: "sc_1750462286528".to_string(),
            field: "FL".to_string(),
            collection: "JA,JE,EV,BK".to_string(),
            api_version: "3".to_string(),
            offset: "15".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: Value,
    /// Kept loose so one odd entry cannot fail the whole body.
    #[serde(default)]
    works: Value,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(default)]
    id: Value,
    #[serde(default, rename = "type")]
    kind: Value,
    #[serde(default)]
    year: Value,
    #[serde(default)]
    score: Value,
    /// An object when populated; the API sends `[]` or nothing otherwise.
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default)]
pub struct Brapci {
    options: BrapciOptions,
}

impl Brapci {
    pub fn new(options: BrapciOptions) -> Self {
        Self { options }
    }

    /// Form fields for one search, in the order the web client sends them.
    pub fn build_form(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let o = &self.options;
        let mut form = vec![
            ("user", String::new()),
            ("session", o.session.clone()),
            ("term", query.term.clone()),
        ];
        if let Some(year) = &query.from_year {
            form.push(("year_start", year.clone()));
        }
        if let Some(year) = &query.to_year {
            form.push(("year_end", year.clone()));
        }
        form.extend([
            ("field", o.field.clone()),
            ("collection", o.collection.clone()),
            ("api_version", o.api_version.clone()),
            ("offset", o.offset.clone()),
        ]);
        form
    }

    /// Decode a search response body into canonical records.
    pub fn parse_response(&self, body: &str) -> Result<Vec<CanonicalRecord>, FetchError> {
        let response: SearchResponse = serde_json::from_str(body)?;
        if value_to_f64(&response.total) == Some(0.0) {
            debug!("Brapci reported zero results");
            return Ok(Vec::new());
        }

        let entries = response.works.as_array().map(Vec::as_slice).unwrap_or_default();
        let records = entries
            .iter()
            .filter_map(|entry| match Work::deserialize(entry) {
                Ok(work) => Some(work),
                Err(e) => {
                    debug!(error = %e, "Skipping malformed work entry");
                    None
                }
            })
            .filter_map(|work| match work.data.as_object() {
                Some(data) if !data.is_empty() => Some(self.normalize_work(&work, data)),
                _ => None,
            })
            .collect();
        Ok(records)
    }

    fn normalize_work(&self, work: &Work, data: &Map<String, Value>) -> CanonicalRecord {
        let text = |key: &str| data.get(key).and_then(value_to_string);

        let id = value_to_string(&work.id);
        let legend = text("LEGEND");
        let parts = legend.as_deref().map(parse_legend).unwrap_or_default();
        let year = value_to_string(&work.year).or(parts.year);

        let mut record = CanonicalRecord::empty(LABEL);
        record.document_url = id
            .as_ref()
            .map(|id| format!("{}{}", self.options.viewer_base, id));
        record.id = id;
        record.document_type = value_to_string(&work.kind);
        record.session = text("SESSION");
        record.publication_year = year.clone();
        record.authors = data.get("AUTHORS").and_then(authors_from);
        record.journal = text("JOURNAL");
        record.keywords = data.get("KEYWORDS").and_then(keywords_from);
        record.title = text("TITLE");
        record.legend = legend;
        record.cover = text("cover");
        record.relevance_score = value_to_f64(&work.score);

        record.set_meta("idj", text("IDJ"));
        record.set_meta("id_jnl", text("id_jnl"));
        record.set_meta("issue", text("ISSUE"));
        record.set_meta("year", year);
        record.set_meta("publication_volume", parts.volume);
        record.set_meta("publication_number", parts.number);
        record
    }
}

fn authors_from(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => split_authors(s, ','),
        Value::Array(items) => {
            let authors: Vec<String> = items.iter().filter_map(value_to_string).collect();
            if authors.is_empty() { None } else { Some(authors) }
        }
        _ => None,
    }
}

fn keywords_from(value: &Value) -> Option<Keywords> {
    match value {
        Value::Array(items) => {
            let list: Vec<String> = items.iter().filter_map(value_to_string).collect();
            if list.is_empty() { None } else { Some(Keywords::List(list)) }
        }
        other => value_to_string(other).map(Keywords::Text),
    }
}

#[async_trait]
impl Source for Brapci {
    fn id(&self) -> &'static str {
        ID
    }

    fn label(&self) -> &'static str {
        LABEL
    }

    #[instrument(level = "info", skip_all, fields(source = ID, term = %query.term))]
    async fn fetch(
        &self,
        client: &Client,
        query: &SearchQuery,
        _page: u32,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        let form = self.build_form(query);
        let body = fetch_text(client.post(&self.options.endpoint).form(&form)).await?;
        let records = self.parse_response(&body)?;
        info!(count = records.len(), "Parsed Brapci works");
        Ok(records)
    }
}
