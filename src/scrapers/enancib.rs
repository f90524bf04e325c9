//! ENANCIB proceedings search adapter.
//!
//! The ENANCIB conference site (an OCS install) renders advanced-search hits
//! as a plain table inside `#results`. After three header rows, results come
//! in pairs of rows:
//!
//! ```text
//! <tr> conference | title | Resumo · PDF · Download links </tr>   item row
//! <tr> author, author, ...                                  </tr>   author row
//! ```
//!
//! The record id is the trailing segment of the abstract link, e.g.
//! `.../paper/view/1234` gives `1234`.

use super::Source;
use crate::errors::FetchError;
use crate::html::{child_elements, resolve_href, selector, text_of};
use crate::http::{browser_headers, fetch_text};
use crate::models::{CanonicalRecord, SearchQuery};
use crate::normalize::{non_empty, sanitize_author_text, split_authors, trailing_segment};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

pub const ID: &str = "enancib";
pub const LABEL: &str = "Enancib";

/// Leading rows of the results table that are template headers.
pub const HEADER_ROWS: usize = 3;

static ROWS: Lazy<Selector> = Lazy::new(|| selector("#results table tbody tr"));
static LINKS: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnancibOptions {
    pub endpoint: String,
}

impl Default for EnancibOptions {
    fn default() -> Self {
        Self {
            endpoint: "https://enancib.ancib.org/index.php/enancib/xxvenancib/search/advancedResults"
                .to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Enancib {
    options: EnancibOptions,
}

impl Enancib {
    pub fn new(options: EnancibOptions) -> Self {
        Self { options }
    }

    /// Query-string parameters; year bounds only when set.
    pub fn build_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![("query", query.term.clone())];
        if let Some(year) = &query.from_year {
            params.push(("dateFromYear", year.clone()));
        }
        if let Some(year) = &query.to_year {
            params.push(("dateToYear", year.clone()));
        }
        params
    }

    /// Extract records from a results page.
    ///
    /// Rows that yield no field at all (trailing separators) are skipped.
    pub fn parse_page(&self, html: &str) -> Vec<CanonicalRecord> {
        let base = Url::parse(&self.options.endpoint).ok();
        let document = Html::parse_document(html);
        let rows: Vec<ElementRef<'_>> = document.select(&ROWS).collect();
        debug!(rows = rows.len(), "ENANCIB result rows");

        rows.get(HEADER_ROWS..)
            .unwrap_or_default()
            .chunks(2)
            .map(|pair| extract_row(pair[0], pair.get(1).copied(), base.as_ref()))
            .filter(CanonicalRecord::is_valid)
            .collect()
    }
}

/// Map one item row, and the author row following it, to a record.
fn extract_row(
    item: ElementRef<'_>,
    author: Option<ElementRef<'_>>,
    base: Option<&Url>,
) -> CanonicalRecord {
    let cells = child_elements(item, "td");
    let resolve = |href: &str| match base {
        Some(base) => resolve_href(base, href),
        None => non_empty(href),
    };

    let links: Vec<&str> = cells
        .get(2)
        .map(|cell| {
            cell.select(&LINKS)
                .filter_map(|a| a.value().attr("href"))
                .collect()
        })
        .unwrap_or_default();
    let abstract_href = links.first().copied();

    let mut record = CanonicalRecord::empty(LABEL);
    record.id = abstract_href.and_then(trailing_segment);
    record.document_url = links.get(2).copied().and_then(resolve);
    record.journal = cells.first().copied().and_then(text_of);
    record.title = cells.get(1).copied().and_then(text_of);
    record.authors = author
        .and_then(|row| child_elements(row, "td").first().copied())
        .and_then(text_of)
        .and_then(|raw| split_authors(&sanitize_author_text(&raw), ','));
    record.set_meta("abstract_pdf_url", abstract_href.and_then(resolve));
    record
}

#[async_trait]
impl Source for Enancib {
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
        let request = client
            .get(&self.options.endpoint)
            .headers(browser_headers())
            .query(&Self::build_params(query));
        let html = fetch_text(request).await?;
        let records = self.parse_page(&html);
        info!(count = records.len(), "Parsed ENANCIB results");
        Ok(records)
    }
}
