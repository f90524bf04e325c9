//! SciELO search results adapter.
//!
//! [SciELO Search](https://search.scielo.org) renders each hit as a card
//! (`div.results > div.item`). The card layout carries no semantic markup
//! for most bibliographic fields, so they are read by position: the Nth
//! `span` of the card's `.source` line is the year, another the volume, and
//! so on. All of that positional knowledge lives in [`extract_card`] and the
//! index constants above it; the fixture test pins the template they match.
//!
//! # Pagination
//!
//! One `fetch` returns one page of `page_size` hits. Page `p` starts at hit
//! `(p - 1) * page_size + 1`.

use super::Source;
use crate::errors::FetchError;
use crate::html::{child_elements, nth_attr, nth_text, selector, text_of};
use crate::http::{browser_headers, fetch_text};
use crate::models::{CanonicalRecord, SearchQuery};
use crate::normalize::{non_empty, split_authors};
use async_trait::async_trait;
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{info, instrument, warn};

pub const ID: &str = "scielo";
pub const LABEL: &str = "Scielo";

static CARDS: Lazy<Selector> = Lazy::new(|| selector("div.results > div.item"));
static TITLE_LINK: Lazy<Selector> = Lazy::new(|| selector(".line a"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector(".line a strong"));
static AUTHORS: Lazy<Selector> = Lazy::new(|| selector(".authors"));
static AUTHOR_LINKS: Lazy<Selector> = Lazy::new(|| selector("a.author"));
static SOURCE_SPANS: Lazy<Selector> = Lazy::new(|| selector(".source span"));
static DOI_LINK: Lazy<Selector> = Lazy::new(|| selector(".metadata .DOIResults a"));

// Card template positions.
const BODY_DIV: usize = 2;
const JOURNAL_SPAN: usize = 1;
const MONTH_SPAN: usize = 2;
const YEAR_SPAN: usize = 3;
const VOLUME_SPAN: usize = 5;
const NUMBER_SPAN: usize = 7;
const ELOCATION_SPAN: usize = 9;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScieloOptions {
    pub base_url: String,
    pub page_size: u32,
    pub lang: String,
    pub subject_area: String,
}

impl Default for ScieloOptions {
    fn default() -> Self {
        Self {
            base_url: "https://search.scielo.org/".to_string(),
            page_size: 100,
            lang: "pt".to_string(),
            subject_area: "Applied Social Sciences".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Scielo {
    options: ScieloOptions,
}

/// Index of the first hit on `page` (1-based). Saturates instead of
/// overflowing for oversized pages.
pub fn page_offset(page: u32, page_size: u32) -> u32 {
    (page.max(1) - 1).saturating_mul(page_size).saturating_add(1)
}

impl Scielo {
    pub fn new(options: ScieloOptions) -> Self {
        Self { options }
    }

    /// Full search URL for one page of `query`.
    ///
    /// SciELO's listing has no year filter in this query form, so year bounds
    /// are not sent.
    pub fn search_url(&self, query: &SearchQuery, page: u32) -> String {
        let o = &self.options;
        let page = page.max(1);
        format!(
            "{base}?fb=&q={q}&lang={lang}&count={count}&from={from}&output=site&sort=&format=summary&page={page}&where=&filter%5Bla%5D%5B%5D=*&filter%5Bsubject_area%5D%5B%5D={subject}",
            base = o.base_url,
            q = urlencoding::encode(&query.term),
            lang = urlencoding::encode(&o.lang),
            count = o.page_size,
            from = page_offset(page, o.page_size),
            subject = urlencoding::encode(&o.subject_area),
        )
    }

    pub fn parse_page(&self, html: &str) -> Vec<CanonicalRecord> {
        let document = Html::parse_document(html);
        document.select(&CARDS).map(extract_card).collect()
    }
}

/// Map one result card to a record. Only this function knows the card layout.
pub fn extract_card(card: ElementRef<'_>) -> CanonicalRecord {
    let mut record = CanonicalRecord::empty(LABEL);
    record.id = card.value().attr("id").and_then(non_empty);

    let Some(body) = child_elements(card, "div").get(BODY_DIV).copied() else {
        warn!(id = ?record.id, "SciELO card has no body div; template changed?");
        return record;
    };

    let span = |n: usize| nth_text(body, &SOURCE_SPANS, n);
    let month = span(MONTH_SPAN);
    let year = span(YEAR_SPAN);

    record.document_url = nth_attr(body, &TITLE_LINK, 0, "href");
    record.title = nth_text(body, &TITLE, 0);
    record.authors = body.select(&AUTHORS).next().and_then(card_authors);
    record.journal = span(JOURNAL_SPAN);
    record.publication_year = year.clone();

    record.set_meta("doi_url", nth_attr(body, &DOI_LINK, 0, "href"));
    record.set_meta(
        "publication_date",
        non_empty(&[month, year].into_iter().flatten().join(" ")),
    );
    record.set_meta("volume", span(VOLUME_SPAN));
    record.set_meta("number", span(NUMBER_SPAN));
    record.set_meta("elocation", span(ELOCATION_SPAN));
    record
}

/// Author names from the linked `a.author` elements, or from the line's
/// text split on `;` when the names are not linked.
fn card_authors(line: ElementRef<'_>) -> Option<Vec<String>> {
    let linked: Vec<String> = line.select(&AUTHOR_LINKS).filter_map(text_of).collect();
    if !linked.is_empty() {
        return Some(linked);
    }
    text_of(line).and_then(|text| split_authors(&text, ';'))
}

#[async_trait]
impl Source for Scielo {
    fn id(&self) -> &'static str {
        ID
    }

    fn label(&self) -> &'static str {
        LABEL
    }

    fn paginated(&self) -> bool {
        true
    }

    #[instrument(level = "info", skip_all, fields(source = ID, term = %query.term, page = page))]
    async fn fetch(
        &self,
        client: &Client,
        query: &SearchQuery,
        page: u32,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        let url = self.search_url(query, page);
        let html = fetch_text(client.get(&url).headers(browser_headers())).await?;
        let records = self.parse_page(&html);
        info!(count = records.len(), "Parsed SciELO results");
        Ok(records)
    }
}
