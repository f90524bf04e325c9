//! Source adapters for the bibliographic databases we harvest.
//!
//! Each adapter implements [`Source`] and follows the same three steps:
//!
//! 1. **Request**: build the source-specific query (form payload or query string)
//! 2. **Parse**: decode JSON or walk the HTML tree
//! 3. **Normalize**: map every entry into a [`CanonicalRecord`], once
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Brapci | [`brapci`] | JSON search API (POST form) | Ranked; legend parsed for volume/number |
//! | ENANCIB | [`enancib`] | HTML results table | Item/author row pairs after 3 header rows |
//! | SciELO | [`scielo`] | HTML result cards | Paginated; positional card layout |
//!
//! # Common Patterns
//!
//! Adapters are looked up by id through the [`registry::SourceRegistry`], so
//! adding a source means implementing [`Source`] and registering it.
//!
//! `fetch` performs exactly one request. Failures come back as a
//! [`FetchError`]; the orchestrator logs them and treats the source as having
//! returned nothing. A search with zero hits is `Ok(vec![])`, not an error.

pub mod brapci;
pub mod enancib;
pub mod registry;
pub mod scielo;

use crate::errors::FetchError;
use crate::models::{CanonicalRecord, SearchQuery};
use async_trait::async_trait;
use reqwest::Client;

/// One external bibliographic source.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Registry key used in configuration, e.g. `"brapci"`.
    fn id(&self) -> &'static str;

    /// Value written into [`CanonicalRecord::database`], e.g. `"Brapci"`.
    fn label(&self) -> &'static str;

    /// Whether `fetch` honors the `page` argument.
    fn paginated(&self) -> bool {
        false
    }

    /// Fetch one page of results and normalize them.
    ///
    /// Non-paginated sources ignore `page`.
    async fn fetch(
        &self,
        client: &Client,
        query: &SearchQuery,
        page: u32,
    ) -> Result<Vec<CanonicalRecord>, FetchError>;
}
