//! Source lookup by configuration id.

use super::brapci::{Brapci, BrapciOptions};
use super::enancib::{Enancib, EnancibOptions};
use super::scielo::{Scielo, ScieloOptions};
use super::Source;
use itertools::Itertools;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-source endpoint overrides, read from the `endpoints` block of the
/// input file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    pub brapci: BrapciOptions,
    pub enancib: EnancibOptions,
    pub scielo: ScieloOptions,
}

/// Known sources, in registration order.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in source.
    pub fn with_defaults(options: &SourceOptions) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Brapci::new(options.brapci.clone())));
        registry.register(Arc::new(Enancib::new(options.enancib.clone())));
        registry.register(Arc::new(Scielo::new(options.scielo.clone())));
        registry
    }

    /// Add a source, replacing any source already registered under its id.
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter().position(|s| s.id() == source.id()) {
            Some(i) => self.sources[i] = source,
            None => self.sources.push(source),
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Source>> {
        let id = id.trim();
        self.sources
            .iter()
            .find(|s| s.id().eq_ignore_ascii_case(id))
            .cloned()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// Sources for `names`, in the given order, without duplicates.
    /// Unknown names are logged and skipped.
    pub fn resolve(&self, names: &[String]) -> Vec<Arc<dyn Source>> {
        names
            .iter()
            .filter_map(|name| {
                let source = self.get(name);
                if source.is_none() {
                    warn!(database = %name, known = ?self.ids(), "Unknown database; ignoring");
                }
                source
            })
            .unique_by(|s| s.id())
            .inspect(|s| debug!(source = s.id(), "Source enabled"))
            .collect()
    }
}
