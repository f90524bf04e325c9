//! Run configuration.
//!
//! A [`RunConfig`] is resolved once, before any source is queried, from an
//! optional input file and the command line. The input file uses camelCase
//! keys:
//!
//! ```yaml
//! searchQuery: gestão documental
//! fromYear: "2019"      # string or number; "" means unbounded
//! toYear: 2024
//! databases: [enancib, brapci, scielo]
//! maxPages: 2
//! endpoints:            # optional per-source overrides
//!   brapci:
//!     endpoint: https://cip.brapci.inf.br/api/brapci/search/v3
//! ```
//!
//! JSON input works too, since it is parsed with `serde_yaml`.

use crate::cli::Cli;
use crate::errors::ConfigError;
use crate::models::SearchQuery;
use crate::scrapers::registry::SourceOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Databases searched when neither the CLI nor the input file names any.
pub const DEFAULT_DATABASES: &[&str] = &["enancib", "brapci"];

/// Contents of an input file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunInput {
    pub search_query: Option<String>,
    pub from_year: Option<YearInput>,
    pub to_year: Option<YearInput>,
    pub databases: Option<Vec<String>>,
    pub max_pages: Option<u32>,
    pub endpoints: SourceOptions,
}

/// A year bound as written in the input file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum YearInput {
    Number(i64),
    Text(String),
}

/// Everything a harvest run needs, resolved and validated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub query: SearchQuery,
    /// Enabled source ids, in harvest order.
    pub databases: Vec<String>,
    /// Page bound for paginated sources.
    pub max_pages: u32,
    /// Budget for each request.
    pub source_timeout: Duration,
    /// Budget for the whole harvest.
    pub deadline: Option<Duration>,
    pub output_dir: String,
    pub endpoints: SourceOptions,
}

/// Read and parse an input file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_input(path: &Path) -> Result<RunInput, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::ReadInput {
            path: path.to_path_buf(),
            source,
        })?;
    let input = serde_yaml::from_str(&raw).map_err(|source| ConfigError::ParseInput {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded input file");
    Ok(input)
}

/// Load the input file named by `--input`, if any, and merge it with `cli`.
pub async fn load(cli: &Cli) -> Result<RunConfig, ConfigError> {
    let input = match &cli.input {
        Some(path) => load_input(path).await?,
        None => RunInput::default(),
    };
    resolve(cli, input)
}

/// Merge CLI values over `input` and validate the result.
pub fn resolve(cli: &Cli, input: RunInput) -> Result<RunConfig, ConfigError> {
    let term = cli
        .query
        .as_deref()
        .or(input.search_query.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingQuery)?;

    let from_year = year_bound(cli.from_year.as_deref(), input.from_year.as_ref())?;
    let to_year = year_bound(cli.to_year.as_deref(), input.to_year.as_ref())?;

    let databases = cli
        .databases
        .clone()
        .or(input.databases)
        .unwrap_or_else(|| DEFAULT_DATABASES.iter().map(|s| s.to_string()).collect())
        .into_iter()
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    Ok(RunConfig {
        query: SearchQuery::new(term, from_year.as_deref(), to_year.as_deref()),
        databases,
        max_pages: cli.max_pages.or(input.max_pages).unwrap_or(1).max(1),
        source_timeout: Duration::from_secs(cli.timeout_secs.max(1)),
        deadline: cli.deadline_secs.map(Duration::from_secs),
        output_dir: cli.output_dir.clone(),
        endpoints: input.endpoints,
    })
}

/// CLI value if given, else the file value. Blank means unbounded; anything
/// else must be numeric.
fn year_bound(cli: Option<&str>, file: Option<&YearInput>) -> Result<Option<String>, ConfigError> {
    let raw = match (cli, file) {
        (Some(y), _) => y.trim().to_string(),
        (None, Some(YearInput::Text(y))) => y.trim().to_string(),
        (None, Some(YearInput::Number(n))) => n.to_string(),
        (None, None) => return Ok(None),
    };
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>()
        .map(|_| Some(raw.clone()))
        .map_err(|_| ConfigError::InvalidYear(raw))
}
