//! # Biblio Harvest
//!
//! Harvests bibliographic records for one search term from several
//! heterogeneous sources and normalizes them into a single canonical record
//! schema, appended to a JSON Lines dataset.
//!
//! ## Features
//!
//! - Brapci search API (JSON), ENANCIB proceedings (HTML table) and SciELO
//!   search (HTML cards, paginated)
//! - One canonical record shape for every source; missing fields are `null`
//! - Sources run concurrently; a failing source contributes zero records and
//!   never affects the others
//! - Input from flags, environment variables or a YAML/JSON input file
//!
//! ## Usage
//!
//! ```sh
//! biblio_harvest -q "gestão documental" --from-year 2019 -d enancib,brapci -o ./dataset
//! ```
//!
//! ## Architecture
//!
//! 1. **Configuration**: resolve the query, year bounds and databases
//! 2. **Fetching**: each source adapter queries, parses and normalizes
//! 3. **Merging**: wait for all sources, concatenate in order, drop empty records
//! 4. **Output**: append records to the dataset, write the run report

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod errors;
mod harvest;
mod html;
mod http;
mod models;
mod normalize;
mod outputs;
mod scrapers;
#[cfg(test)]
mod testutil;
mod utils;

use cli::Cli;
use harvest::Harvester;
use outputs::dataset::DatasetSink;
use outputs::json;
use scrapers::registry::SourceRegistry;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("biblio_harvest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration (fatal on error) ----
    let config = match config::load(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid run configuration");
            return Err(e.into());
        }
    };
    info!(
        term = %config.query.term,
        from_year = ?config.query.from_year,
        to_year = ?config.query.to_year,
        databases = ?config.databases,
        max_pages = config.max_pages,
        "Resolved run configuration"
    );

    // Early check: ensure the output dir is writable
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Harvest ----
    let client = http::build_client(config.source_timeout)?;
    let registry = SourceRegistry::with_defaults(&config.endpoints);
    let harvester = Harvester::new(registry, client);
    let mut sink = DatasetSink::open(&config.output_dir).await?;
    info!(path = %sink.path().display(), "Appending to dataset");

    let report = harvester.run(&config, &mut sink).await;

    for source in &report.sources {
        match &source.failure {
            Some(cause) => warn!(
                source = source.source,
                records = source.records,
                pages = source.pages,
                cancelled = source.cancelled,
                %cause,
                "Source finished with failure"
            ),
            None => info!(
                source = source.source,
                records = source.records,
                pages = source.pages,
                "Source finished"
            ),
        }
    }

    if let Err(e) = json::write_report(&report, &config.output_dir).await {
        error!(error = %e, "Failed to write run report");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        harvested = report.harvested,
        dropped = report.dropped,
        stored = report.delivery.stored,
        failed = report.delivery.failed,
        written = sink.written(),
        "Execution complete"
    );

    Ok(())
}
