//! Command-line interface definitions for the harvester.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Search arguments can also come from an input file (`--input`); flags and
//! environment variables win over the file.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one harvest run.
///
/// # Examples
///
/// ```sh
/// # Search the default databases (ENANCIB, Brapci)
/// biblio_harvest -q "gestão documental"
///
/// # Bounded years, explicit databases, two SciELO pages
/// biblio_harvest -q "preservação digital" --from-year 2018 --to-year 2024 \
///     -d brapci,scielo --max-pages 2
///
/// # Everything from an input file
/// biblio_harvest --input input.json -o ./storage
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Input file (YAML or JSON) with searchQuery, fromYear, toYear, databases
    #[arg(short, long, env = "HARVEST_INPUT")]
    pub input: Option<PathBuf>,

    /// Search term
    #[arg(short, long, env = "HARVEST_QUERY")]
    pub query: Option<String>,

    /// Lower publication-year bound; empty means unbounded
    #[arg(long)]
    pub from_year: Option<String>,

    /// Upper publication-year bound; empty means unbounded
    #[arg(long)]
    pub to_year: Option<String>,

    /// Comma-separated databases to search, in order (brapci, enancib, scielo)
    #[arg(short, long, env = "HARVEST_DATABASES", value_delimiter = ',')]
    pub databases: Option<Vec<String>>,

    /// Pages to request from paginated databases
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Timeout for each request, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Deadline for the whole harvest, in seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Directory for the JSON Lines dataset and the run report
    #[arg(short, long, default_value = "./dataset")]
    pub output_dir: String,
}
