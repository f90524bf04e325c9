//! Run report output.
//!
//! The report is written to `{output_dir}/{YYYY-MM-DD}_report.json` and
//! replaced by later runs on the same day; the dataset itself is never
//! rewritten.

use crate::harvest::RunReport;
use chrono::Local;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`RunReport`] as pretty-printed JSON.
///
/// # Returns
///
/// The path written, or an error if directory creation or writing fails.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_report(report: &RunReport, output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(%output_dir, error = %e, "Failed to create report dir");
        return Err(e.into());
    }

    let path = Path::new(output_dir).join(format!("{}_report.json", Local::now().date_naive()));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run report");
    Ok(path)
}
