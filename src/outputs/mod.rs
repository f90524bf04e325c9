//! Where harvested records go.
//!
//! # Submodules
//!
//! - [`dataset`]: Append-only JSON Lines record store, one file per day
//! - [`json`]: Writes the run report next to the dataset
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── 2025-06-21.jsonl         # one canonical record per line, appended
//! └── 2025-06-21_report.json   # last run's per-source report
//! ```

pub mod dataset;
pub mod json;

use crate::errors::SinkError;
use crate::models::CanonicalRecord;
use async_trait::async_trait;

/// Durable destination for canonical records, fed one record at a time.
///
/// A failed push must be reported as an error, not swallowed; the
/// orchestrator logs it and moves on to the next record.
#[async_trait]
pub trait RecordSink: Send {
    async fn push(&mut self, record: &CanonicalRecord) -> Result<(), SinkError>;
}
