//! Append-only JSON Lines dataset.
//!
//! Each run appends to `{output_dir}/{YYYY-MM-DD}.jsonl`, so several runs on
//! the same day accumulate in one file. Every line is one
//! [`CanonicalRecord`] with all fields present.
//!
//! A write that fails partway is rolled back to the last complete line. If
//! the rollback itself fails the sink refuses every later record, so nothing
//! is ever appended after a torn line.

use super::RecordSink;
use crate::errors::SinkError;
use crate::models::CanonicalRecord;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument};

/// Dataset file for `date` inside `output_dir`.
pub fn dataset_path(output_dir: &str, date: NaiveDate) -> PathBuf {
    Path::new(output_dir).join(format!("{date}.jsonl"))
}

#[derive(Debug)]
pub struct DatasetSink {
    path: PathBuf,
    file: File,
    /// File length after the last complete line.
    len: u64,
    written: usize,
    poisoned: bool,
}

impl DatasetSink {
    /// Open today's dataset file in `output_dir`, creating both as needed.
    pub async fn open(output_dir: &str) -> Result<Self, SinkError> {
        fs::create_dir_all(output_dir).await?;
        Self::open_path(dataset_path(output_dir, Local::now().date_naive())).await
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn open_path(path: PathBuf) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let len = file.metadata().await?.len();
        info!(len, "Opened dataset for append");
        Ok(Self {
            path,
            file,
            len,
            written: 0,
            poisoned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle.
    pub fn written(&self) -> usize {
        self.written
    }

    async fn append(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line).await?;
        self.file.flush().await
    }

    /// Cut the file back to the last complete line.
    async fn discard_partial(&mut self) {
        match self.file.set_len(self.len).await {
            Ok(()) => debug!(len = self.len, "Rolled back partial line"),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Could not roll back partial line");
                self.poisoned = true;
            }
        }
    }
}

#[async_trait]
impl RecordSink for DatasetSink {
    async fn push(&mut self, record: &CanonicalRecord) -> Result<(), SinkError> {
        if self.poisoned {
            return Err(SinkError::Poisoned(self.path.clone()));
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        if let Err(e) = self.append(line.as_bytes()).await {
            self.discard_partial().await;
            return Err(e.into());
        }
        self.len += line.len() as u64;
        self.written += 1;
        debug!(database = %record.database, id = ?record.id, "Appended record");
        Ok(())
    }
}
