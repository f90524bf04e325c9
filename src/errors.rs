//! Error types for the harvest pipeline.
//!
//! Three failure families exist and each one has a different blast radius:
//!
//! - [`FetchError`]: one source failed to answer or answered garbage. The
//!   orchestrator logs it and that source contributes zero records.
//! - [`ConfigError`]: the run cannot start. Propagates to `main` and ends the
//!   process with a non-zero exit status before any request is made.
//! - [`SinkError`]: one record could not be stored. Logged per record; delivery
//!   continues with the next one.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while querying a single source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered with HTTP {status}")]
    Status { status: u16, url: String },
    #[error("response body was empty")]
    EmptyBody,
    #[error("response body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request timed out")]
    Timeout,
}

/// The run configuration is missing or unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a non-empty search query is required (--query, HARVEST_QUERY or searchQuery in the input file)")]
    MissingQuery,
    #[error("could not read input file {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse input file {path}: {source}")]
    ParseInput {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("year bound '{0}' is not a number")]
    InvalidYear(String),
}

/// A record could not be written to the sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("record could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0} holds a partial line that could not be removed; refusing further writes")]
    Poisoned(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let e = FetchError::Status {
            status: 503,
            url: "https://example.org/search".to_string(),
        };
        assert_eq!(e.to_string(), "https://example.org/search answered with HTTP 503");
    }

    #[test]
    fn test_config_error_mentions_year() {
        let e = ConfigError::InvalidYear("20x0".to_string());
        assert!(e.to_string().contains("20x0"));
    }
}
