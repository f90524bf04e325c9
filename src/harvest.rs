//! Harvest orchestration.
//!
//! A run goes through four stages:
//! 1. **Resolve**: map the configured database names to registered sources
//! 2. **Fetch**: run every source as its own task; failures and panics
//!    become "zero records from this source"
//! 3. **Merge**: wait for every task, concatenate in configured order, drop
//!    records that carry no data
//! 4. **Deliver**: hand records to the sink one at a time
//!
//! Nothing a source does can abort the run or change another source's
//! results.

use crate::config::RunConfig;
use crate::models::{CanonicalRecord, SearchQuery};
use crate::outputs::RecordSink;
use crate::scrapers::Source;
use crate::scrapers::registry::SourceRegistry;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, instrument, warn};

/// How one source fared during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: &'static str,
    pub database: &'static str,
    /// Pages that answered, including a final empty one.
    pub pages: u32,
    /// Records returned before the validity filter.
    pub records: usize,
    /// Why the source stopped early, if it did.
    pub failure: Option<String>,
    /// The run deadline cut this source short.
    pub cancelled: bool,
}

impl SourceReport {
    fn new(source: &dyn Source) -> Self {
        Self {
            source: source.id(),
            database: source.label(),
            pages: 0,
            records: 0,
            failure: None,
            cancelled: false,
        }
    }
}

/// Merged, filtered output of all sources.
#[derive(Debug)]
pub struct Harvest {
    pub records: Vec<CanonicalRecord>,
    pub reports: Vec<SourceReport>,
    /// Records removed by the validity filter.
    pub dropped: usize,
}

/// Sink outcome counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub stored: usize,
    pub failed: usize,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub query: String,
    pub from_year: Option<String>,
    pub to_year: Option<String>,
    pub sources: Vec<SourceReport>,
    pub harvested: usize,
    pub dropped: usize,
    pub delivery: Delivery,
}

pub struct Harvester {
    registry: SourceRegistry,
    client: Client,
}

impl Harvester {
    pub fn new(registry: SourceRegistry, client: Client) -> Self {
        Self { registry, client }
    }

    /// Collect records from every enabled source and deliver them to `sink`.
    #[instrument(level = "info", skip_all, fields(term = %config.query.term))]
    pub async fn run(&self, config: &RunConfig, sink: &mut dyn RecordSink) -> RunReport {
        let harvest = self.collect(config).await;
        let harvested = harvest.records.len();
        let delivery = deliver(harvest.records, sink).await;

        RunReport {
            query: config.query.term.clone(),
            from_year: config.query.from_year.clone(),
            to_year: config.query.to_year.clone(),
            sources: harvest.reports,
            harvested,
            dropped: harvest.dropped,
            delivery,
        }
    }

    /// Run all enabled sources concurrently and merge their records.
    ///
    /// Returns only once every source has finished, failed, or been cut off.
    /// Dropping the returned future aborts the source tasks still running.
    #[instrument(level = "info", skip_all)]
    pub async fn collect(&self, config: &RunConfig) -> Harvest {
        let sources = self.registry.resolve(&config.databases);
        let deadline = config.deadline.map(|d| Instant::now() + d);
        info!(sources = sources.len(), max_pages = config.max_pages, "Starting harvest");

        let tasks = sources.into_iter().map(|source| {
            let handle = AbortOnDropHandle::new(tokio::spawn(harvest_source(
                Arc::clone(&source),
                self.client.clone(),
                config.query.clone(),
                config.max_pages,
                config.source_timeout,
                deadline,
            )));
            async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(source = source.id(), error = %e, "Source task aborted; contributing no records");
                        let mut report = SourceReport::new(source.as_ref());
                        report.failure = Some(format!("task aborted: {e}"));
                        (Vec::new(), report)
                    }
                }
            }
        });
        let results = join_all(tasks).await;

        let mut records = Vec::new();
        let mut reports = Vec::with_capacity(results.len());
        for (batch, report) in results {
            records.extend(batch);
            reports.push(report);
        }

        let total = records.len();
        let records: Vec<CanonicalRecord> =
            records.into_iter().filter(CanonicalRecord::is_valid).collect();
        let dropped = total - records.len();
        if dropped > 0 {
            debug!(dropped, "Dropped records without data");
        }
        info!(count = records.len(), dropped, "Harvest merged");

        Harvest {
            records,
            reports,
            dropped,
        }
    }
}

/// Fetch pages from one source until it runs dry, fails, or hits a bound.
///
/// Records from pages that completed are kept even when a later page fails
/// or is cut off.
#[instrument(level = "info", skip_all, fields(source = source.id()))]
async fn harvest_source(
    source: Arc<dyn Source>,
    client: Client,
    query: SearchQuery,
    max_pages: u32,
    per_request: Duration,
    deadline: Option<Instant>,
) -> (Vec<CanonicalRecord>, SourceReport) {
    let mut report = SourceReport::new(source.as_ref());
    let mut records = Vec::new();
    let pages = if source.paginated() { max_pages.max(1) } else { 1 };

    for page in 1..=pages {
        let budget = Instant::now() + per_request;
        let until = deadline.map_or(budget, |d| d.min(budget));

        match timeout_at(until, source.fetch(&client, &query, page)).await {
            Ok(Ok(batch)) => {
                report.pages += 1;
                debug!(page, count = batch.len(), "Page fetched");
                if batch.is_empty() {
                    break;
                }
                records.extend(batch);
            }
            Ok(Err(e)) => {
                warn!(page, error = %e, "Fetch failed; source contributes what it has so far");
                report.failure = Some(e.to_string());
                break;
            }
            Err(_) => {
                report.cancelled = deadline.is_some_and(|d| Instant::now() >= d);
                warn!(page, cancelled = report.cancelled, "Fetch timed out");
                report.failure = Some(crate::errors::FetchError::Timeout.to_string());
                break;
            }
        }
    }

    report.records = records.len();
    info!(count = records.len(), pages = report.pages, "Source finished");
    (records, report)
}

/// Hand each record to `sink`. Failures are logged and counted; delivery
/// carries on with the next record.
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub async fn deliver(records: Vec<CanonicalRecord>, sink: &mut dyn RecordSink) -> Delivery {
    let mut delivery = Delivery::default();
    for record in &records {
        match sink.push(record).await {
            Ok(()) => delivery.stored += 1,
            Err(e) => {
                error!(database = %record.database, id = ?record.id, error = %e, "Sink rejected record");
                delivery.failed += 1;
            }
        }
    }
    info!(stored = delivery.stored, failed = delivery.failed, "Delivery finished");
    delivery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FetchError, SinkError};
    use crate::http::build_client;
    use crate::scrapers::brapci::{Brapci, BrapciOptions};
    use crate::scrapers::registry::SourceOptions;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug, Clone)]
    enum Behavior {
        Records(Vec<&'static str>),
        Fail,
        Panic,
        Hang,
        /// Two records per page up to the given page, then empty pages.
        Pages(u32),
        /// Hangs; sets the flag when its fetch is dropped.
        Watched(Arc<AtomicBool>),
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct FakeSource {
        id: &'static str,
        behavior: Behavior,
    }

    fn titled(label: &str, title: &str) -> CanonicalRecord {
        let mut r = CanonicalRecord::empty(label);
        r.title = Some(title.to_string());
        r
    }

    #[async_trait]
    impl Source for FakeSource {
        fn id(&self) -> &'static str {
            self.id
        }

        fn label(&self) -> &'static str {
            self.id
        }

        fn paginated(&self) -> bool {
            matches!(self.behavior, Behavior::Pages(_))
        }

        async fn fetch(
            &self,
            _client: &Client,
            _query: &SearchQuery,
            page: u32,
        ) -> Result<Vec<CanonicalRecord>, FetchError> {
            match &self.behavior {
                Behavior::Records(titles) => Ok(titles
                    .iter()
                    .map(|t| {
                        if t.is_empty() {
                            CanonicalRecord::empty(self.id)
                        } else {
                            titled(self.id, t)
                        }
                    })
                    .collect()),
                Behavior::Fail => Err(FetchError::EmptyBody),
                Behavior::Panic => panic!("adapter bug"),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
                Behavior::Pages(last) if page <= *last => Ok(vec![
                    titled(self.id, &format!("p{page}a")),
                    titled(self.id, &format!("p{page}b")),
                ]),
                Behavior::Pages(_) => Ok(Vec::new()),
                Behavior::Watched(flag) => {
                    let _guard = SetOnDrop(Arc::clone(flag));
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn harvester(fakes: Vec<FakeSource>) -> Harvester {
        let mut registry = SourceRegistry::with_defaults(&SourceOptions::default());
        for fake in fakes {
            registry.register(Arc::new(fake));
        }
        Harvester::new(registry, build_client(Duration::from_secs(5)).unwrap())
    }

    fn config(databases: &[&str]) -> RunConfig {
        RunConfig {
            query: SearchQuery::new("informação", None, None),
            databases: databases.iter().map(|s| s.to_string()).collect(),
            max_pages: 1,
            source_timeout: Duration::from_secs(5),
            deadline: None,
            output_dir: String::new(),
            endpoints: SourceOptions::default(),
        }
    }

    fn titles(records: &[CanonicalRecord]) -> Vec<&str> {
        records.iter().filter_map(|r| r.title.as_deref()).collect()
    }

    #[derive(Default)]
    struct MemorySink {
        stored: Vec<CanonicalRecord>,
        attempts: usize,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn push(&mut self, record: &CanonicalRecord) -> Result<(), SinkError> {
            self.attempts += 1;
            if self.fail_on == Some(self.attempts) {
                return Err(SinkError::Io(std::io::Error::other("disk full")));
            }
            self.stored.push(record.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_source_does_not_affect_others() {
        let h = harvester(vec![
            FakeSource { id: "alpha", behavior: Behavior::Fail },
            FakeSource { id: "beta", behavior: Behavior::Records(vec!["b1", "b2"]) },
        ]);
        let harvest = h.collect(&config(&["alpha", "beta"])).await;

        assert_eq!(titles(&harvest.records), vec!["b1", "b2"]);
        assert_eq!(harvest.reports.len(), 2);
        assert_eq!(harvest.reports[0].source, "alpha");
        assert!(harvest.reports[0].failure.is_some());
        assert_eq!(harvest.reports[1].failure, None);
        assert_eq!(harvest.reports[1].records, 2);
    }

    #[tokio::test]
    async fn test_panicking_source_is_contained() {
        let h = harvester(vec![
            FakeSource { id: "alpha", behavior: Behavior::Panic },
            FakeSource { id: "beta", behavior: Behavior::Records(vec!["b1"]) },
        ]);
        let harvest = h.collect(&config(&["alpha", "beta"])).await;

        assert_eq!(titles(&harvest.records), vec!["b1"]);
        assert!(harvest.reports[0].failure.as_deref().unwrap().starts_with("task aborted"));
    }

    #[tokio::test]
    async fn test_records_follow_configured_source_order() {
        let h = harvester(vec![
            FakeSource { id: "alpha", behavior: Behavior::Records(vec!["a1", "a2"]) },
            FakeSource { id: "beta", behavior: Behavior::Records(vec!["b1"]) },
        ]);
        let harvest = h.collect(&config(&["beta", "nope", "alpha"])).await;
        assert_eq!(titles(&harvest.records), vec!["b1", "a1", "a2"]);
        assert_eq!(harvest.reports.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_records_are_filtered() {
        let h = harvester(vec![FakeSource {
            id: "alpha",
            behavior: Behavior::Records(vec!["", "a1", ""]),
        }]);
        let harvest = h.collect(&config(&["alpha"])).await;
        assert_eq!(harvest.records.len(), 1);
        assert_eq!(harvest.dropped, 2);
        assert!(harvest.records.iter().all(CanonicalRecord::is_valid));
    }

    #[tokio::test]
    async fn test_hanging_source_times_out() {
        let h = harvester(vec![
            FakeSource { id: "alpha", behavior: Behavior::Hang },
            FakeSource { id: "beta", behavior: Behavior::Records(vec!["b1"]) },
        ]);
        let mut cfg = config(&["alpha", "beta"]);
        cfg.source_timeout = Duration::from_millis(100);
        let harvest = h.collect(&cfg).await;

        assert_eq!(titles(&harvest.records), vec!["b1"]);
        assert_eq!(harvest.reports[0].failure.as_deref(), Some("request timed out"));
        assert!(!harvest.reports[0].cancelled);
    }

    #[tokio::test]
    async fn test_deadline_marks_source_cancelled() {
        let h = harvester(vec![FakeSource { id: "alpha", behavior: Behavior::Hang }]);
        let mut cfg = config(&["alpha"]);
        cfg.deadline = Some(Duration::from_millis(100));
        let harvest = h.collect(&cfg).await;

        assert!(harvest.records.is_empty());
        assert!(harvest.reports[0].cancelled);
    }

    #[tokio::test]
    async fn test_dropping_collect_aborts_source_tasks() {
        let dropped = Arc::new(AtomicBool::new(false));
        let h = harvester(vec![FakeSource {
            id: "alpha",
            behavior: Behavior::Watched(Arc::clone(&dropped)),
        }]);
        let cfg = config(&["alpha"]);

        let cut = tokio::time::timeout(Duration::from_millis(100), h.collect(&cfg)).await;
        assert!(cut.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_paginated_source_stops_at_empty_page() {
        let h = harvester(vec![FakeSource { id: "paged", behavior: Behavior::Pages(2) }]);
        let mut cfg = config(&["paged"]);
        cfg.max_pages = 5;
        let harvest = h.collect(&cfg).await;

        assert_eq!(titles(&harvest.records), vec!["p1a", "p1b", "p2a", "p2b"]);
        assert_eq!(harvest.reports[0].pages, 3);
    }

    #[tokio::test]
    async fn test_paginated_source_respects_page_bound() {
        let h = harvester(vec![FakeSource { id: "paged", behavior: Behavior::Pages(10) }]);
        let mut cfg = config(&["paged"]);
        cfg.max_pages = 2;
        let harvest = h.collect(&cfg).await;
        assert_eq!(harvest.records.len(), 4);
        assert_eq!(harvest.reports[0].pages, 2);
    }

    #[tokio::test]
    async fn test_network_error_source_contributes_nothing() {
        let mut h = harvester(vec![FakeSource {
            id: "beta",
            behavior: Behavior::Records(vec!["b1"]),
        }]);
        h.registry.register(Arc::new(Brapci::new(BrapciOptions {
            endpoint: "http://127.0.0.1:1/api".to_string(),
            ..BrapciOptions::default()
        })));
        let harvest = h.collect(&config(&["brapci", "beta"])).await;

        assert_eq!(titles(&harvest.records), vec!["b1"]);
        assert_eq!(harvest.reports[0].source, "brapci");
        assert_eq!(harvest.reports[0].records, 0);
        assert!(harvest.reports[0].failure.is_some());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_delivery() {
        let h = harvester(vec![FakeSource {
            id: "alpha",
            behavior: Behavior::Records(vec!["a1", "a2", "a3"]),
        }]);
        let mut sink = MemorySink {
            fail_on: Some(2),
            ..MemorySink::default()
        };
        let report = h.run(&config(&["alpha"]), &mut sink).await;

        assert_eq!(sink.attempts, 3);
        assert_eq!(titles(&sink.stored), vec!["a1", "a3"]);
        assert_eq!(report.delivery, Delivery { stored: 2, failed: 1 });
        assert_eq!(report.harvested, 3);
        assert_eq!(report.query, "informação");
    }
}
