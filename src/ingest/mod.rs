// src/ingest/mod.rs
pub mod people_search;

use metrics::counter;
use serde::Serialize;

use crate::metrics::ensure_metrics_described;
use crate::oracle::{OracleClient, OracleTransport};
use crate::record::StartupRecord;
use crate::store::{PersistenceError, StartupStore};

/// Anything that produces sparse startup records.
#[async_trait::async_trait]
pub trait IngestSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<Vec<StartupRecord>>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub fetched: usize,
    pub filled: usize,
    pub fill_failed: usize,
    pub stored: usize,
    pub source_errors: usize,
}

/// Fetch from every source, optionally complete each record through the oracle,
/// and insert into the store.
///
/// A failing source is logged and counted. A failed fill keeps the unfilled
/// record. Store errors abort and are returned as-is.
pub async fn ingest_and_fill<T: OracleTransport>(
    sources: &[Box<dyn IngestSource>],
    filler: Option<&OracleClient<T>>,
    store: &dyn StartupStore,
) -> Result<IngestReport, PersistenceError> {
    ensure_metrics_described();
    let mut report = IngestReport::default();

    for source in sources {
        let records = match source.fetch().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, source = source.name(), "source error");
                counter!("ingest_source_errors_total").increment(1);
                report.source_errors += 1;
                continue;
            }
        };
        report.fetched += records.len();

        for rec in records {
            let rec = match filler {
                Some(client) => match client.fill(&rec).await {
                    Ok(filled) => {
                        report.filled += 1;
                        filled
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "ingest",
                            company = rec.display_name(),
                            error = %e,
                            "fill failed, storing record as fetched"
                        );
                        report.fill_failed += 1;
                        rec
                    }
                },
                None => rec,
            };
            store.insert(rec).await?;
            report.stored += 1;
        }
    }

    counter!("ingest_records_total").increment(report.stored as u64);
    tracing::info!(
        target: "ingest",
        fetched = report.fetched,
        filled = report.filled,
        stored = report.stored,
        "ingest finished"
    );
    Ok(report)
}
