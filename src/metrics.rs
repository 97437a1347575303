use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the pipeline series.
    pub fn init() -> anyhow::Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("oracle_calls_total", "Oracle requests issued, including retries.");
        describe_counter!(
            "oracle_failures_total",
            "Oracle requests that failed or violated the schema."
        );
        describe_counter!("oracle_cache_hits_total", "Oracle answers served from the file cache.");
        describe_histogram!("oracle_call_ms", "Oracle request latency in milliseconds.");
        describe_counter!("batch_runs_total", "Batch scoring runs started.");
        describe_counter!(
            "batch_records_evaluated_total",
            "Records evaluated successfully in batch runs."
        );
        describe_counter!(
            "batch_records_failed_total",
            "Records skipped because evaluation failed."
        );
        describe_gauge!("batch_last_run_ts", "Unix ts when a batch run last finished.");
        describe_counter!("ingest_records_total", "Records stored by ingestion.");
        describe_counter!("ingest_source_errors_total", "Ingestion source fetch errors.");
    });
}
