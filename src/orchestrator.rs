//! # Batch orchestrator
//! Load → evaluate every record (bounded parallelism) → normalize once → persist.
//!
//! Evaluation tasks each own a clone of their record and only hand back an
//! `Evaluation`; results are applied after the last task finishes, so the
//! normalizer is the sole writer of the batch. A failed or timed-out call
//! skips that record; only load/persist failures abort the run.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::ScoringConfig;
use crate::metrics::ensure_metrics_described;
use crate::normalize::{normalize, NormalizationOutcome, Strategy, TieRule};
use crate::oracle::{DynOracle, OracleError};
use crate::record::{Evaluation, RecordId, StartupRecord};
use crate::store::{DynStore, PersistenceError};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub strategy: Strategy,
    pub ties: TieRule,
    /// Max oracle calls in flight.
    pub concurrency: usize,
    pub call_timeout: Duration,
    /// Leave already-evaluated records out of the run.
    pub skip_scored: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            ties: TieRule::default(),
            concurrency: 4,
            call_timeout: Duration::from_secs(30),
            skip_scored: false,
        }
    }
}

impl From<&ScoringConfig> for BatchOptions {
    fn from(cfg: &ScoringConfig) -> Self {
        Self {
            strategy: cfg.strategy,
            ties: cfg.ties,
            concurrency: cfg.concurrency.max(1),
            // Leave the transport's own timeout room to fire first.
            call_timeout: Duration::from_secs(cfg.timeout_secs.saturating_add(5)),
            skip_scored: cfg.skip_scored,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub id: Option<RecordId>,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub evaluated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
    pub normalization: NormalizationOutcome,
    pub persisted: usize,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("loading the population failed: {0}")]
    Load(#[source] PersistenceError),
    #[error("persisting record {id} failed: {source}")]
    Persist {
        id: RecordId,
        #[source]
        source: PersistenceError,
    },
}

pub struct BatchOrchestrator {
    store: DynStore,
    oracle: DynOracle,
    options: BatchOptions,
}

impl BatchOrchestrator {
    pub fn new(store: DynStore, oracle: DynOracle, options: BatchOptions) -> Self {
        Self {
            store,
            oracle,
            options,
        }
    }

    pub async fn run(&self) -> Result<BatchReport, BatchError> {
        ensure_metrics_described();
        counter!("batch_runs_total").increment(1);

        let population = self.store.find_all().await.map_err(BatchError::Load)?;
        let total = population.len();

        let mut skipped = 0usize;
        let mut failures = Vec::new();
        let mut work = Vec::with_capacity(total);
        for rec in population {
            if self.options.skip_scored && rec.is_evaluated() {
                skipped += 1;
            } else if rec.id.is_none() {
                failures.push(failure(&rec, "record has no storage id"));
            } else {
                work.push(rec);
            }
        }

        tracing::info!(
            target: "batch",
            total,
            queued = work.len(),
            skipped,
            oracle = self.oracle.name(),
            "batch evaluation started"
        );

        let results = self.evaluate_all(&work).await;

        // Barrier passed: nothing else writes to the batch from here on.
        let mut evaluated = Vec::with_capacity(work.len());
        for (mut rec, res) in work.into_iter().zip(results) {
            match res {
                Some(Ok(eval)) => {
                    rec.apply_evaluation(&eval);
                    evaluated.push(rec);
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        target: "batch",
                        id = ?rec.id,
                        company = rec.display_name(),
                        error = %e,
                        "evaluation failed, record skipped"
                    );
                    failures.push(failure(&rec, &e.to_string()));
                }
                None => failures.push(failure(&rec, "evaluation task aborted")),
            }
        }
        counter!("batch_records_failed_total").increment(failures.len() as u64);
        counter!("batch_records_evaluated_total").increment(evaluated.len() as u64);

        let normalization = normalize(&mut evaluated, self.options.strategy, self.options.ties);

        // Raw scores are persisted as-is when normalization was a no-op.
        let mut persisted = 0usize;
        for rec in &evaluated {
            let (Some(id), Some(update)) = (rec.id.as_ref(), rec.score_update()) else {
                continue;
            };
            self.store
                .update(id, &update)
                .await
                .map_err(|source| BatchError::Persist {
                    id: id.clone(),
                    source,
                })?;
            persisted += 1;
        }

        gauge!("batch_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

        let report = BatchReport {
            total,
            evaluated: evaluated.len(),
            skipped,
            failed: failures.len(),
            failures,
            normalization,
            persisted,
        };
        tracing::info!(
            target: "batch",
            evaluated = report.evaluated,
            failed = report.failed,
            skipped = report.skipped,
            persisted = report.persisted,
            noop = report.normalization.is_noop(),
            "batch finished"
        );
        Ok(report)
    }

    /// One result slot per input, in input order. `None` means the task died.
    async fn evaluate_all(
        &self,
        work: &[StartupRecord],
    ) -> Vec<Option<Result<Evaluation, OracleError>>> {
        let permits = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut set = JoinSet::new();

        for (idx, rec) in work.iter().enumerate() {
            let oracle = Arc::clone(&self.oracle);
            let permits = Arc::clone(&permits);
            let rec = rec.clone();
            let limit = self.options.call_timeout;
            set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (idx, Err(OracleError::Transport("worker pool closed".into())));
                };
                let res = match tokio::time::timeout(limit, oracle.evaluate(&rec)).await {
                    Ok(res) => res,
                    Err(_) => Err(OracleError::Timeout),
                };
                (idx, res)
            });
        }

        let mut results: Vec<Option<Result<Evaluation, OracleError>>> =
            (0..work.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, res)) => results[idx] = Some(res),
                Err(e) => tracing::error!(target: "batch", error = %e, "evaluation task panicked"),
            }
        }
        results
    }
}

fn failure(rec: &StartupRecord, error: &str) -> RecordFailure {
    RecordFailure {
        id: rec.id.clone(),
        name: rec.display_name().to_string(),
        error: error.to_string(),
    }
}
