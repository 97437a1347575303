// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod merge;
pub mod normalize;
pub mod record;
pub mod redistribute;

// Collaborators around the scoring core
pub mod ingest;
pub mod oracle;
pub mod store;

// Batch run + service wiring
pub mod api;
pub mod bootstrap;
pub mod metrics;
pub mod orchestrator;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::merge::{merge, MergeError};
pub use crate::normalize::{normalize, NormalizationOutcome, Strategy, TieRule};
pub use crate::oracle::{OracleClient, OracleError, ScoringOracle};
pub use crate::orchestrator::{BatchError, BatchOptions, BatchOrchestrator, BatchReport};
pub use crate::record::{Evaluation, RecordId, StartupRecord};
pub use crate::redistribute::redistribute;
pub use crate::store::{PersistenceError, StartupStore};

