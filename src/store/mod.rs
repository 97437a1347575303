// src/store/mod.rs
//! Persistence seam. The core only needs `find_all` and `update`; `insert` and
//! `query` serve ingestion and the HTTP surface.

pub mod json_file;
pub mod memory;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{RecordId, ScoreUpdate, StartupRecord};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store document is malformed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no record with id {0}")]
    NotFound(RecordId),
}

#[async_trait::async_trait]
pub trait StartupStore: Send + Sync {
    /// Snapshot of every stored record, in insertion order.
    async fn find_all(&self) -> Result<Vec<StartupRecord>, PersistenceError>;

    /// Persist a new record and return its freshly assigned id.
    /// An id already present on the record is replaced.
    async fn insert(&self, record: StartupRecord) -> Result<RecordId, PersistenceError>;

    /// Overwrite the scored fields of one record.
    async fn update(&self, id: &RecordId, fields: &ScoreUpdate) -> Result<(), PersistenceError>;

    async fn query(&self, filter: &StartupFilter) -> Result<Vec<StartupRecord>, PersistenceError> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }
}

pub type DynStore = Arc<dyn StartupStore>;

/// Company search filter. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupFilter {
    /// Any of these industries.
    #[serde(default)]
    pub industry: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<String>,
    /// Minimum funding (inclusive).
    #[serde(default)]
    pub funding: Option<i64>,
    #[serde(default)]
    pub stage: Option<String>,
}

impl StartupFilter {
    pub fn matches(&self, r: &StartupRecord) -> bool {
        if let Some(wanted) = &self.industry {
            if !r.industry.iter().any(|i| wanted.contains(i)) {
                return false;
            }
        }
        if let Some(loc) = &self.location {
            if r.location.as_deref() != Some(loc.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.funding {
            if !r.funding.is_some_and(|f| f >= min) {
                return false;
            }
        }
        if let Some(stage) = &self.stage {
            if r.stage.as_deref() != Some(stage.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Time-ordered hex id, unique within the process.
pub(crate) fn next_id() -> RecordId {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let ts = chrono::Utc::now().timestamp().max(0) as u64;
    RecordId::new(format!("{ts:08x}{:016x}", seq ^ (u64::from(std::process::id()) << 40)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(industry: &[&str], location: &str, funding: i64, stage: &str) -> StartupRecord {
        StartupRecord {
            industry: industry.iter().map(|s| s.to_string()).collect(),
            location: Some(location.into()),
            score: Some(50.0),
            funding: Some(funding),
            stage: Some(stage.into()),
            ..Default::default()
        }
    }

    #[test]
    fn filter_semantics() {
        let r = rec(&["fintech", "ai"], "Los Angeles", 2_000_000, "seed");

        assert!(StartupFilter::default().matches(&r));
        assert!(StartupFilter {
            industry: Some(vec!["ai".into(), "bio".into()]),
            ..Default::default()
        }
        .matches(&r));
        assert!(!StartupFilter {
            industry: Some(vec!["bio".into()]),
            ..Default::default()
        }
        .matches(&r));
        assert!(StartupFilter {
            funding: Some(2_000_000),
            ..Default::default()
        }
        .matches(&r));
        assert!(!StartupFilter {
            funding: Some(2_000_001),
            ..Default::default()
        }
        .matches(&r));
        assert!(!StartupFilter {
            location: Some("LA".into()),
            stage: Some("seed".into()),
            ..Default::default()
        }
        .matches(&r));
    }

    #[test]
    fn ids_are_unique() {
        let a = next_id();
        let b = next_id();
        assert_ne!(a, b);
    }
}
