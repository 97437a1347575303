// src/bootstrap.rs
use std::sync::Arc;

use tracing::info;

use crate::config::ScoringConfig;
use crate::ingest::{ingest_and_fill, people_search::PeopleSearchSource, IngestReport, IngestSource};
use crate::oracle::{build_client, DynTransport, OracleClient, ScoringOracle};
use crate::orchestrator::{BatchOptions, BatchOrchestrator};
use crate::store::{DynStore, JsonFileStore};

/// Wired collaborators for one process: config, store, oracle client.
pub struct AppRuntime {
    pub cfg: ScoringConfig,
    pub store: DynStore,
    pub oracle: Arc<OracleClient<DynTransport>>,
}

impl AppRuntime {
    /// Config from `$SCORING_CONFIG_PATH` / `config/scoring.*` / defaults.
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::from_config(ScoringConfig::load_default()?))
    }

    pub fn from_config(cfg: ScoringConfig) -> Self {
        let store: DynStore = Arc::new(JsonFileStore::new(&cfg.store_path));
        let oracle = Arc::new(build_client(&cfg));
        Self::with_parts(cfg, store, oracle)
    }

    pub fn with_parts(
        cfg: ScoringConfig,
        store: DynStore,
        oracle: Arc<OracleClient<DynTransport>>,
    ) -> Self {
        // Safe diagnostics: only provider + enabled + key length
        info!(
            "scoring cfg loaded: provider={}, enabled={}, key_len={}, oracle={}, strategy={:?}",
            cfg.provider,
            cfg.enabled,
            cfg.api_key.len(),
            ScoringOracle::name(oracle.as_ref()),
            cfg.strategy
        );
        Self { cfg, store, oracle }
    }

    pub fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(
            Arc::clone(&self.store),
            self.oracle.clone(),
            BatchOptions::from(&self.cfg),
        )
    }

    /// Pull founder records from the people-search API and store them,
    /// optionally completing each through the oracle first.
    pub async fn ingest_people_search(&self, fill: bool) -> anyhow::Result<IngestReport> {
        let source = PeopleSearchSource::from_env(self.cfg.people_search.clone())?;
        let sources: Vec<Box<dyn IngestSource>> = vec![Box::new(source)];
        let filler = fill.then_some(self.oracle.as_ref());
        Ok(ingest_and_fill(&sources, filler, self.store.as_ref()).await?)
    }
}
