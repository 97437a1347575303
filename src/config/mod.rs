// src/config/mod.rs
//! Runtime configuration for the scoring pipeline.
//!
//! Loaded from `config/scoring.toml` or `config/scoring.json` (or the file named
//! by `$SCORING_CONFIG_PATH`). `api_key = "ENV"` is resolved from
//! `GEMINI_API_KEY` / `OPENAI_API_KEY` depending on the provider.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::normalize::{Strategy, TieRule};

pub const ENV_CONFIG_PATH: &str = "SCORING_CONFIG_PATH";

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "gemini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_daily_limit() -> u32 {
    500
}
fn default_max_attempts() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_concurrency() -> usize {
    4
}
fn default_store_path() -> PathBuf {
    PathBuf::from("data/startups.json")
}
fn default_cache_dir() -> Option<PathBuf> {
    Some(PathBuf::from("cache/oracle"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// "gemini" | "openai" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// "ENV" means: read from the provider's key variable.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// Tries per oracle request when the answer violates the schema.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Parallel oracle calls during a batch run.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub ties: TieRule,
    /// Leave records that already carry a score out of the batch.
    #[serde(default)]
    pub skip_scored: bool,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// `None` disables the oracle response cache (and its daily limit).
    #[serde(default = "default_cache_dir")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub people_search: PeopleSearchConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: None,
            api_key: default_api_key(),
            daily_limit: default_daily_limit(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            strategy: Strategy::default(),
            ties: TieRule::default(),
            skip_scored: false,
            store_path: default_store_path(),
            cache_dir: default_cache_dir(),
            people_search: PeopleSearchConfig::default(),
        }
    }
}

fn default_search_base_url() -> String {
    "https://search.linkd.inc".to_string()
}
fn default_search_query() -> String {
    "Founders".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeopleSearchConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_query")]
    pub query: String,
    #[serde(default)]
    pub school: Vec<String>,
}

impl Default for PeopleSearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            query: default_search_query(),
            school: vec!["UCLA".to_string()],
        }
    }
}

impl ScoringConfig {
    /// Load from an explicit path. TOML or JSON by extension (JSON is tried as fallback).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading scoring config from {}", path.display()))?;
        let is_toml = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let mut cfg: ScoringConfig = if is_toml {
            toml::from_str(&data).context("parsing TOML scoring config")?
        } else {
            serde_json::from_str(&data).context("parsing JSON scoring config")?
        };

        cfg.sanitize();
        if cfg.enabled {
            cfg.resolve_api_key()?;
        }
        Ok(cfg)
    }

    /// Env var + fallbacks:
    /// 1) $SCORING_CONFIG_PATH
    /// 2) config/scoring.toml
    /// 3) config/scoring.json
    /// 4) defaults (oracle disabled if no key is available)
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        for candidate in ["config/scoring.toml", "config/scoring.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
        }

        let mut cfg = Self::default();
        if let Err(e) = cfg.resolve_api_key() {
            tracing::warn!(error = %e, "no oracle API key; scoring disabled");
            cfg.enabled = false;
        }
        Ok(cfg)
    }

    fn sanitize(&mut self) {
        self.provider = self.provider.trim().to_lowercase();
        self.max_attempts = self.max_attempts.clamp(1, 5);
        self.concurrency = self.concurrency.max(1);
        self.timeout_secs = self.timeout_secs.max(1);
    }

    fn resolve_api_key(&mut self) -> Result<()> {
        if !self.api_key.trim().eq_ignore_ascii_case("env") {
            return Ok(());
        }
        let var = match self.provider.as_str() {
            "gemini" => "GEMINI_API_KEY",
            "openai" => "OPENAI_API_KEY",
            other => bail!("Unsupported provider in config: {other}"),
        };
        self.api_key = env::var(var).map_err(|_| anyhow!("Missing {var} env var"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_with_defaults_and_sanitizing() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("scoring.toml");
        fs::write(
            &p,
            r#"
enabled = false
provider = " OpenAI "
strategy = "zscore"
ties = "average"
concurrency = 0
max_attempts = 40
"#,
        )
        .unwrap();
        let cfg = ScoringConfig::load_from_file(&p).unwrap();
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.strategy, Strategy::ZScore);
        assert_eq!(cfg.ties, TieRule::Average);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.daily_limit, 500);
        assert_eq!(cfg.people_search.school, vec!["UCLA".to_string()]);
    }

    #[test]
    fn json_with_literal_key() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("scoring.json");
        fs::write(
            &p,
            r#"{"provider":"gemini","api_key":"k-123","strategy":"percentile","cache_dir":null}"#,
        )
        .unwrap();
        let cfg = ScoringConfig::load_from_file(&p).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.api_key, "k-123");
        assert!(cfg.cache_dir.is_none());
    }

    #[test]
    fn unknown_provider_with_env_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("scoring.json");
        fs::write(&p, r#"{"provider":"palm","api_key":"ENV"}"#).unwrap();
        assert!(ScoringConfig::load_from_file(&p).is_err());
    }
}
