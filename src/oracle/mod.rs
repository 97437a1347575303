//! Scoring oracle: transport abstraction, strict-schema client, record fill.
//!
//! The transport is the single external call of the pipeline. `OracleClient`
//! owns everything around it: prompt construction, strict parsing, retry on
//! schema violations, and clamping the score into [0, 100].

pub mod cache;
pub mod providers;
pub mod schema;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ScoringConfig;
use crate::merge::{merge_into_record, MergeError};
use crate::record::{Evaluation, StartupRecord};

pub use cache::CachingTransport;
pub use providers::{DisabledTransport, GeminiTransport, MockTransport, OpenAiTransport};
pub use schema::OutputSchema;

pub const SCORE_MIN: i64 = 0;
pub const SCORE_MAX: i64 = 100;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Transport(String),
    #[error("oracle returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("oracle call timed out")]
    Timeout,
    #[error("oracle response does not match the schema: {0}")]
    Schema(String),
    #[error("oracle is disabled")]
    Disabled,
    #[error("oracle daily limit of {0} calls reached")]
    DailyLimit(u32),
    #[error("no API key configured for provider {0}")]
    MissingApiKey(&'static str),
}

impl OracleError {
    /// Schema violations are worth asking again; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

impl From<MergeError> for OracleError {
    fn from(e: MergeError) -> Self {
        Self::Schema(e.to_string())
    }
}

pub type OracleFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, OracleError>> + Send + 'a>>;

/// One remote call: prompt + strict output schema in, JSON text out.
pub trait OracleTransport: Send + Sync + 'static {
    fn complete<'a>(&'a self, prompt: &'a str, schema: &'a OutputSchema) -> OracleFuture<'a, String>;

    /// Drop any stored answer for this request (called after a schema violation).
    fn discard(&self, _prompt: &str, _schema: &OutputSchema) {}

    fn name(&self) -> &'static str;
}

pub type DynTransport = Arc<dyn OracleTransport>;

impl<T: OracleTransport + ?Sized> OracleTransport for Arc<T> {
    fn complete<'a>(&'a self, prompt: &'a str, schema: &'a OutputSchema) -> OracleFuture<'a, String> {
        (**self).complete(prompt, schema)
    }

    fn discard(&self, prompt: &str, schema: &OutputSchema) {
        (**self).discard(prompt, schema)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Per-record evaluation seam used by the batch orchestrator.
pub trait ScoringOracle: Send + Sync {
    fn evaluate<'a>(&'a self, record: &'a StartupRecord) -> OracleFuture<'a, Evaluation>;
    fn name(&self) -> &'static str;
}

pub type DynOracle = Arc<dyn ScoringOracle>;

pub struct OracleClient<T: OracleTransport> {
    transport: T,
    max_attempts: u32,
}

impl<T: OracleTransport> OracleClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            max_attempts: 2,
        }
    }

    /// Total tries per request when the answer violates the schema (min 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Score one record. The returned score is already clamped into [0, 100].
    pub async fn evaluate_record(&self, record: &StartupRecord) -> Result<Evaluation, OracleError> {
        let prompt = evaluation_prompt(record);
        let mut eval: Evaluation = self.request(&prompt, &OutputSchema::evaluation()).await?;
        if !(SCORE_MIN..=SCORE_MAX).contains(&eval.score) {
            tracing::debug!(
                target: "oracle",
                raw = eval.score,
                company = record.display_name(),
                "clamping out-of-range score"
            );
        }
        eval.score = eval.score.clamp(SCORE_MIN, SCORE_MAX);
        Ok(eval)
    }

    /// Ask the oracle to complete a sparse record and merge the answer in.
    /// Values already present in `record` are kept.
    pub async fn fill(&self, record: &StartupRecord) -> Result<StartupRecord, OracleError> {
        let prompt = fill_prompt(record);
        let answer: FillAnswer = self.request(&prompt, &OutputSchema::startup_fill()).await?;
        let filled = serde_json::to_value(&answer).map_err(|e| OracleError::Schema(e.to_string()))?;
        let mut merged = merge_into_record(record, &filled)?;
        if let Some(score) = merged.score {
            merged.score = Some(score.clamp(SCORE_MIN as f64, SCORE_MAX as f64));
        }
        Ok(merged)
    }

    async fn request<D: DeserializeOwned>(
        &self,
        prompt: &str,
        schema: &OutputSchema,
    ) -> Result<D, OracleError> {
        let mut last_err = OracleError::Schema("no attempt made".into());
        for attempt in 1..=self.max_attempts {
            let started = Instant::now();
            counter!("oracle_calls_total").increment(1);
            let outcome = self
                .transport
                .complete(prompt, schema)
                .await
                .and_then(|raw| parse_strict::<D>(&raw));
            histogram!("oracle_call_ms").record(started.elapsed().as_secs_f64() * 1000.0);

            match outcome {
                Ok(v) => return Ok(v),
                Err(e) => {
                    counter!("oracle_failures_total").increment(1);
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    tracing::warn!(
                        target: "oracle",
                        attempt,
                        schema = schema.name,
                        provider = self.transport.name(),
                        error = %e,
                        "non-conforming oracle response"
                    );
                    self.transport.discard(prompt, schema);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

impl<T: OracleTransport> ScoringOracle for OracleClient<T> {
    fn evaluate<'a>(&'a self, record: &'a StartupRecord) -> OracleFuture<'a, Evaluation> {
        Box::pin(self.evaluate_record(record))
    }

    fn name(&self) -> &'static str {
        self.transport.name()
    }
}

/// Answer shape of the `startup_fill` schema: every field present, nothing extra.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct FillAnswer {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Founders")]
    founders: String,
    #[serde(rename = "Website")]
    website: String,
    #[serde(rename = "Industry")]
    industry: Vec<String>,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Early_Metrics")]
    early_metrics: String,
    #[serde(rename = "Press")]
    press: String,
    #[serde(rename = "Funding_Status")]
    funding_status: String,
    #[serde(rename = "Launch_Date")]
    launch_date: String,
    score: i64,
    funding: i64,
    stage: String,
}

/// Parse the whole response as `D`. No extraction from surrounding text.
fn parse_strict<D: DeserializeOwned>(raw: &str) -> Result<D, OracleError> {
    serde_json::from_str(raw).map_err(|e| OracleError::Schema(e.to_string()))
}

fn field<'a>(v: &'a Option<String>) -> &'a str {
    match v.as_deref() {
        Some(s) if !s.trim().is_empty() => s,
        _ => "Unknown",
    }
}

pub fn evaluation_prompt(r: &StartupRecord) -> String {
    let industry = if r.industry.is_empty() {
        "Unknown".to_string()
    } else {
        r.industry.join(", ")
    };
    format!(
        "Consider the following startup metrics and evaluate a score from 0-100:

Company Overview:
- Name: {name}
- Industry: {industry}
- Location: {location}
- Launch Date: {launch}
- Description: {description}

Traction & Growth:
- Early Metrics: {metrics}
- Press Coverage: {press}

Team:
- Founders: {founders}
- Website: {website}
- Funding Status: {funding_status}

Based on these metrics and considering:
1. Market opportunity and growth potential
2. Team background and execution ability
3. Traction and early validation
4. Overall company positioning

Provide a single integer score between 0 and 100.
From the funding status, determine the funding stage and the funding raised in dollars as an integer.
Respond with JSON: {{\"score\": int, \"funding\": int, \"stage\": string}}",
        name = field(&r.name),
        industry = industry,
        location = field(&r.location),
        launch = field(&r.launch_date),
        description = field(&r.description),
        metrics = field(&r.early_metrics),
        press = field(&r.press),
        founders = field(&r.founders),
        website = field(&r.website),
        funding_status = field(&r.funding_status),
    )
}

pub fn fill_prompt(r: &StartupRecord) -> String {
    let mut known = r.to_partial();
    known.remove("_id");
    format!(
        "Fill the missing fields of the following startup record. Keep known facts as given.\n{}",
        Value::Object(known)
    )
}

/// Build the transport described by `cfg`.
///
/// * `AI_TEST_MODE=mock` → neutral mock.
/// * `enabled == false` or a missing key → disabled (every call fails with `Disabled`).
/// * Otherwise the provider, wrapped in the file cache unless `cache_dir` is unset.
pub fn build_transport(cfg: &ScoringConfig) -> DynTransport {
    if std::env::var("AI_TEST_MODE").is_ok_and(|v| v == "mock") {
        return Arc::new(MockTransport::neutral());
    }
    if !cfg.enabled {
        return Arc::new(DisabledTransport);
    }

    let timeout = Duration::from_secs(cfg.timeout_secs);
    let model = cfg.model.as_deref();
    let built: Result<DynTransport, OracleError> = match cfg.provider.as_str() {
        "gemini" => GeminiTransport::new(cfg.api_key.clone(), model, timeout)
            .map(|t| wrap_cache(t, cfg)),
        "openai" => OpenAiTransport::new(cfg.api_key.clone(), model, timeout)
            .map(|t| wrap_cache(t, cfg)),
        other => Err(OracleError::Transport(format!("unsupported provider {other}"))),
    };

    built.unwrap_or_else(|e| {
        tracing::warn!(error = %e, provider = %cfg.provider, "oracle disabled");
        Arc::new(DisabledTransport)
    })
}

fn wrap_cache<T: OracleTransport>(t: T, cfg: &ScoringConfig) -> DynTransport {
    match &cfg.cache_dir {
        Some(dir) => Arc::new(CachingTransport::new(t, dir.clone(), cfg.daily_limit)),
        None => Arc::new(t),
    }
}

pub fn build_client(cfg: &ScoringConfig) -> OracleClient<DynTransport> {
    OracleClient::new(build_transport(cfg)).with_max_attempts(cfg.max_attempts)
}
