//! # Startup record
//! The unit of work flowing through ingest → fill → scoring → normalization.
//!
//! Field names match the stored documents (`Name`, `Early_Metrics`, ...), so a
//! record round-trips through the store without renaming. Keys this model does
//! not know about are kept in `extra`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Loosely-structured record as produced by ingestion sources and the oracle.
pub type PartialRecord = Map<String, Value>;

/// Opaque storage key. Assigned by the store on first insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The oracle's per-record answer: raw score, funding estimate, funding stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Evaluation {
    pub score: i64,
    pub funding: i64,
    pub stage: String,
}

/// Fields written back by `StartupStore::update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub score: f64,
    pub funding: i64,
    pub stage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,

    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Founders", default, skip_serializing_if = "Option::is_none")]
    pub founders: Option<String>,
    #[serde(rename = "Website", default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(
        rename = "Industry",
        default,
        deserialize_with = "string_or_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub industry: Vec<String>,
    #[serde(rename = "Location", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(
        rename = "Early_Metrics",
        alias = "Early Metrics",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub early_metrics: Option<String>,
    #[serde(rename = "Press", default, skip_serializing_if = "Option::is_none")]
    pub press: Option<String>,
    #[serde(
        rename = "Funding_Status",
        alias = "Funding Status",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub funding_status: Option<String>,
    #[serde(
        rename = "Launch_Date",
        alias = "Launch Date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub launch_date: Option<String>,

    // Scored fields: all three present or all three absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Keys outside the model (e.g. `Founder_LinkedIn`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StartupRecord {
    /// Display name used in logs.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown Company")
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluation().is_some()
    }

    /// The scored triple, if the record has been evaluated.
    pub fn evaluation(&self) -> Option<Evaluation> {
        match (self.score, self.funding, self.stage.as_ref()) {
            (Some(score), Some(funding), Some(stage)) => Some(Evaluation {
                score: score.round() as i64,
                funding,
                stage: stage.clone(),
            }),
            _ => None,
        }
    }

    /// Set all three scored fields at once.
    pub fn apply_evaluation(&mut self, eval: &Evaluation) {
        self.score = Some(eval.score as f64);
        self.funding = Some(eval.funding);
        self.stage = Some(eval.stage.clone());
    }

    /// Current scored fields as an update payload (missing funding/stage become `0`/`""`).
    pub fn score_update(&self) -> Option<ScoreUpdate> {
        self.score.map(|score| ScoreUpdate {
            score,
            funding: self.funding.unwrap_or(0),
            stage: self.stage.clone().unwrap_or_default(),
        })
    }

    pub fn apply_update(&mut self, update: &ScoreUpdate) {
        self.score = Some(update.score);
        self.funding = Some(update.funding);
        self.stage = Some(update.stage.clone());
    }

    pub fn to_partial(&self) -> PartialRecord {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => PartialRecord::new(),
        }
    }

    pub fn from_partial(map: PartialRecord) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(map))
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) if s.trim().is_empty() => Vec::new(),
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Nothing(()) => Vec::new(),
    })
}
