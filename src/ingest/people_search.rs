//! People-search API source: founder profiles → sparse startup records.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::IngestSource;
use crate::config::PeopleSearchConfig;
use crate::record::StartupRecord;

pub const ENV_API_KEY: &str = "LINKD_API_KEY";

pub struct PeopleSearchSource {
    http: reqwest::Client,
    token: String,
    cfg: PeopleSearchConfig,
}

impl PeopleSearchSource {
    pub fn new(cfg: PeopleSearchConfig, token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building people-search HTTP client")?;
        Ok(Self { http, token, cfg })
    }

    /// Token from `$LINKD_API_KEY`.
    pub fn from_env(cfg: PeopleSearchConfig) -> Result<Self> {
        let token = std::env::var(ENV_API_KEY).with_context(|| format!("Missing {ENV_API_KEY} env var"))?;
        Self::new(cfg, token)
    }
}

#[async_trait]
impl IngestSource for PeopleSearchSource {
    async fn fetch(&self) -> Result<Vec<StartupRecord>> {
        let mut params: Vec<(&str, &str)> = vec![("query", self.cfg.query.as_str())];
        params.extend(self.cfg.school.iter().map(|s| ("school", s.as_str())));

        let url = format!("{}/api/search/users", self.cfg.base_url.trim_end_matches('/'));
        let body: Value = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .await
            .context("people-search request")?
            .error_for_status()
            .context("people-search status")?
            .json()
            .await
            .context("people-search body")?;

        Ok(founder_records(&body))
    }

    fn name(&self) -> &'static str {
        "people_search"
    }
}

/// Convert a search response into one record per founder profile.
///
/// A profile counts when any experience title contains "Founder" (this also
/// covers "Co-Founder"); the first such experience describes the company.
/// Profiles repeated in the results are emitted once.
pub fn founder_records(body: &Value) -> Vec<StartupRecord> {
    let Some(results) = body.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for result in results {
        let profile = result.get("profile").unwrap_or(&Value::Null);
        let Some(exp) = result
            .get("experience")
            .and_then(Value::as_array)
            .and_then(|xs| {
                xs.iter().find(|e| {
                    e.get("title")
                        .and_then(Value::as_str)
                        .is_some_and(|t| t.contains("Founder"))
                })
            })
        else {
            continue;
        };

        let profile_id = match profile.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let name = str_at(profile, "name");
        let key = (profile_id, name.clone(), str_at(exp, "company_name"));
        if !seen.insert(key) {
            continue;
        }

        let company = Some(str_at(exp, "company_name"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown Company".to_string());
        let launch = str_at(exp, "start_date")
            .split('T')
            .next()
            .unwrap_or_default()
            .to_string();
        let location = Some(str_at(exp, "location"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| str_at(profile, "location"));

        let mut linkedin = Map::new();
        linkedin.insert(name.clone(), Value::String(str_at(profile, "linkedin_url")));
        let mut extra = Map::new();
        extra.insert("Founder_LinkedIn".into(), Value::Object(linkedin));

        out.push(StartupRecord {
            name: Some(company),
            description: non_empty(str_at(profile, "headline")),
            founders: non_empty(name),
            launch_date: non_empty(launch),
            location: non_empty(location),
            extra,
            ..Default::default()
        });
    }
    out
}

fn str_at(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}
