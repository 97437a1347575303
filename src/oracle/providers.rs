//! Concrete oracle transports.
//!
//! Each transport performs exactly one remote call per `complete` and returns
//! the raw JSON text. Validation against the schema happens in `OracleClient`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{OracleError, OracleFuture, OracleTransport, OutputSchema};

const USER_AGENT: &str = concat!("startup-scorer/", env!("CARGO_PKG_VERSION"));

const SYSTEM_PROMPT: &str = "You evaluate early-stage startups. Answer only with JSON matching the requested schema.";

fn http_client(timeout: Duration) -> Result<reqwest::Client, OracleError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .map_err(|e| OracleError::Transport(e.to_string()))
}

fn map_reqwest(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Transport(e.to_string())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, OracleError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(OracleError::Http {
        status: status.as_u16(),
        body: body.chars().take(300).collect(),
    })
}

// ------------------------------------------------------------
// Gemini (generateContent with responseSchema)
// ------------------------------------------------------------

pub struct GeminiTransport {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiTransport {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";

    pub fn new(api_key: String, model: Option<&str>, timeout: Duration) -> Result<Self, OracleError> {
        if api_key.trim().is_empty() {
            return Err(OracleError::MissingApiKey("gemini"));
        }
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            model: model.unwrap_or(Self::DEFAULT_MODEL).to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl OracleTransport for GeminiTransport {
    fn complete<'a>(&'a self, prompt: &'a str, schema: &'a OutputSchema) -> OracleFuture<'a, String> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Part<'a> {
                text: &'a str,
            }
            #[derive(Serialize)]
            struct Content<'a> {
                role: &'a str,
                parts: Vec<Part<'a>>,
            }
            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct GenConfig {
                response_mime_type: &'static str,
                response_schema: Value,
            }
            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct Req<'a> {
                system_instruction: Content<'a>,
                contents: Vec<Content<'a>>,
                generation_config: GenConfig,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                candidates: Vec<Candidate>,
            }
            #[derive(Deserialize)]
            struct Candidate {
                content: Option<RespContent>,
            }
            #[derive(Deserialize)]
            struct RespContent {
                #[serde(default)]
                parts: Vec<RespPart>,
            }
            #[derive(Deserialize)]
            struct RespPart {
                text: Option<String>,
            }

            let req = Req {
                system_instruction: Content {
                    role: "system",
                    parts: vec![Part {
                        text: SYSTEM_PROMPT,
                    }],
                },
                contents: vec![Content {
                    role: "user",
                    parts: vec![Part { text: prompt }],
                }],
                generation_config: GenConfig {
                    response_mime_type: "application/json",
                    response_schema: schema.to_openapi(),
                },
            };

            let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
            let resp = self
                .http
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(map_reqwest)?;
            let body: Resp = check_status(resp).await?.json().await.map_err(map_reqwest)?;

            body.candidates
                .into_iter()
                .filter_map(|c| c.content)
                .flat_map(|c| c.parts)
                .find_map(|p| p.text)
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| OracleError::Schema("empty candidate list".into()))
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ------------------------------------------------------------
// OpenAI (chat completions with strict json_schema)
// ------------------------------------------------------------

pub struct OpenAiTransport {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiTransport {
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    pub fn new(api_key: String, model: Option<&str>, timeout: Duration) -> Result<Self, OracleError> {
        if api_key.trim().is_empty() {
            return Err(OracleError::MissingApiKey("openai"));
        }
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            model: model.unwrap_or(Self::DEFAULT_MODEL).to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl OracleTransport for OpenAiTransport {
    fn complete<'a>(&'a self, prompt: &'a str, schema: &'a OutputSchema) -> OracleFuture<'a, String> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct JsonSchema<'a> {
                name: &'a str,
                strict: bool,
                schema: &'a Value,
            }
            #[derive(Serialize)]
            struct ResponseFormat<'a> {
                #[serde(rename = "type")]
                kind: &'a str,
                json_schema: JsonSchema<'a>,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                response_format: ResponseFormat<'a>,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: Option<String>,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Msg {
                        role: "user",
                        content: prompt,
                    },
                ],
                temperature: 0.2,
                response_format: ResponseFormat {
                    kind: "json_schema",
                    json_schema: JsonSchema {
                        name: schema.name,
                        strict: true,
                        schema: &schema.schema,
                    },
                },
            };

            let resp = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(map_reqwest)?;
            let body: Resp = check_status(resp).await?.json().await.map_err(map_reqwest)?;

            body.choices
                .into_iter()
                .find_map(|c| c.message.content)
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| OracleError::Schema("empty completion".into()))
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Always fails with `OracleError::Disabled`; used when scoring is switched off.
pub struct DisabledTransport;

impl OracleTransport for DisabledTransport {
    fn complete<'a>(&'a self, _prompt: &'a str, _schema: &'a OutputSchema) -> OracleFuture<'a, String> {
        Box::pin(async { Err(OracleError::Disabled) })
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns a fixed body per schema name. Deterministic stand-in for tests and local runs.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: HashMap<&'static str, String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, schema_name: &'static str, body: impl Into<String>) -> Self {
        self.responses.insert(schema_name, body.into());
        self
    }

    /// Mock used by `AI_TEST_MODE=mock`: neutral evaluation, blank fill.
    pub fn neutral() -> Self {
        Self::new()
            .with_response(
                OutputSchema::evaluation().name,
                r#"{"score":50,"funding":0,"stage":"unknown"}"#,
            )
            .with_response(
                OutputSchema::startup_fill().name,
                r#"{"Name":"","Description":"","Founders":"","Website":"","Industry":[],"Location":"","Early_Metrics":"","Press":"","Funding_Status":"","Launch_Date":"","score":50,"funding":0,"stage":"unknown"}"#,
            )
    }
}

impl OracleTransport for MockTransport {
    fn complete<'a>(&'a self, _prompt: &'a str, schema: &'a OutputSchema) -> OracleFuture<'a, String> {
        let out = self
            .responses
            .get(schema.name)
            .cloned()
            .ok_or_else(|| OracleError::Transport(format!("mock has no response for {}", schema.name)));
        Box::pin(async move { out })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
