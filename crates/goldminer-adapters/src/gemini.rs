//! Gemini `generateContent` appraiser.

use std::time::Duration;

use async_trait::async_trait;
use goldminer_core::{Appraisal, Appraiser, PortResult, Repo, RunContext};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{AdapterError, Result};
use crate::http::{build_client, send_text};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Read `GEMINI_API_KEY` (required) and `GEMINI_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AdapterError::NotConfigured("GEMINI_API_KEY"))?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub struct GeminiAppraiser {
    config: GeminiConfig,
    http: Client,
}

impl GeminiAppraiser {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = build_client(config.timeout)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn endpoint(&self) -> Result<Url> {
        let raw = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        Ok(Url::parse_with_params(&raw, &[("key", self.config.api_key.as_str())])?)
    }
}

#[async_trait]
impl Appraiser for GeminiAppraiser {
    #[instrument(skip_all, fields(repo = %repo.name))]
    async fn appraise(&self, ctx: &RunContext, repo: &Repo) -> PortResult<Appraisal> {
        let request = self
            .http
            .post(self.endpoint()?)
            .json(&GenerateRequest::for_prompt(build_prompt(repo)));

        let body = send_text(ctx, request).await?;
        let reply: GenerateResponse = serde_json::from_str(&body).map_err(AdapterError::from)?;
        let text = reply.first_text()?;
        let appraisal = parse_appraisal(&text)?;
        debug!(score = appraisal.score, is_ai_tool = appraisal.is_ai_tool, "appraised");
        Ok(appraisal)
    }
}

pub fn build_prompt(repo: &Repo) -> String {
    let description = if repo.description.is_empty() {
        "(none)"
    } else {
        repo.description.as_str()
    };
    format!(
        r#"You review newly published open-source repositories for developers.
Decide whether the project below is an AI programming tool: a coding agent,
AI-assisted IDE or editor extension, code generation or review tool, or other
software that uses AI to help people write code.

Name: {name}
URL: {url}
Language: {language}
Stars: {stars}
Description: {description}

Reply with a single JSON object and nothing else:
{{"is_ai_programming_tool": <true|false>, "score": <0-100>, "review": "<two or three sentences>"}}
The score rates how useful and novel the tool is for working programmers."#,
        name = repo.name,
        url = repo.url,
        language = if repo.language.is_empty() { "unknown" } else { repo.language.as_str() },
        stars = repo.stars,
        description = description,
    )
}

/// The span from the first `{` to the last `}` of a model reply.
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse a model reply into an [`Appraisal`], clamping the score into `0..=100`.
pub fn parse_appraisal(raw: &str) -> Result<Appraisal> {
    let json = extract_json(raw)
        .ok_or_else(|| AdapterError::Decode(format!("no JSON object in reply: {raw}")))?;
    let verdict: Verdict = serde_json::from_str(json)?;
    Ok(Appraisal {
        is_ai_tool: verdict.is_ai_programming_tool,
        score: verdict.score.clamp(0.0, 100.0).round() as u8,
        review: verdict.review.trim().to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(default, alias = "is_ai_tool")]
    is_ai_programming_tool: bool,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    review: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateRequest {
    fn for_prompt(prompt: String) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    fn first_text(self) -> Result<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AdapterError::Decode("empty model reply".into()))
    }
}
