//! Feishu custom-bot webhook notifier
//!
//! Each discovery is pushed as an interactive card (schema 2.0): a markdown
//! body with the repository facts and the appraisal, plus a button that opens
//! the repository page.

use std::time::Duration;

use async_trait::async_trait;
use goldminer_core::retry::{self, RetryConfig};
use goldminer_core::{Notifier, PortResult, Repo, RunContext};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::error::{from_retry, AdapterError, Result};
use crate::http::{build_client, send_text};

#[derive(Debug, Clone)]
pub struct FeishuConfig {
    pub webhook_url: String,
    pub timeout: Duration,
}

impl FeishuConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Read `FEISHU_WEBHOOK`.
    pub fn from_env() -> Result<Self> {
        std::env::var("FEISHU_WEBHOOK")
            .ok()
            .filter(|w| !w.trim().is_empty())
            .map(Self::new)
            .ok_or(AdapterError::NotConfigured("FEISHU_WEBHOOK"))
    }
}

pub struct FeishuNotifier {
    config: FeishuConfig,
    http: Client,
    retry: RetryConfig,
}

impl FeishuNotifier {
    pub fn new(config: FeishuConfig) -> Result<Self> {
        let http = build_client(config.timeout)?;
        Ok(Self {
            config,
            http,
            retry: RetryConfig::new()
                .with_max_retries(3)
                .with_initial_delay(Duration::from_millis(500)),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(FeishuConfig::from_env()?)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Notifier for FeishuNotifier {
    #[instrument(skip_all, fields(repo = %repo.name))]
    async fn notify(&self, ctx: &RunContext, repo: &Repo) -> PortResult<()> {
        let card = build_card(repo);
        let body = retry::execute(ctx, &self.retry, || {
            send_text(ctx, self.http.post(&self.config.webhook_url).json(&card))
        })
        .await
        .map_err(from_retry)?;

        check_reply(&body)?;
        info!("card delivered");
        Ok(())
    }
}

/// The bot answers 200 even for refused messages; a non-zero `code` means refused.
fn check_reply(body: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct Reply {
        #[serde(default, alias = "StatusCode")]
        code: i64,
        #[serde(default, alias = "StatusMessage")]
        msg: String,
    }

    match serde_json::from_str::<Reply>(body) {
        Ok(reply) if reply.code != 0 => Err(AdapterError::Rejected(format!(
            "code {}: {}",
            reply.code, reply.msg
        ))),
        _ => Ok(()),
    }
}

pub fn card_markdown(repo: &Repo) -> String {
    let language = if repo.language.is_empty() {
        "unknown"
    } else {
        repo.language.as_str()
    };
    format!(
        "**⭐ Stars:** {stars}  |  **Language:** {language}  |  **Created:** {created}\n\
         **🏆 Score:** {score}/100\n\n\
         **📝 Description:**\n{description}\n\n\
         **🤖 Review:**\n{review}\n\n\
         **📈 Star growth:** {growth:.2} stars/day\n",
        stars = repo.stars,
        created = repo.created_at.format("%Y-%m-%d"),
        score = repo.score,
        description = repo.description,
        review = repo.review,
        growth = repo.star_growth_rate,
    )
}

pub fn build_card(repo: &Repo) -> Value {
    json!({
        "msg_type": "interactive",
        "card": {
            "schema": "2.0",
            "config": { "update_multi": true },
            "header": {
                "title": {
                    "tag": "plain_text",
                    "content": format!("🚨 New AI programming tool: {}", repo.name),
                },
                "template": "blue",
            },
            "body": {
                "direction": "vertical",
                "elements": [
                    {
                        "tag": "markdown",
                        "content": card_markdown(repo),
                        "text_size": "normal",
                    },
                    {
                        "tag": "button",
                        "text": { "tag": "plain_text", "content": "🔗 View source" },
                        "type": "primary",
                        "behaviors": [
                            { "type": "open_url", "default_url": repo.url },
                        ],
                    },
                ],
            },
        },
    })
}
