//! GitHub REST client
//!
//! Serves both candidate discovery ([`Fetcher`]) through the repository search
//! API and commit inspection ([`CommitInspector`]) for the activity filter.
//! Search calls retry on their own; commit calls are single shots because the
//! activity filter owns their retry policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use goldminer_core::retry::{self, RetryConfig};
use goldminer_core::{
    Clock, CommitInspector, CommitRef, Fetcher, PortResult, Repo, RunContext,
    SystemClock, TrendingWindow,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{from_retry, AdapterError, Result};
use crate::http::{build_client, send_text};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const TRENDING_PAGE_SIZE: u32 = 10;
pub const TOPIC_PAGE_SIZE: u32 = 3;

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_base: String,
    /// Personal access token; anonymous requests when absent
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl GithubConfig {
    /// Read `GITHUB_TOKEN` and the optional `GITHUB_API_URL` override.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        if let Ok(base) = std::env::var("GITHUB_API_URL") {
            config.api_base = base;
        }
        config
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

pub struct GithubClient {
    config: GithubConfig,
    http: Client,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let http = build_client(config.timeout)?;
        Ok(Self {
            config,
            http,
            clock: Arc::new(SystemClock),
            retry: RetryConfig::new()
                .with_max_retries(3)
                .with_initial_delay(Duration::from_secs(1)),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GithubConfig::from_env())
    }

    /// Clock used to compute the trending creation cutoff.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retry policy for search requests.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn search(&self, ctx: &RunContext, query: &str, per_page: u32) -> PortResult<Vec<Repo>> {
        let url = search_url(&self.config.api_base, query, per_page)?;
        let body = retry::execute(ctx, &self.retry, || send_text(ctx, self.get(url.clone())))
            .await
            .map_err(from_retry)?;

        let parsed: SearchResponse = serde_json::from_str(&body).map_err(AdapterError::from)?;
        debug!(query, count = parsed.items.len(), "search returned");
        Ok(parsed.items.into_iter().map(GithubRepo::into_repo).collect())
    }
}

#[async_trait]
impl Fetcher for GithubClient {
    #[instrument(skip(self, ctx, window), fields(window = %window))]
    async fn trending(
        &self,
        ctx: &RunContext,
        language: &str,
        window: TrendingWindow,
    ) -> PortResult<Vec<Repo>> {
        let query = trending_query(language, window, self.clock.now());
        self.search(ctx, &query, TRENDING_PAGE_SIZE).await
    }

    #[instrument(skip(self, ctx))]
    async fn by_topic(&self, ctx: &RunContext, topic: &str) -> PortResult<Vec<Repo>> {
        self.search(ctx, &format!("topic:{topic}"), TOPIC_PAGE_SIZE)
            .await
    }
}

#[async_trait]
impl CommitInspector for GithubClient {
    async fn recent_commits(
        &self,
        ctx: &RunContext,
        owner: &str,
        name: &str,
        limit: usize,
    ) -> PortResult<Vec<CommitRef>> {
        let mut url = repo_url(&self.config.api_base, owner, name, &["commits"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &limit.to_string());

        let body = send_text(ctx, self.get(url)).await?;
        let listed: Vec<CommitSummary> =
            serde_json::from_str(&body).map_err(AdapterError::from)?;
        Ok(listed
            .into_iter()
            .take(limit)
            .map(CommitSummary::into_ref)
            .collect())
    }

    async fn commit_files(
        &self,
        ctx: &RunContext,
        owner: &str,
        name: &str,
        sha: &str,
    ) -> PortResult<Option<Vec<String>>> {
        let url = repo_url(&self.config.api_base, owner, name, &["commits", sha])?;
        let body = send_text(ctx, self.get(url)).await?;
        let detail: CommitDetail = serde_json::from_str(&body).map_err(AdapterError::from)?;
        Ok(detail.file_names())
    }
}

/// Search qualifier for repositories created inside `window`, ending at `now`.
///
/// `"all"` (any case) or an empty language drops the language qualifier.
pub fn trending_query(language: &str, window: TrendingWindow, now: DateTime<Utc>) -> String {
    let since = (now - chrono::Duration::days(window.days())).format("%Y-%m-%d");
    let language = language.trim();
    if language.is_empty() || language.eq_ignore_ascii_case("all") {
        format!("created:>{since}")
    } else {
        format!("language:{language} created:>{since}")
    }
}

pub fn search_url(api_base: &str, query: &str, per_page: u32) -> Result<Url> {
    let base = format!("{}/search/repositories", api_base.trim_end_matches('/'));
    let per_page = per_page.to_string();
    let url = Url::parse_with_params(
        &base,
        &[
            ("q", query),
            ("sort", "stars"),
            ("order", "desc"),
            ("per_page", per_page.as_str()),
        ],
    )?;
    Ok(url)
}

fn repo_url(api_base: &str, owner: &str, name: &str, tail: &[&str]) -> Result<Url> {
    let mut url = Url::parse(api_base)?;
    url.path_segments_mut()
        .map_err(|_| AdapterError::Decode(format!("{api_base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(["repos", owner, name])
        .extend(tail);
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<GithubRepo>,
}

#[derive(Debug, Deserialize)]
struct GithubRepo {
    id: u64,
    full_name: String,
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u32,
    language: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl GithubRepo {
    fn into_repo(self) -> Repo {
        let mut repo = Repo::new(
            format!("github-{}", self.id),
            self.full_name,
            self.html_url,
            self.created_at,
        )
        .with_stars(self.stargazers_count);
        if let Some(description) = self.description {
            repo = repo.with_description(description);
        }
        if let Some(language) = self.language {
            repo = repo.with_language(language);
        }
        if let Some(updated_at) = self.updated_at {
            repo = repo.with_updated_at(updated_at);
        }
        repo
    }
}

#[derive(Debug, Deserialize)]
struct CommitSummary {
    sha: String,
    commit: Option<CommitBody>,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    #[serde(default)]
    message: String,
}

impl CommitSummary {
    fn into_ref(self) -> CommitRef {
        let mut commit = CommitRef::new(self.sha);
        if let Some(body) = self.commit {
            commit.message = body.message;
        }
        commit
    }
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    files: Option<Vec<CommitFile>>,
}

#[derive(Debug, Deserialize)]
struct CommitFile {
    filename: String,
}

impl CommitDetail {
    fn file_names(self) -> Option<Vec<String>> {
        self.files
            .map(|files| files.into_iter().map(|f| f.filename).collect())
    }
}
