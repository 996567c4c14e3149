//! Collaborator traits the pipeline is written against.
//!
//! - `Fetcher`: candidate sources (trending search, topic search)
//! - `CommitInspector`: recent commit history for the activity filter
//! - `Appraiser`: LLM judgement of a single repository
//! - `Notifier`: push channel for qualifying repositories
//!
//! Storage is [`goldminer_state::RepoStore`]. Production implementations live
//! in `goldminer-adapters`; in-memory fakes in [`crate::fakes`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::error::PortError;
use crate::Repo;

/// Result type for collaborator calls
pub type PortResult<T> = std::result::Result<T, PortError>;

/// Look-back window for the trending source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingWindow {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl TrendingWindow {
    pub fn days(&self) -> i64 {
        match self {
            TrendingWindow::Daily => 1,
            TrendingWindow::Weekly => 7,
            TrendingWindow::Monthly => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendingWindow::Daily => "daily",
            TrendingWindow::Weekly => "weekly",
            TrendingWindow::Monthly => "monthly",
        }
    }
}

impl fmt::Display for TrendingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendingWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(TrendingWindow::Daily),
            "weekly" => Ok(TrendingWindow::Weekly),
            "monthly" => Ok(TrendingWindow::Monthly),
            other => Err(format!("unknown trending window: {other}")),
        }
    }
}

/// A commit in a repository's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    pub sha: String,
    pub message: String,
}

impl CommitRef {
    pub fn new(sha: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            message: String::new(),
        }
    }
}

/// What an appraiser decided about one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appraisal {
    pub is_ai_tool: bool,
    pub score: u8,
    pub review: String,
}

impl Appraisal {
    /// Copy the appraisal fields onto a working record. Nothing else is touched.
    pub fn apply_to(&self, repo: &mut Repo) {
        repo.is_ai_tool = self.is_ai_tool;
        repo.score = self.score;
        repo.review = self.review.clone();
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Recently created repositories in `language` (`"all"` for any), most starred first.
    async fn trending(
        &self,
        ctx: &RunContext,
        language: &str,
        window: TrendingWindow,
    ) -> PortResult<Vec<Repo>>;

    /// Repositories tagged with `topic`.
    async fn by_topic(&self, ctx: &RunContext, topic: &str) -> PortResult<Vec<Repo>>;
}

#[async_trait]
pub trait CommitInspector: Send + Sync {
    /// Up to `limit` most recent commits, newest first.
    async fn recent_commits(
        &self,
        ctx: &RunContext,
        owner: &str,
        name: &str,
        limit: usize,
    ) -> PortResult<Vec<CommitRef>>;

    /// Paths touched by a commit. `None` when the backend has no file information.
    async fn commit_files(
        &self,
        ctx: &RunContext,
        owner: &str,
        name: &str,
        sha: &str,
    ) -> PortResult<Option<Vec<String>>>;
}

#[async_trait]
pub trait Appraiser: Send + Sync {
    async fn appraise(&self, ctx: &RunContext, repo: &Repo) -> PortResult<Appraisal>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, ctx: &RunContext, repo: &Repo) -> PortResult<()>;
}
