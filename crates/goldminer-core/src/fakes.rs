//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `StaticFetcher`, `StaticCommitInspector`, `ScriptedAppraiser`
//! and `RecordingNotifier`. Each records how it was called and can be told
//! to fail. The storage fake is [`goldminer_state::MemoryRepoStore`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::RunContext;
use crate::error::PortError;
use crate::ports::*;
use crate::Repo;

// ---------------------------------------------------------------------------
// StaticFetcher
// ---------------------------------------------------------------------------

/// Fetcher serving fixed result sets per source.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    trending: Mutex<Vec<Repo>>,
    trending_fails: Mutex<bool>,
    topics: Mutex<HashMap<String, Option<Vec<Repo>>>>,
    calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trending(self, repos: Vec<Repo>) -> Self {
        *self.trending.lock().unwrap() = repos;
        self
    }

    pub fn with_topic(self, topic: &str, repos: Vec<Repo>) -> Self {
        self.topics
            .lock()
            .unwrap()
            .insert(topic.to_string(), Some(repos));
        self
    }

    /// Make the trending source fail.
    pub fn failing_trending(self) -> Self {
        *self.trending_fails.lock().unwrap() = true;
        self
    }

    pub fn failing_topic(self, topic: &str) -> Self {
        self.topics.lock().unwrap().insert(topic.to_string(), None);
        self
    }

    /// Sources queried so far: `trending:<lang>:<window>` or `topic:<t>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn trending(
        &self,
        _ctx: &RunContext,
        language: &str,
        window: TrendingWindow,
    ) -> PortResult<Vec<Repo>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("trending:{language}:{window}"));
        if *self.trending_fails.lock().unwrap() {
            return Err(PortError::Unavailable("trending search down".into()));
        }
        Ok(self.trending.lock().unwrap().clone())
    }

    async fn by_topic(&self, _ctx: &RunContext, topic: &str) -> PortResult<Vec<Repo>> {
        self.calls.lock().unwrap().push(format!("topic:{topic}"));
        match self.topics.lock().unwrap().get(topic) {
            Some(Some(repos)) => Ok(repos.clone()),
            Some(None) => Err(PortError::Unavailable(format!("topic {topic} down"))),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticCommitInspector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum FileScript {
    Files(Vec<String>),
    NoInfo,
    Fail,
}

#[derive(Debug, Default)]
struct RepoHistory {
    commits: Vec<(String, FileScript)>,
    fail_listing: bool,
}

/// Commit inspector over scripted histories keyed by `owner/name`.
///
/// Repositories with no script have no commits.
#[derive(Debug, Default)]
pub struct StaticCommitInspector {
    histories: Mutex<HashMap<String, RepoHistory>>,
    list_calls: AtomicUsize,
    file_calls: AtomicUsize,
}

impl StaticCommitInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commit touching `files`. Commits are listed in insertion order.
    pub fn with_commit(self, full_name: &str, sha: &str, files: &[&str]) -> Self {
        let files = files.iter().map(|f| f.to_string()).collect();
        self.push(full_name, sha, FileScript::Files(files));
        self
    }

    /// A commit for which no file information is available.
    pub fn with_opaque_commit(self, full_name: &str, sha: &str) -> Self {
        self.push(full_name, sha, FileScript::NoInfo);
        self
    }

    /// A commit whose detail request always fails.
    pub fn with_broken_commit(self, full_name: &str, sha: &str) -> Self {
        self.push(full_name, sha, FileScript::Fail);
        self
    }

    /// Listing commits for this repository always fails.
    pub fn with_failing_listing(self, full_name: &str) -> Self {
        self.histories
            .lock()
            .unwrap()
            .entry(full_name.to_string())
            .or_default()
            .fail_listing = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn file_calls(&self) -> usize {
        self.file_calls.load(Ordering::SeqCst)
    }

    fn push(&self, full_name: &str, sha: &str, script: FileScript) {
        self.histories
            .lock()
            .unwrap()
            .entry(full_name.to_string())
            .or_default()
            .commits
            .push((sha.to_string(), script));
    }
}

#[async_trait]
impl CommitInspector for StaticCommitInspector {
    async fn recent_commits(
        &self,
        _ctx: &RunContext,
        owner: &str,
        name: &str,
        limit: usize,
    ) -> PortResult<Vec<CommitRef>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let histories = self.histories.lock().unwrap();
        let Some(history) = histories.get(&format!("{owner}/{name}")) else {
            return Ok(Vec::new());
        };
        if history.fail_listing {
            return Err(PortError::Unavailable("commit listing failed".into()));
        }
        Ok(history
            .commits
            .iter()
            .take(limit)
            .map(|(sha, _)| CommitRef::new(sha.clone()))
            .collect())
    }

    async fn commit_files(
        &self,
        _ctx: &RunContext,
        owner: &str,
        name: &str,
        sha: &str,
    ) -> PortResult<Option<Vec<String>>> {
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        let histories = self.histories.lock().unwrap();
        let script = histories
            .get(&format!("{owner}/{name}"))
            .and_then(|h| h.commits.iter().find(|(s, _)| s == sha))
            .map(|(_, script)| script.clone());
        match script {
            Some(FileScript::Files(files)) => Ok(Some(files)),
            Some(FileScript::NoInfo) => Ok(None),
            Some(FileScript::Fail) => Err(PortError::Unavailable(format!("commit {sha} failed"))),
            None => Err(PortError::InvalidResponse(format!("unknown commit {sha}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedAppraiser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Verdict {
    Returns(Appraisal),
    Fails,
    Hangs,
    Panics,
}

/// Appraiser answering from a per-identifier script.
///
/// Unscripted repositories are judged "not a tool" with score 0.
#[derive(Debug, Default)]
pub struct ScriptedAppraiser {
    verdicts: Mutex<HashMap<String, Verdict>>,
    latency: Mutex<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedAppraiser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_score(self, id: &str, is_ai_tool: bool, score: u8, review: &str) -> Self {
        let appraisal = Appraisal {
            is_ai_tool,
            score,
            review: review.to_string(),
        };
        self.script(id, Verdict::Returns(appraisal));
        self
    }

    pub fn failing(self, id: &str) -> Self {
        self.script(id, Verdict::Fails);
        self
    }

    /// Never answers for this identifier.
    pub fn hanging(self, id: &str) -> Self {
        self.script(id, Verdict::Hangs);
        self
    }

    /// Panics instead of answering for this identifier.
    pub fn panicking(self, id: &str) -> Self {
        self.script(id, Verdict::Panics);
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of concurrent `appraise` calls observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn script(&self, id: &str, verdict: Verdict) {
        self.verdicts
            .lock()
            .unwrap()
            .insert(id.to_string(), verdict);
    }
}

#[async_trait]
impl Appraiser for ScriptedAppraiser {
    async fn appraise(&self, _ctx: &RunContext, repo: &Repo) -> PortResult<Appraisal> {
        self.calls.lock().unwrap().push(repo.id().to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let verdict = self.verdicts.lock().unwrap().get(repo.id()).cloned();
        let result = match verdict {
            Some(Verdict::Returns(a)) => Ok(a),
            Some(Verdict::Fails) => Err(PortError::InvalidResponse("unparseable verdict".into())),
            Some(Verdict::Hangs) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                return futures::future::pending().await;
            }
            Some(Verdict::Panics) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("scripted appraiser panic for {}", repo.id());
            }
            None => Ok(Appraisal {
                is_ai_tool: false,
                score: 0,
                review: String::new(),
            }),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

/// Notifier that remembers who it notified.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    fail_all: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(self, id: &str) -> Self {
        self.failing.lock().unwrap().insert(id.to_string());
        self
    }

    pub fn failing_always(self) -> Self {
        *self.fail_all.lock().unwrap() = true;
        self
    }

    /// Identifiers successfully notified, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _ctx: &RunContext, repo: &Repo) -> PortResult<()> {
        if *self.fail_all.lock().unwrap() || self.failing.lock().unwrap().contains(repo.id()) {
            return Err(PortError::Unavailable("webhook rejected message".into()));
        }
        self.sent.lock().unwrap().push(repo.id().to_string());
        Ok(())
    }
}
