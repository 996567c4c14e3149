//! Candidate filtering: age cut-off and README-only activity detection.
//!
//! The activity check errs on the side of keeping a repository. It is only
//! dropped when the inspector positively shows that every inspected commit
//! touched README files alone (or that there are no commits at all).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::context::RunContext;
use crate::error::{FilterError, PortError};
use crate::ports::CommitInspector;
use crate::retry::{self, RetryConfig, RetryError};
use crate::Repo;

/// Most recent commits inspected per repository.
pub const COMMITS_TO_INSPECT: usize = 10;

const README_NAMES: &[&str] = &[
    "readme",
    "readme.md",
    "readme.txt",
    "readme.rst",
    "readme.markdown",
    "readme.mdown",
    "readme.mkdn",
];

/// Case-insensitive exact match of the last path segment against README variants.
pub fn is_readme_file(path: &str) -> bool {
    let base = path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path);
    let lower = base.to_lowercase();
    README_NAMES.iter().any(|name| *name == lower)
}

/// Split `https://github.com/<owner>/<name>[/...]` into `(owner, name)`.
pub fn parse_github_url(raw: &str) -> Option<(String, String)> {
    let url = Url::parse(raw).ok()?;
    if url.host_str()? != "github.com" {
        return None;
    }
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let name = segments.next()?;
    Some((owner.to_string(), name.to_string()))
}

/// Keep repositories created at most `max_days_old` days before `now` (inclusive).
pub fn filter_by_age(repos: &[Repo], max_days_old: u32, now: DateTime<Utc>) -> Vec<Repo> {
    let max_age = chrono::Duration::days(i64::from(max_days_old));
    repos
        .iter()
        .filter(|r| now - r.created_at <= max_age)
        .cloned()
        .collect()
}

enum Activity {
    Real,
    ReadmeOnly,
    /// Could not be established; the repository is kept.
    Unknown,
}

pub struct ActivityFilter {
    inspector: Option<Arc<dyn CommitInspector>>,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
}

impl Default for ActivityFilter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ActivityFilter {
    pub fn new(inspector: Option<Arc<dyn CommitInspector>>) -> Self {
        Self {
            inspector,
            clock: Arc::new(SystemClock),
            retry: RetryConfig::new()
                .with_max_retries(2)
                .with_initial_delay(Duration::from_millis(500)),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// [`filter_by_age`] against this filter's clock.
    pub fn filter_by_age(&self, repos: &[Repo], max_days_old: u32) -> Vec<Repo> {
        let kept = filter_by_age(repos, max_days_old, self.clock.now());
        debug!(before = repos.len(), after = kept.len(), max_days_old, "age filter applied");
        kept
    }

    /// Drop repositories whose recent history only touches README files.
    pub async fn filter_by_recent_activity(
        &self,
        ctx: &RunContext,
        repos: &[Repo],
    ) -> Result<Vec<Repo>, FilterError> {
        let Some(inspector) = self.inspector.as_deref() else {
            return Ok(repos.to_vec());
        };

        let mut kept = Vec::with_capacity(repos.len());
        for repo in repos {
            if let Some(cause) = ctx.err() {
                return Err(FilterError::Cancelled(cause));
            }

            let Some((owner, name)) = parse_github_url(&repo.url) else {
                warn!(repo = %repo.name, url = %repo.url, "cannot parse repository url, keeping");
                kept.push(repo.clone());
                continue;
            };

            match self.activity(ctx, inspector, &owner, &name).await? {
                Activity::Real => kept.push(repo.clone()),
                Activity::Unknown => {
                    debug!(repo = %repo.name, "activity unknown, keeping");
                    kept.push(repo.clone());
                }
                Activity::ReadmeOnly => {
                    info!(repo = %repo.name, "dropping repository with README-only commits");
                }
            }
        }
        Ok(kept)
    }

    async fn activity(
        &self,
        ctx: &RunContext,
        inspector: &dyn CommitInspector,
        owner: &str,
        name: &str,
    ) -> Result<Activity, FilterError> {
        let listed = retry::execute(ctx, &self.retry, move || {
            inspector.recent_commits(ctx, owner, name, COMMITS_TO_INSPECT)
        })
        .await;

        let commits = match listed {
            Ok(commits) => commits,
            Err(e) => {
                interrupted(&e)?;
                warn!(owner, name, error = %e, "listing commits failed, keeping");
                return Ok(Activity::Unknown);
            }
        };

        if commits.is_empty() {
            return Ok(Activity::ReadmeOnly);
        }

        let mut unknown = false;
        for commit in commits.iter().take(COMMITS_TO_INSPECT) {
            let sha = commit.sha.as_str();
            let files = retry::execute(ctx, &self.retry, move || {
                inspector.commit_files(ctx, owner, name, sha)
            })
            .await;

            match files {
                Ok(None) => return Ok(Activity::Real),
                Ok(Some(paths)) if paths.is_empty() => return Ok(Activity::Real),
                Ok(Some(paths)) => {
                    if paths.iter().any(|p| !is_readme_file(p)) {
                        return Ok(Activity::Real);
                    }
                }
                Err(e) => {
                    interrupted(&e)?;
                    debug!(owner, name, sha = %commit.sha, error = %e, "commit detail unavailable");
                    unknown = true;
                }
            }
        }

        Ok(if unknown {
            Activity::Unknown
        } else {
            Activity::ReadmeOnly
        })
    }
}

/// Map a retry failure that stems from cancellation into a filter error.
fn interrupted(err: &RetryError<PortError>) -> Result<(), FilterError> {
    if let Some(cause) = err.cancel_cause() {
        return Err(FilterError::Cancelled(cause));
    }
    if let PortError::Cancelled(cause) = err.last() {
        return Err(FilterError::Cancelled(*cause));
    }
    Ok(())
}
