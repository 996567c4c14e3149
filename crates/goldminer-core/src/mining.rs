//! Mining cycle orchestration.
//!
//! One call to [`MiningService::run_cycle`] walks the fixed stage sequence
//!
//! ```text
//! Idle → Fetching → Filtering(Age) → Filtering(Activity) → Analyzing(Growth)
//!      → Analyzing(LLM) → Persisting → Done
//! ```
//!
//! Collaborator failures are logged and absorbed: a failing source drops only
//! its own candidates, a failing filter or appraisal pool lets the unfiltered
//! or un-appraised set through, and per-repository persist errors skip that
//! repository. The only error a cycle returns is cancellation observed at a
//! stage boundary.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use goldminer_state::RepoStore;
use serde::Serialize;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::analyzer::{compute_star_growth, AppraisalPool};
use crate::clock::{Clock, SystemClock};
use crate::context::{CancelCause, RunContext};
use crate::error::MiningError;
use crate::filter::ActivityFilter;
use crate::obs;
use crate::ports::{Appraiser, CommitInspector, Fetcher, Notifier, TrendingWindow};
use crate::Repo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Idle,
    Fetching,
    FilteringAge,
    FilteringActivity,
    AnalyzingGrowth,
    AnalyzingLlm,
    Persisting,
    Done,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleStage::Idle => "idle",
            CycleStage::Fetching => "fetching",
            CycleStage::FilteringAge => "filtering(age)",
            CycleStage::FilteringActivity => "filtering(activity)",
            CycleStage::AnalyzingGrowth => "analyzing(growth)",
            CycleStage::AnalyzingLlm => "analyzing(llm)",
            CycleStage::Persisting => "persisting",
            CycleStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Knobs for one mining cycle.
#[derive(Debug, Clone)]
pub struct MiningConfig {
    /// Trending language qualifier; `"all"` searches every language
    pub language: String,
    pub window: TrendingWindow,
    pub topics: Vec<String>,
    /// Candidates older than this are dropped (inclusive bound)
    pub max_age_days: u32,
    /// Minimum appraisal score for a qualifying repository to be persisted
    pub min_score: u8,
    /// Appraisal pool size
    pub workers: usize,
    /// Per-repository appraisal timeout
    pub item_timeout: Duration,
    /// Pause after each pushed repository
    pub notify_delay: Duration,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            language: "all".to_string(),
            window: TrendingWindow::Weekly,
            topics: vec![
                "ai-coding".to_string(),
                "ide-extension".to_string(),
                "dev-tools".to_string(),
            ],
            max_age_days: 10,
            min_score: 50,
            workers: AppraisalPool::DEFAULT_WORKERS,
            item_timeout: AppraisalPool::DEFAULT_ITEM_TIMEOUT,
            notify_delay: Duration::from_secs(3),
        }
    }
}

/// Counts collected over one cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub duplicates: usize,
    pub after_age_filter: usize,
    pub after_activity_filter: usize,
    pub analyzed: usize,
    pub appraisal_failures: usize,
    pub qualified: usize,
    pub already_known: usize,
    pub saved: usize,
    /// Repositories saved, pushed and marked: the cycle's successes
    pub notified: usize,
    pub lookup_failures: usize,
    pub persist_failures: usize,
    pub notify_failures: usize,
    pub mark_failures: usize,
    /// The persist loop stopped early because the context finished
    pub interrupted: bool,
    /// Identifiers of the successfully processed repositories, in order
    pub processed: Vec<String>,
}

pub struct MiningService {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn RepoStore>,
    pool: AppraisalPool,
    inspector: Option<Arc<dyn CommitInspector>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Arc<dyn Clock>,
    filter: ActivityFilter,
    config: MiningConfig,
}

impl MiningService {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        appraiser: Arc<dyn Appraiser>,
        store: Arc<dyn RepoStore>,
        config: MiningConfig,
    ) -> Self {
        let pool = AppraisalPool::new(appraiser)
            .with_workers(config.workers)
            .with_item_timeout(config.item_timeout);
        Self {
            fetcher,
            store,
            pool,
            inspector: None,
            notifier: None,
            clock: Arc::new(SystemClock),
            filter: ActivityFilter::default(),
            config,
        }
    }

    /// Enable README-only activity filtering.
    pub fn with_commit_inspector(mut self, inspector: Arc<dyn CommitInspector>) -> Self {
        self.inspector = Some(inspector);
        self.rebuild_filter();
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.rebuild_filter();
        self
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    fn rebuild_filter(&mut self) {
        self.filter =
            ActivityFilter::new(self.inspector.clone()).with_clock(Arc::clone(&self.clock));
    }

    /// Run one full cycle.
    pub async fn run_cycle(&self, ctx: &RunContext) -> Result<CycleReport, MiningError> {
        let cycle_id = Uuid::new_v4().to_string();
        let span = obs::cycle_span(&cycle_id);
        let started = Instant::now();

        let result = self.run_stages(ctx, &cycle_id).instrument(span).await;

        if let Ok(report) = &result {
            obs::emit_cycle_finished(&cycle_id, started.elapsed().as_millis() as u64, report);
        }
        result
    }

    async fn run_stages(
        &self,
        ctx: &RunContext,
        cycle_id: &str,
    ) -> Result<CycleReport, MiningError> {
        obs::emit_cycle_started(cycle_id, self.config.topics.len() + 1);
        let mut report = CycleReport::default();

        gate(ctx, cycle_id, CycleStage::Fetching)?;
        let fetched = self.fetch(ctx).await;
        report.fetched = fetched.len();
        let candidates = dedup(fetched);
        report.duplicates = report.fetched - candidates.len();
        obs::emit_stage_completed(CycleStage::Fetching, candidates.len());

        gate(ctx, cycle_id, CycleStage::FilteringAge)?;
        let fresh = self.filter.filter_by_age(&candidates, self.config.max_age_days);
        report.after_age_filter = fresh.len();
        obs::emit_stage_completed(CycleStage::FilteringAge, fresh.len());

        gate(ctx, cycle_id, CycleStage::FilteringActivity)?;
        let mut active = match self.filter.filter_by_recent_activity(ctx, &fresh).await {
            Ok(kept) => kept,
            Err(e) => {
                warn!(error = %e, "activity filter failed, continuing with unfiltered set");
                fresh
            }
        };
        report.after_activity_filter = active.len();
        obs::emit_stage_completed(CycleStage::FilteringActivity, active.len());

        gate(ctx, cycle_id, CycleStage::AnalyzingGrowth)?;
        compute_star_growth(&mut active, self.clock.now());
        obs::emit_stage_completed(CycleStage::AnalyzingGrowth, active.len());

        gate(ctx, cycle_id, CycleStage::AnalyzingLlm)?;
        let analyzed = match self.pool.analyze(ctx, active.clone()).await {
            Ok(batch) => {
                report.appraisal_failures = batch.failures.len();
                batch.repos
            }
            Err(e) => {
                warn!(error = %e, "appraisal pool failed, continuing with un-appraised set");
                active
            }
        };
        report.analyzed = analyzed.len();
        obs::emit_stage_completed(CycleStage::AnalyzingLlm, analyzed.len());

        gate(ctx, cycle_id, CycleStage::Persisting)?;
        self.persist(ctx, analyzed, &mut report).await;
        obs::emit_stage_completed(CycleStage::Persisting, report.notified);

        Ok(report)
    }

    /// Trending plus every topic, concatenated. Failed sources contribute nothing.
    async fn fetch(&self, ctx: &RunContext) -> Vec<Repo> {
        let mut all = Vec::new();

        match self
            .fetcher
            .trending(ctx, &self.config.language, self.config.window)
            .await
        {
            Ok(repos) => {
                debug!(count = repos.len(), "trending repositories fetched");
                all.extend(repos);
            }
            Err(e) => obs::emit_source_failed("trending", &e),
        }

        for topic in &self.config.topics {
            match self.fetcher.by_topic(ctx, topic).await {
                Ok(repos) => {
                    debug!(topic = %topic, count = repos.len(), "topic repositories fetched");
                    all.extend(repos);
                }
                Err(e) => obs::emit_source_failed(&format!("topic:{topic}"), &e),
            }
        }

        all
    }

    async fn persist(&self, ctx: &RunContext, repos: Vec<Repo>, report: &mut CycleReport) {
        for mut repo in repos {
            if ctx.is_done() {
                info!("context finished, stopping persist loop");
                report.interrupted = true;
                break;
            }

            if !repo.meets_bar(self.config.min_score) {
                continue;
            }
            report.qualified += 1;

            let known = match until_done(ctx, self.store.exists(repo.id())).await {
                Ok(known) => known,
                Err(cause) => {
                    interrupt(report, "exists", cause);
                    break;
                }
            };
            match known {
                Ok(true) => {
                    debug!(repo = %repo.name, "already known");
                    report.already_known += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    obs::emit_persist_error(&repo, "exists", &e);
                    report.lookup_failures += 1;
                    continue;
                }
            }

            match until_done(ctx, self.store.save(&repo)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    obs::emit_persist_error(&repo, "save", &e);
                    report.persist_failures += 1;
                    continue;
                }
                Err(cause) => {
                    interrupt(report, "save", cause);
                    break;
                }
            }
            report.saved += 1;

            let Some(notifier) = &self.notifier else {
                debug!(repo = %repo.name, "no notifier configured, saved only");
                continue;
            };

            if let Err(e) = notifier.notify(ctx, &repo).await {
                obs::emit_persist_error(&repo, "notify", &e);
                report.notify_failures += 1;
                continue;
            }

            match until_done(ctx, self.store.mark_notified(repo.id())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    obs::emit_persist_error(&repo, "mark_notified", &e);
                    report.mark_failures += 1;
                    continue;
                }
                Err(cause) => {
                    interrupt(report, "mark_notified", cause);
                    break;
                }
            }
            repo.mark_notified();
            obs::emit_repo_notified(&repo);
            report.notified += 1;
            report.processed.push(repo.id().to_string());

            let delay = self.config.notify_delay;
            if !delay.is_zero() && ctx.sleep(delay).await.is_err() {
                info!("context finished during notify delay, stopping persist loop");
                report.interrupted = true;
                break;
            }
        }
    }
}

/// Await a store call unless the context finishes first.
async fn until_done<T>(ctx: &RunContext, call: impl Future<Output = T>) -> Result<T, CancelCause> {
    tokio::select! {
        biased;
        cause = ctx.done() => Err(cause),
        out = call => Ok(out),
    }
}

fn interrupt(report: &mut CycleReport, op: &'static str, cause: CancelCause) {
    info!(op, cause = %cause, "context finished during store call, stopping persist loop");
    report.interrupted = true;
}

fn gate(ctx: &RunContext, cycle_id: &str, stage: CycleStage) -> Result<(), MiningError> {
    match ctx.err() {
        Some(cause) => {
            obs::emit_cycle_cancelled(cycle_id, stage, cause);
            Err(MiningError::Cancelled { stage, cause })
        }
        None => Ok(()),
    }
}

/// Collapse repeated identifiers, keeping the first occurrence.
fn dedup(repos: Vec<Repo>) -> Vec<Repo> {
    let mut seen = HashSet::new();
    repos
        .into_iter()
        .filter(|r| seen.insert(r.id().to_string()))
        .collect()
}
