//! Star-growth computation and the concurrent appraisal pool.
//!
//! The pool spreads appraisal calls over a fixed number of tokio tasks that
//! pull from one shared queue and hand each finished item to the collector
//! over a channel. Each call gets its own timeout; a failed, panicked or
//! timed-out item is reported and passed through un-appraised. If the outer
//! context finishes before the queue drains, the whole batch is abandoned.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::context::RunContext;
use crate::error::{AppraisalError, PoolError};
use crate::ports::Appraiser;
use crate::Repo;

/// Set `star_growth_rate` to stars per day of age. Repositories with no
/// positive age get 0.
pub fn compute_star_growth(repos: &mut [Repo], now: DateTime<Utc>) {
    for repo in repos.iter_mut() {
        let days = repo.age_days(now);
        repo.star_growth_rate = if days > 0.0 {
            f64::from(repo.stars) / days
        } else {
            0.0
        };
    }
}

/// One item that could not be appraised.
#[derive(Debug)]
pub struct AppraisalFailure {
    pub repo_id: String,
    pub repo_name: String,
    pub error: AppraisalError,
}

/// Output of [`AppraisalPool::analyze`]. `repos` holds every input
/// repository, appraised or not, in completion order.
#[derive(Debug, Default)]
pub struct AppraisalBatch {
    pub repos: Vec<Repo>,
    pub failures: Vec<AppraisalFailure>,
}

impl AppraisalBatch {
    fn record(&mut self, repo: Repo, error: Option<AppraisalError>) {
        if let Some(error) = error {
            self.failures.push(AppraisalFailure {
                repo_id: repo.id().to_string(),
                repo_name: repo.name.clone(),
                error,
            });
        }
        self.repos.push(repo);
    }
}

/// A finished item on its way from a worker to the collector.
type Outcome = (Repo, Option<AppraisalError>);

pub struct AppraisalPool {
    appraiser: Arc<dyn Appraiser>,
    workers: usize,
    item_timeout: Duration,
}

impl AppraisalPool {
    pub const DEFAULT_WORKERS: usize = 3;
    pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(appraiser: Arc<dyn Appraiser>) -> Self {
        Self {
            appraiser,
            workers: Self::DEFAULT_WORKERS,
            item_timeout: Self::DEFAULT_ITEM_TIMEOUT,
        }
    }

    /// Zero is ignored.
    pub fn with_workers(mut self, workers: usize) -> Self {
        if workers > 0 {
            self.workers = workers;
        }
        self
    }

    /// Zero is ignored.
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.item_timeout = timeout;
        }
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn item_timeout(&self) -> Duration {
        self.item_timeout
    }

    /// Appraise every repository, `workers` at a time.
    #[instrument(skip_all, fields(repos = repos.len(), workers = self.workers))]
    pub async fn analyze(
        &self,
        ctx: &RunContext,
        repos: Vec<Repo>,
    ) -> Result<AppraisalBatch, PoolError> {
        if repos.is_empty() {
            return Ok(AppraisalBatch::default());
        }
        if let Some(cause) = ctx.err() {
            return Err(PoolError::Cancelled(cause));
        }

        let expected = repos.len();
        let worker_count = self.workers.min(expected);
        let queue = Arc::new(Mutex::new(VecDeque::from(repos)));
        let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();
        let mut set = JoinSet::new();

        for worker_id in 1..=worker_count {
            let queue = Arc::clone(&queue);
            let appraiser = Arc::clone(&self.appraiser);
            let ctx = ctx.clone();
            let timeout = self.item_timeout;
            let results = tx.clone();
            set.spawn(async move {
                run_worker(worker_id, queue, appraiser, ctx, timeout, results).await
            });
        }
        // The channel closes once every worker has returned.
        drop(tx);

        let collect = async {
            let mut batch = AppraisalBatch::default();
            while let Some((repo, error)) = rx.recv().await {
                batch.record(repo, error);
            }
            batch
        };

        let outcome = tokio::select! {
            biased;
            cause = ctx.done() => Err(cause),
            batch = collect => Ok(batch),
        };

        match outcome {
            Ok(batch) => {
                while let Some(joined) = set.join_next().await {
                    if let Err(e) = joined {
                        warn!(error = %e, "appraisal worker aborted");
                    }
                }
                if batch.repos.len() < expected {
                    warn!(
                        expected,
                        received = batch.repos.len(),
                        "appraisal batch is missing repositories"
                    );
                }
                info!(
                    appraised = batch.repos.len() - batch.failures.len(),
                    failed = batch.failures.len(),
                    "appraisal batch complete"
                );
                Ok(batch)
            }
            Err(cause) => {
                set.abort_all();
                warn!(cause = %cause, "appraisal batch interrupted");
                Err(PoolError::Cancelled(cause))
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    queue: Arc<Mutex<VecDeque<Repo>>>,
    appraiser: Arc<dyn Appraiser>,
    ctx: RunContext,
    timeout: Duration,
    results: mpsc::UnboundedSender<Outcome>,
) {
    loop {
        let next = queue.lock().await.pop_front();
        let Some(mut repo) = next else {
            break;
        };

        debug!(worker = worker_id, repo = %repo.name, "appraising");
        let item_ctx = ctx.with_timeout(timeout);
        let call = AssertUnwindSafe(appraiser.appraise(&item_ctx, &repo)).catch_unwind();
        let result = tokio::time::timeout(timeout, call).await;

        let error = match result {
            Ok(Ok(Ok(appraisal))) => {
                appraisal.apply_to(&mut repo);
                debug!(worker = worker_id, repo = %repo.name, score = repo.score, "appraised");
                None
            }
            Ok(Ok(Err(e))) => Some(AppraisalError::Failed(e)),
            Ok(Err(payload)) => Some(AppraisalError::Panicked(panic_message(payload.as_ref()))),
            Err(_) => Some(AppraisalError::TimedOut(timeout)),
        };

        if let Some(error) = &error {
            warn!(worker = worker_id, repo = %repo.name, error = %error, "appraisal failed");
        }
        if results.send((repo, error)).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
