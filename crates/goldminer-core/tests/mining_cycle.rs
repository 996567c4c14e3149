//! End-to-end mining cycles over in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use goldminer_core::fakes::{
    RecordingNotifier, ScriptedAppraiser, StaticCommitInspector, StaticFetcher,
};
use goldminer_core::{
    CancelCause, CycleStage, FixedClock, MiningConfig, MiningError, MiningService, Repo,
    RepoStore, RunContext,
};
use async_trait::async_trait;
use goldminer_state::{MemoryRepoStore, StorageResult};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn repo(id: &str, name: &str, days_old: i64, stars: u32) -> Repo {
    Repo::new(
        id,
        name,
        format!("https://github.com/{name}"),
        now() - ChronoDuration::days(days_old),
    )
    .with_stars(stars)
}

fn quick_config() -> MiningConfig {
    MiningConfig {
        notify_delay: Duration::ZERO,
        ..MiningConfig::default()
    }
}

struct Harness {
    fetcher: Arc<StaticFetcher>,
    appraiser: Arc<ScriptedAppraiser>,
    store: Arc<MemoryRepoStore>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new(fetcher: StaticFetcher, appraiser: ScriptedAppraiser) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            appraiser: Arc::new(appraiser),
            store: Arc::new(MemoryRepoStore::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    fn with_store(mut self, store: MemoryRepoStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    fn with_notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    fn service(&self, config: MiningConfig) -> MiningService {
        MiningService::new(
            self.fetcher.clone(),
            self.appraiser.clone(),
            self.store.clone(),
            config,
        )
        .with_notifier(self.notifier.clone())
        .with_clock(Arc::new(FixedClock(now())))
    }
}

// ===========================================================================
// Happy path
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn fresh_qualifying_repo_is_saved_notified_and_marked() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![
            repo("github-1", "acme/fresh", 3, 300),
            repo("github-2", "acme/stale", 20, 900),
        ]),
        ScriptedAppraiser::new()
            .with_score("github-1", true, 80, "solid agent")
            .with_score("github-2", true, 95, "never asked"),
    );

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.after_age_filter, 1);
    assert_eq!(report.after_activity_filter, 1);
    assert_eq!(report.notified, 1);
    assert_eq!(report.processed, vec!["github-1"]);
    assert!(!report.interrupted);

    assert_eq!(h.appraiser.calls(), vec!["github-1"]);
    assert_eq!(h.notifier.sent(), vec!["github-1"]);

    let stored = h.store.get("github-1").await.unwrap().unwrap();
    assert!(stored.already_notified());
    assert_eq!(stored.score, 80);
    assert!((stored.star_growth_rate - 100.0).abs() < 1e-9);
    assert!(!h.store.exists("github-2").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn sources_are_queried_with_configured_language_and_window() {
    let h = Harness::new(StaticFetcher::new(), ScriptedAppraiser::new());

    h.service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(
        h.fetcher.calls(),
        vec![
            "trending:all:weekly",
            "topic:ai-coding",
            "topic:ide-extension",
            "topic:dev-tools",
        ]
    );
}

// ===========================================================================
// Persist-stage skipping
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn score_below_threshold_never_reaches_save() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![repo("github-1", "acme/meh", 2, 40)]),
        ScriptedAppraiser::new().with_score("github-1", true, 40, "thin wrapper"),
    );

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.qualified, 0);
    assert_eq!(report.saved, 0);
    assert!(h.store.saved_ids().is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn non_tool_with_high_score_is_skipped() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![repo("github-1", "acme/game", 2, 40)]),
        ScriptedAppraiser::new().with_score("github-1", false, 99, "a game"),
    );

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.qualified, 0);
    assert!(h.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn known_repo_is_not_saved_or_notified_again() {
    let existing = repo("github-1", "acme/known", 2, 10);
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![repo("github-1", "acme/known", 2, 10)]),
        ScriptedAppraiser::new().with_score("github-1", true, 90, "rescored"),
    )
    .with_store(MemoryRepoStore::with_repos([existing]));

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.already_known, 1);
    assert_eq!(report.notified, 0);
    assert!(h.store.saved_ids().is_empty());
    assert!(h.notifier.sent().is_empty());
    let stored = h.store.get("github-1").await.unwrap().unwrap();
    assert!(!stored.already_notified());
    assert_eq!(stored.score, 0);
}

// ===========================================================================
// Partial failures
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn failing_topic_drops_only_its_repos() {
    let h = Harness::new(
        StaticFetcher::new()
            .with_trending(vec![repo("github-1", "acme/a", 1, 10)])
            .failing_topic("ai-coding")
            .with_topic("dev-tools", vec![repo("github-2", "acme/b", 1, 10)]),
        ScriptedAppraiser::new()
            .with_score("github-1", true, 70, "ok")
            .with_score("github-2", true, 70, "ok"),
    );

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.notified, 2);
}

#[tokio::test(start_paused = true)]
async fn failing_trending_still_runs_topics() {
    let h = Harness::new(
        StaticFetcher::new()
            .failing_trending()
            .with_topic("ide-extension", vec![repo("github-5", "acme/ext", 1, 10)]),
        ScriptedAppraiser::new().with_score("github-5", true, 55, "ok"),
    );

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.processed, vec!["github-5"]);
}

#[tokio::test(start_paused = true)]
async fn duplicates_across_sources_are_processed_once() {
    let h = Harness::new(
        StaticFetcher::new()
            .with_trending(vec![repo("github-1", "acme/dup", 1, 10)])
            .with_topic("ai-coding", vec![repo("github-1", "acme/dup", 1, 10)])
            .with_topic("dev-tools", vec![repo("github-1", "acme/dup", 1, 10)]),
        ScriptedAppraiser::new().with_score("github-1", true, 77, "ok"),
    );

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.duplicates, 2);
    assert_eq!(h.appraiser.calls(), vec!["github-1"]);
    assert_eq!(h.notifier.sent(), vec!["github-1"]);
}

#[tokio::test(start_paused = true)]
async fn appraisal_failure_leaves_repo_unqualified() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![
            repo("github-1", "acme/ok", 1, 10),
            repo("github-2", "acme/bad", 1, 10),
        ]),
        ScriptedAppraiser::new()
            .with_score("github-1", true, 70, "ok")
            .failing("github-2"),
    );

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.analyzed, 2);
    assert_eq!(report.appraisal_failures, 1);
    assert_eq!(report.processed, vec!["github-1"]);
}

#[tokio::test(start_paused = true)]
async fn notify_failure_leaves_record_saved_but_unnotified() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![
            repo("github-1", "acme/a", 1, 10),
            repo("github-2", "acme/b", 1, 10),
        ]),
        ScriptedAppraiser::new()
            .with_score("github-1", true, 70, "ok")
            .with_score("github-2", true, 70, "ok"),
    )
    .with_notifier(RecordingNotifier::new().failing_for("github-1"));

    let report = h
        .service(MiningConfig {
            workers: 1,
            ..quick_config()
        })
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.saved, 2);
    assert_eq!(report.notify_failures, 1);
    assert_eq!(report.notified, 1);

    let a = h.store.get("github-1").await.unwrap().unwrap();
    assert!(!a.already_notified());
    let b = h.store.get("github-2").await.unwrap().unwrap();
    assert!(b.already_notified());
}

#[tokio::test(start_paused = true)]
async fn mark_failure_does_not_undo_save_or_notify() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![repo("github-1", "acme/a", 1, 10)]),
        ScriptedAppraiser::new().with_score("github-1", true, 70, "ok"),
    );
    h.store.fail_mark(true);

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.mark_failures, 1);
    assert_eq!(report.notified, 0);
    assert_eq!(h.notifier.sent(), vec!["github-1"]);
    assert!(h.store.exists("github-1").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn exists_error_skips_repo() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![repo("github-1", "acme/a", 1, 10)]),
        ScriptedAppraiser::new().with_score("github-1", true, 70, "ok"),
    );
    h.store.fail_exists(true);

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.lookup_failures, 1);
    assert!(h.store.saved_ids().is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn save_error_skips_notify() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![repo("github-1", "acme/a", 1, 10)]),
        ScriptedAppraiser::new().with_score("github-1", true, 70, "ok"),
    );
    h.store.fail_save(true);

    let report = h
        .service(quick_config())
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.persist_failures, 1);
    assert!(h.notifier.sent().is_empty());
}

// ===========================================================================
// Activity filter wiring
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn readme_only_repo_is_filtered_before_appraisal() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![
            repo("github-1", "acme/code", 1, 10),
            repo("github-2", "acme/docs", 1, 10),
        ]),
        ScriptedAppraiser::new()
            .with_score("github-1", true, 70, "ok")
            .with_score("github-2", true, 70, "ok"),
    );
    let inspector = StaticCommitInspector::new()
        .with_commit("acme/code", "c1", &["src/lib.rs"])
        .with_commit("acme/docs", "c1", &["README.md"]);

    let report = h
        .service(quick_config())
        .with_commit_inspector(Arc::new(inspector))
        .run_cycle(&RunContext::background())
        .await
        .unwrap();

    assert_eq!(report.after_activity_filter, 1);
    assert_eq!(h.appraiser.calls(), vec!["github-1"]);
}

// ===========================================================================
// Cancellation
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_returns_error() {
    let h = Harness::new(StaticFetcher::new(), ScriptedAppraiser::new());
    let ctx = RunContext::background();
    ctx.cancel();

    let err = h.service(quick_config()).run_cycle(&ctx).await.unwrap_err();

    assert!(matches!(
        err,
        MiningError::Cancelled {
            stage: CycleStage::Fetching,
            cause: CancelCause::Cancelled
        }
    ));
    assert!(h.fetcher.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_during_appraisal_ends_cycle_before_persist() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![repo("github-1", "acme/slow", 1, 10)]),
        ScriptedAppraiser::new().hanging("github-1"),
    );
    let ctx = RunContext::background().with_timeout(Duration::from_secs(5));

    let err = h.service(quick_config()).run_cycle(&ctx).await.unwrap_err();

    assert!(matches!(
        err,
        MiningError::Cancelled {
            stage: CycleStage::Persisting,
            cause: CancelCause::DeadlineExceeded
        }
    ));
    assert!(h.store.saved_ids().is_empty());
}

/// A store whose lookups never complete.
struct StuckStore;

#[async_trait]
impl RepoStore for StuckStore {
    async fn exists(&self, _id: &str) -> StorageResult<bool> {
        futures::future::pending().await
    }
    async fn save(&self, _repo: &Repo) -> StorageResult<()> {
        Ok(())
    }
    async fn mark_notified(&self, _id: &str) -> StorageResult<()> {
        Ok(())
    }
    async fn get(&self, _id: &str) -> StorageResult<Option<Repo>> {
        Ok(None)
    }
    async fn search(&self, _query: &str, _limit: usize) -> StorageResult<Vec<Repo>> {
        Ok(Vec::new())
    }
    async fn candidates(&self, _limit: usize) -> StorageResult<Vec<Repo>> {
        Ok(Vec::new())
    }
    async fn unnotified(&self) -> StorageResult<Vec<Repo>> {
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn stuck_store_cannot_outlive_cycle_deadline() {
    let notifier = Arc::new(RecordingNotifier::new());
    let service = MiningService::new(
        Arc::new(StaticFetcher::new().with_trending(vec![repo("github-1", "acme/agent", 1, 10)])),
        Arc::new(ScriptedAppraiser::new().with_score("github-1", true, 90, "ok")),
        Arc::new(StuckStore),
        quick_config(),
    )
    .with_notifier(notifier.clone())
    .with_clock(Arc::new(FixedClock(now())));
    let ctx = RunContext::background().with_timeout(Duration::from_secs(60));

    let report = tokio::time::timeout(Duration::from_secs(3600), service.run_cycle(&ctx))
        .await
        .expect("cycle must end at its deadline")
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.qualified, 1);
    assert_eq!(report.saved, 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_during_notify_delay_interrupts_persist_loop() {
    let h = Harness::new(
        StaticFetcher::new().with_trending(vec![
            repo("github-1", "acme/a", 1, 10),
            repo("github-2", "acme/b", 1, 10),
        ]),
        ScriptedAppraiser::new()
            .with_score("github-1", true, 90, "ok")
            .with_score("github-2", true, 80, "ok"),
    );
    let service = h.service(MiningConfig {
        workers: 1,
        notify_delay: Duration::from_secs(3),
        ..MiningConfig::default()
    });
    let ctx = RunContext::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let report = service.run_cycle(&ctx).await.unwrap();

    assert!(report.interrupted);
    assert_eq!(report.notified, 1);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_sources_yield_empty_report() {
    let store: Arc<dyn RepoStore> = Arc::new(MemoryRepoStore::new());
    let service = MiningService::new(
        Arc::new(StaticFetcher::new()),
        Arc::new(ScriptedAppraiser::new()),
        store,
        quick_config(),
    );
    let report = service.run_cycle(&RunContext::background()).await.unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(report.notified, 0);
}
