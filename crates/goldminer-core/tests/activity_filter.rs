//! Age and activity filtering against the in-memory commit inspector.

use std::sync::Arc;

use chrono::{Duration, Utc};
use goldminer_core::fakes::StaticCommitInspector;
use goldminer_core::{
    is_readme_file, ActivityFilter, CancelCause, FilterError, FixedClock, Repo, RunContext,
};

fn repo(id: &str, full_name: &str) -> Repo {
    Repo::new(
        id,
        full_name,
        format!("https://github.com/{full_name}"),
        Utc::now(),
    )
}

fn ids(repos: &[Repo]) -> Vec<&str> {
    repos.iter().map(|r| r.id()).collect()
}

fn filter_with(inspector: StaticCommitInspector) -> (ActivityFilter, Arc<StaticCommitInspector>) {
    let inspector = Arc::new(inspector);
    let filter = ActivityFilter::new(Some(inspector.clone()));
    (filter, inspector)
}

// ===========================================================================
// README recognition
// ===========================================================================

#[test]
fn readme_recognition_matches_base_name_only() {
    for yes in ["README.md", "readme", "docs/README.md", "examples/readme.txt"] {
        assert!(is_readme_file(yes), "{yes}");
    }
    for no in [
        "readme_generator.go",
        "CHANGELOG.md",
        "LICENSE",
        "pkg/service/handler.go",
    ] {
        assert!(!is_readme_file(no), "{no}");
    }
}

// ===========================================================================
// Age filter
// ===========================================================================

#[test]
fn age_filter_uses_injected_clock() {
    let now = Utc::now();
    let filter = ActivityFilter::default().with_clock(Arc::new(FixedClock(now)));
    let mut exact = repo("github-1", "a/exact");
    exact.created_at = now - Duration::days(10);
    let mut older = repo("github-2", "a/older");
    older.created_at = now - Duration::days(11);

    let kept = filter.filter_by_age(&[exact, older], 10);
    assert_eq!(ids(&kept), vec!["github-1"]);
}

// ===========================================================================
// Activity filter
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn no_inspector_passes_everything_through() {
    let filter = ActivityFilter::new(None);
    let input = vec![repo("github-1", "a/one"), repo("github-2", "a/two")];

    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &input)
        .await
        .unwrap();

    assert_eq!(out, input);
}

#[tokio::test(start_paused = true)]
async fn empty_in_empty_out() {
    let (filter, _) = filter_with(StaticCommitInspector::new());
    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &[])
        .await
        .unwrap();
    assert!(out.is_empty());
}

#[tokio::test(start_paused = true)]
async fn readme_only_history_is_dropped() {
    let (filter, _) = filter_with(
        StaticCommitInspector::new()
            .with_commit("a/docs", "c1", &["README.md"])
            .with_commit("a/docs", "c2", &["docs/readme.rst", "README"]),
    );

    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &[repo("github-1", "a/docs")])
        .await
        .unwrap();

    assert!(out.is_empty());
}

#[tokio::test(start_paused = true)]
async fn one_code_commit_among_many_keeps_repo() {
    let (filter, _) = filter_with(
        StaticCommitInspector::new()
            .with_commit("a/code", "c1", &["README.md"])
            .with_commit("a/code", "c2", &["README.md", "src/main.rs"])
            .with_commit("a/code", "c3", &["README.md"]),
    );

    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &[repo("github-1", "a/code")])
        .await
        .unwrap();

    assert_eq!(ids(&out), vec!["github-1"]);
}

#[tokio::test(start_paused = true)]
async fn single_commit_must_touch_code() {
    let (filter, _) = filter_with(
        StaticCommitInspector::new()
            .with_commit("a/code", "c1", &["lib.rs"])
            .with_commit("a/docs", "c1", &["README.md"]),
    );

    let out = filter
        .filter_by_recent_activity(
            &RunContext::background(),
            &[repo("github-1", "a/code"), repo("github-2", "a/docs")],
        )
        .await
        .unwrap();

    assert_eq!(ids(&out), vec!["github-1"]);
}

#[tokio::test(start_paused = true)]
async fn no_commits_is_dropped() {
    let (filter, _) = filter_with(StaticCommitInspector::new());

    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &[repo("github-1", "a/empty")])
        .await
        .unwrap();

    assert!(out.is_empty());
}

#[tokio::test(start_paused = true)]
async fn commit_without_file_info_counts_as_real() {
    let (filter, _) = filter_with(
        StaticCommitInspector::new()
            .with_commit("a/x", "c1", &["README.md"])
            .with_opaque_commit("a/x", "c2"),
    );

    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &[repo("github-1", "a/x")])
        .await
        .unwrap();

    assert_eq!(ids(&out), vec!["github-1"]);
}

#[tokio::test(start_paused = true)]
async fn unparseable_url_is_kept() {
    let (filter, inspector) = filter_with(StaticCommitInspector::new());
    let mut odd = repo("github-1", "a/b");
    odd.url = "https://gitlab.com/a/b".to_string();
    let mut broken = repo("github-2", "c/d");
    broken.url = "not a url".to_string();

    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &[odd, broken])
        .await
        .unwrap();

    assert_eq!(ids(&out), vec!["github-1", "github-2"]);
    assert_eq!(inspector.list_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn listing_failure_keeps_repo_after_retries() {
    let (filter, inspector) =
        filter_with(StaticCommitInspector::new().with_failing_listing("a/flaky"));

    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &[repo("github-1", "a/flaky")])
        .await
        .unwrap();

    assert_eq!(ids(&out), vec!["github-1"]);
    // 1 attempt + 2 retries
    assert_eq!(inspector.list_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn commit_detail_failure_keeps_repo() {
    let (filter, inspector) = filter_with(
        StaticCommitInspector::new()
            .with_commit("a/x", "c1", &["README.md"])
            .with_broken_commit("a/x", "c2"),
    );

    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &[repo("github-1", "a/x")])
        .await
        .unwrap();

    assert_eq!(ids(&out), vec!["github-1"]);
    // c1 once, c2 three times
    assert_eq!(inspector.file_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn inspects_at_most_ten_commits() {
    let mut inspector = StaticCommitInspector::new();
    for i in 0..12 {
        inspector = inspector.with_commit("a/long", &format!("c{i}"), &["README.md"]);
    }
    let (filter, inspector) = filter_with(inspector);

    let out = filter
        .filter_by_recent_activity(&RunContext::background(), &[repo("github-1", "a/long")])
        .await
        .unwrap();

    assert!(out.is_empty());
    assert_eq!(inspector.file_calls(), 10);
}

#[tokio::test(start_paused = true)]
async fn cancelled_context_aborts_filter() {
    let (filter, _) = filter_with(StaticCommitInspector::new().with_commit("a/x", "c1", &["a.rs"]));
    let ctx = RunContext::background();
    ctx.cancel();

    let err = filter
        .filter_by_recent_activity(&ctx, &[repo("github-1", "a/x")])
        .await
        .unwrap_err();

    assert!(matches!(err, FilterError::Cancelled(CancelCause::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_retry_backoff_aborts_filter() {
    let (filter, _) = filter_with(StaticCommitInspector::new().with_failing_listing("a/flaky"));
    let ctx = RunContext::background().with_timeout(std::time::Duration::from_millis(200));

    let err = filter
        .filter_by_recent_activity(&ctx, &[repo("github-1", "a/flaky")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FilterError::Cancelled(CancelCause::DeadlineExceeded)
    ));
}
