//! Structured observability hooks for mining cycle lifecycle events.
//!
//! This module provides:
//! - a cycle-scoped span (`cycle_span`) to instrument a whole cycle
//! - emission functions for key lifecycle events: start, stage, source failure,
//!   discovery, finish, cancellation
//!
//! Events are emitted at `info!` level unless noted (configurable via
//! `GOLDMINER_LOG` / `RUST_LOG`). For JSON output pass `--json` to the CLI.

use std::fmt::Display;

use tracing::{info, warn};

use crate::context::CancelCause;
use crate::mining::{CycleReport, CycleStage};
use crate::Repo;

/// Span tagged with the cycle id. Attach with `Instrument::instrument`.
pub fn cycle_span(cycle_id: &str) -> tracing::Span {
    tracing::info_span!("goldminer.cycle", cycle_id = %cycle_id)
}

/// Emit event: cycle started.
pub fn emit_cycle_started(cycle_id: &str, sources: usize) {
    info!(event = "cycle.started", cycle_id = %cycle_id, sources = sources);
}

/// Emit event: a stage finished with `remaining` repositories left in the run.
pub fn emit_stage_completed(stage: CycleStage, remaining: usize) {
    info!(event = "cycle.stage_completed", stage = %stage, remaining = remaining);
}

/// Emit event: one candidate source failed; its subset is dropped (warning level).
pub fn emit_source_failed(source: &str, error: &dyn Display) {
    warn!(event = "cycle.source_failed", source = %source, error = %error);
}

/// Emit event: a qualifying repository was saved and pushed.
pub fn emit_repo_notified(repo: &Repo) {
    info!(
        event = "repo.notified",
        repo_id = %repo.id(),
        name = %repo.name,
        score = repo.score,
        stars = repo.stars,
    );
}

/// Emit event: a persist-loop step failed for one repository (warning level).
pub fn emit_persist_error(repo: &Repo, step: &str, error: &dyn Display) {
    warn!(
        event = "repo.persist_error",
        repo_id = %repo.id(),
        name = %repo.name,
        step = step,
        error = %error,
    );
}

/// Emit event: cycle finished.
pub fn emit_cycle_finished(cycle_id: &str, duration_ms: u64, report: &CycleReport) {
    info!(
        event = "cycle.finished",
        cycle_id = %cycle_id,
        duration_ms = duration_ms,
        fetched = report.fetched,
        qualified = report.qualified,
        saved = report.saved,
        notified = report.notified,
        interrupted = report.interrupted,
    );
}

/// Emit event: cycle abandoned at a stage boundary (warning level).
pub fn emit_cycle_cancelled(cycle_id: &str, stage: CycleStage, cause: CancelCause) {
    warn!(event = "cycle.cancelled", cycle_id = %cycle_id, stage = %stage, cause = %cause);
}
