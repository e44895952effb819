//! Structured observability hooks for batch runs.
//!
//! Events are emitted at `info!` level unless noted. Filter with
//! `GITFLEET_LOG`; pass `--json` to the CLI for JSON lines.

use tracing::info;

use crate::project::MaterializationState;

/// Span covering one batch run. Attach with `tracing::Instrument` so it
/// follows the run across await points.
pub fn batch_span(run_id: &str, operation: &str) -> tracing::Span {
    tracing::info_span!("gitfleet.batch", run_id = %run_id, operation = %operation)
}

pub fn emit_batch_started(run_id: &str, operation: &str, selected: usize) {
    info!(
        event = "batch.started",
        run_id = %run_id,
        operation = %operation,
        selected = selected,
    );
}

pub fn emit_batch_finished(
    run_id: &str,
    duration_ms: u64,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    interrupted: bool,
) {
    info!(
        event = "batch.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        succeeded = succeeded,
        failed = failed,
        skipped = skipped,
        interrupted = interrupted,
    );
}

/// Per-project outcome, at `debug!` for success and `warn!` for failure.
pub fn emit_project_finished(relpath: &str, status: &str, error: Option<&dyn std::fmt::Display>) {
    match error {
        Some(error) => tracing::warn!(
            event = "project.finished",
            project = %relpath,
            status = %status,
            error = %error,
        ),
        None => tracing::debug!(
            event = "project.finished",
            project = %relpath,
            status = %status,
        ),
    }
}

pub fn emit_overlay_classified(projects: usize, changed: usize, saved: bool) {
    info!(
        event = "overlay.classified",
        projects = projects,
        changed = changed,
        saved = saved,
    );
}

pub fn emit_materialization_state(relpath: &str, state: MaterializationState) {
    info!(event = "project.materialization", project = %relpath, state = ?state);
}
