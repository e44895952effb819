//! Batch Dispatcher: runs one operation over the selected projects.
//!
//! Projects are processed strictly one at a time, in selection order. For
//! each project the dispatcher validates, materializes when the workspace
//! defers checkouts, then invokes git. What happens on failure is decided by
//! the [`FailurePolicy`] passed to [`BatchDispatcher::run`].

use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{FleetResult, ProjectError};
use crate::invoke::ActionInvoker;
use crate::materialize::{Materializer, OverlaySession, ProjectSyncer};
use crate::obs;
use crate::operation::{FailurePolicy, Operation};
use crate::project::Project;
use crate::report::{failure_lines, Reporter};
use crate::validate::{PreconditionValidator, ProjectInspector, Verdict};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Conventional status for a run stopped by SIGINT.
pub const EXIT_INTERRUPTED: i32 = 130;

/// How one project fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded,
    Skipped { reason: String },
    Failed(ProjectError),
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Succeeded => "succeeded",
            OutcomeStatus::Skipped { .. } => "skipped",
            OutcomeStatus::Failed(_) => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OutcomeStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOutcome {
    pub relpath: String,
    pub status: OutcomeStatus,
}

/// Outcome of one dispatcher run. Consumed once to pick the exit status.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub run_id: Uuid,
    pub operation: String,
    pub policy: FailurePolicy,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// In selection order.
    pub outcomes: Vec<ProjectOutcome>,
    /// Fail-fast stopped before the end of the selection.
    pub stopped_early: bool,
    pub interrupted: bool,
}

impl BatchResult {
    fn new(operation: &str, policy: FailurePolicy) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            operation: operation.to_string(),
            policy,
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            stopped_early: false,
            interrupted: false,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProjectOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Succeeded)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        !self.interrupted && self.failed_count() == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else if self.failed_count() > 0 {
            EXIT_FAILURE
        } else {
            EXIT_OK
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Drives validator, materializer, and invoker over a project list.
pub struct BatchDispatcher<'a> {
    invoker: &'a dyn ActionInvoker,
    inspector: &'a dyn ProjectInspector,
    reporter: &'a dyn Reporter,
    overlay: Option<(OverlaySession<'a>, &'a dyn ProjectSyncer)>,
}

impl<'a> BatchDispatcher<'a> {
    pub fn new(
        invoker: &'a dyn ActionInvoker,
        inspector: &'a dyn ProjectInspector,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            invoker,
            inspector,
            reporter,
            overlay: None,
        }
    }

    /// Enable deferred checkout for this run.
    pub fn with_overlay(
        mut self,
        session: OverlaySession<'a>,
        syncer: &'a dyn ProjectSyncer,
    ) -> Self {
        self.overlay = Some((session, syncer));
        self
    }

    /// Run `operation` over `projects` in order.
    ///
    /// Projects the operation does not select are dropped first. `interrupt`
    /// is raced against each project's work; when it resolves the in-flight
    /// git process is killed and the run stops.
    ///
    /// Returns `Err` only for workspace-level failures (the overlay manifest
    /// could not be saved), before any project is touched.
    pub async fn run<F>(
        self,
        operation: &Operation,
        policy: FailurePolicy,
        projects: Vec<Project>,
        interrupt: F,
    ) -> FleetResult<BatchResult>
    where
        F: Future,
    {
        let result = BatchResult::new(operation.name(), policy);
        let span = obs::batch_span(&result.run_id.to_string(), operation.name());
        self.run_inner(operation, projects, interrupt, result)
            .instrument(span)
            .await
    }

    async fn run_inner<F>(
        self,
        operation: &Operation,
        projects: Vec<Project>,
        interrupt: F,
        mut result: BatchResult,
    ) -> FleetResult<BatchResult>
    where
        F: Future,
    {
        let BatchDispatcher {
            invoker,
            inspector,
            reporter,
            overlay,
        } = self;
        let policy = result.policy;

        let mut projects: Vec<Project> = projects
            .into_iter()
            .filter(|p| operation.selects(p))
            .collect();
        obs::emit_batch_started(
            &result.run_id.to_string(),
            operation.name(),
            projects.len(),
        );

        let materializer = match overlay {
            Some((session, syncer)) => Some(session.classify(&mut projects, syncer)?),
            None => None,
        };

        let step = Step {
            invoker,
            reporter,
            validator: PreconditionValidator::new(inspector),
            materializer,
        };

        if let Some(title) = operation.progress_title() {
            reporter.begin(title, projects.len());
        }

        tokio::pin!(interrupt);
        for project in &projects {
            let status = tokio::select! {
                biased;
                _ = &mut interrupt => {
                    result.interrupted = true;
                    OutcomeStatus::Failed(ProjectError::Interrupted)
                }
                status = step.process(operation, project) => status,
            };
            reporter.update();

            match &status {
                OutcomeStatus::Failed(err) => {
                    obs::emit_project_finished(&project.relpath, status.label(), Some(err))
                }
                _ => obs::emit_project_finished(&project.relpath, status.label(), None),
            }

            let failed = status.is_failure();
            result.outcomes.push(ProjectOutcome {
                relpath: project.relpath.clone(),
                status,
            });

            if result.interrupted {
                reporter.error(&format!("error: {}/: interrupted", project.relpath));
                break;
            }
            if failed && policy == FailurePolicy::FailFast {
                if let Some(outcome) = result.outcomes.last() {
                    report_failure(reporter, operation, outcome);
                }
                result.stopped_early = true;
                break;
            }
        }
        reporter.end();

        if policy == FailurePolicy::ContinueAndAggregate {
            for outcome in result.failures() {
                if !matches!(
                    outcome.status,
                    OutcomeStatus::Failed(ProjectError::Interrupted)
                ) {
                    report_failure(reporter, operation, outcome);
                }
            }
        }

        result.finished_at = Some(Utc::now());
        obs::emit_batch_finished(
            &result.run_id.to_string(),
            result.duration_ms(),
            result.succeeded_count(),
            result.failed_count(),
            result.skipped_count(),
            result.interrupted,
        );
        Ok(result)
    }
}

/// The per-project pipeline: validate, materialize, invoke.
struct Step<'a> {
    invoker: &'a dyn ActionInvoker,
    reporter: &'a dyn Reporter,
    validator: PreconditionValidator<'a>,
    materializer: Option<Materializer<'a>>,
}

impl Step<'_> {
    async fn process(&self, operation: &Operation, project: &Project) -> OutcomeStatus {
        let branch = match self.validator.check(project, operation).await {
            Ok(Verdict::Proceed { branch }) => branch,
            Ok(Verdict::Skip { reason }) => return OutcomeStatus::Skipped { reason },
            Err(e) => return OutcomeStatus::Failed(e.into()),
        };

        if let Some(materializer) = &self.materializer {
            if let Err(e) = materializer.ensure(project).await {
                return OutcomeStatus::Failed(e.into());
            }
        }

        self.reporter.header(&project.header());
        let argv = operation.argv(project, branch.as_deref());
        match self.invoker.run(project, &argv, true).await {
            Ok(invocation) => match invocation.into_result(&argv) {
                Ok(()) => OutcomeStatus::Succeeded,
                Err(failure) => OutcomeStatus::Failed(failure.into()),
            },
            Err(e) => OutcomeStatus::Failed(e),
        }
    }
}

fn report_failure(reporter: &dyn Reporter, operation: &Operation, outcome: &ProjectOutcome) {
    if let OutcomeStatus::Failed(err) = &outcome.status {
        let summary = match err {
            ProjectError::Action(_) => operation.failure_summary(),
            other => other.to_string(),
        };
        let detail = match err {
            ProjectError::Action(_) => err.detail(),
            _ => String::new(),
        };
        for line in failure_lines(&outcome.relpath, &summary, &detail) {
            reporter.error(&line);
        }
    }
}
