//! Integration tests for the batch dispatcher.
//!
//! Covers:
//! - Header ordering and exit status when every project succeeds
//! - Continue-and-aggregate vs. fail-fast failure handling
//! - Flow selection, flow init, and permanent-branch preconditions
//! - Interrupts during a blocking git invocation
//! - Usage errors touch no project

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use gitfleet_core::fakes::{FakeInspector, RecordingReporter, ScriptedInvoker};
use gitfleet_core::{
    BatchDispatcher, FailurePolicy, FlowCommand, FlowVerb, Operation, OutcomeStatus,
    BranchModelConfig, Project, ProjectError, UsageError, EXIT_FAILURE, EXIT_INTERRUPTED,
    EXIT_OK,
};

fn project(name: &str) -> Project {
    Project::new(name, "origin", format!("/ws/{name}"))
}

fn flow_project(name: &str) -> Project {
    project(name).with_flow(BranchModelConfig::default())
}

fn flow(verb: FlowVerb, args: &[&str]) -> Operation {
    Operation::Flow(FlowCommand {
        verb,
        args: args.iter().map(|s| s.to_string()).collect(),
    })
}

fn on_branch(names: &[&str]) -> FakeInspector {
    names
        .iter()
        .fold(FakeInspector::new(), |i, n| i.with_current(n, "main"))
}

// ---- All projects succeed ----

#[tokio::test]
async fn every_success_exits_zero_with_headers_in_order() {
    let invoker = ScriptedInvoker::new();
    let inspector = on_branch(&["a", "b", "c"]);
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &Operation::Push,
            FailurePolicy::ContinueAndAggregate,
            vec![project("c"), project("a"), project("b")],
            pending::<()>(),
        )
        .await
        .unwrap();

    assert_eq!(result.exit_code(), EXIT_OK);
    assert_eq!(
        reporter.headers(),
        vec!["Project: c/", "Project: a/", "Project: b/"]
    );
    assert!(reporter.errors().is_empty());
    assert_eq!(result.succeeded_count(), 3);
}

// ---- Continue-and-aggregate ----

#[tokio::test]
async fn push_failure_in_middle_reports_path_and_continues() {
    let invoker = ScriptedInvoker::new().fail("b", 1, "rejected\n");
    let inspector = on_branch(&["a", "b", "c"]);
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &Operation::Push,
            FailurePolicy::ContinueAndAggregate,
            vec![project("a"), project("b"), project("c")],
            pending::<()>(),
        )
        .await
        .unwrap();

    assert_eq!(invoker.invoked_projects(), vec!["a", "b", "c"]);
    assert_eq!(result.outcomes[0].status, OutcomeStatus::Succeeded);
    assert!(result.outcomes[1].status.is_failure());
    assert_eq!(result.outcomes[2].status, OutcomeStatus::Succeeded);
    assert_eq!(result.exit_code(), EXIT_FAILURE);
    assert_eq!(
        reporter.errors(),
        vec!["error: b/: cannot push", "b/: rejected"]
    );
}

#[tokio::test]
async fn aggregate_diagnostics_name_exactly_the_failed_set() {
    let invoker = ScriptedInvoker::new()
        .fail("a", 1, "denied")
        .fail("d", 128, "fatal: unreachable");
    let inspector = on_branch(&["a", "b", "c", "d"]);
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &Operation::Push,
            FailurePolicy::ContinueAndAggregate,
            vec![project("a"), project("b"), project("c"), project("d")],
            pending::<()>(),
        )
        .await
        .unwrap();

    assert_eq!(invoker.invoked_projects().len(), 4);
    let named: Vec<String> = reporter
        .errors()
        .into_iter()
        .filter(|l| l.starts_with("error: "))
        .collect();
    assert_eq!(named, vec!["error: a/: cannot push", "error: d/: cannot push"]);
    assert_eq!(result.failed_count(), 2);
}

#[tokio::test]
async fn aggregate_reports_after_progress_ends() {
    let invoker = ScriptedInvoker::new().fail("a", 1, "rejected");
    let inspector = on_branch(&["a", "b"]);
    let reporter = RecordingReporter::new();

    BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &Operation::Push,
            FailurePolicy::ContinueAndAggregate,
            vec![project("a"), project("b")],
            pending::<()>(),
        )
        .await
        .unwrap();

    let events = reporter.events();
    let end = events
        .iter()
        .position(|e| *e == gitfleet_core::fakes::ReportEvent::End)
        .unwrap();
    let first_error = events
        .iter()
        .position(|e| matches!(e, gitfleet_core::fakes::ReportEvent::Error(_)))
        .unwrap();
    assert!(end < first_error);
}

// ---- Fail-fast ----

#[tokio::test]
async fn fail_fast_stops_after_first_failure() {
    let invoker = ScriptedInvoker::new().fail("b", 1, "Branch 'feature/x' already exists.");
    let inspector = FakeInspector::new()
        .with_branches("a", &["master", "develop"])
        .with_branches("b", &["master", "develop"])
        .with_branches("c", &["master", "develop"]);
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &flow(FlowVerb::Feature, &["start", "x"]),
            FailurePolicy::FailFast,
            vec![flow_project("a"), flow_project("b"), flow_project("c")],
            pending::<()>(),
        )
        .await
        .unwrap();

    assert_eq!(invoker.invoked_projects(), vec!["a", "b"]);
    assert!(result.stopped_early);
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.exit_code(), EXIT_FAILURE);
    assert_eq!(
        reporter.errors(),
        vec![
            "error: b/: git flow feature failed",
            "b/: Branch 'feature/x' already exists."
        ]
    );
}

#[tokio::test]
async fn fail_fast_on_missing_permanent_branch() {
    let invoker = ScriptedInvoker::new();
    let inspector = FakeInspector::new()
        .with_branches("a", &["master", "develop"])
        .with_branches("b", &["master"])
        .with_branches("c", &["master", "develop"]);
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &flow(FlowVerb::Release, &["start", "1.0"]),
            FailurePolicy::FailFast,
            vec![flow_project("a"), flow_project("b"), flow_project("c")],
            pending::<()>(),
        )
        .await
        .unwrap();

    assert_eq!(invoker.invoked_projects(), vec!["a"]);
    assert!(matches!(
        result.outcomes[1].status,
        OutcomeStatus::Failed(ProjectError::Precondition(_))
    ));
    assert!(reporter.errors()[0].starts_with("error: b/: permanent branch 'develop'"));
    assert_eq!(reporter.headers(), vec!["Project: a/"]);
}

#[tokio::test]
async fn same_failures_under_both_policies_differ_only_in_reach() {
    let projects = || vec![project("a"), project("b"), project("c")];
    let inspector = on_branch(&["a", "b", "c"]);

    let invoker = ScriptedInvoker::new().fail("a", 1, "x");
    let reporter = RecordingReporter::new();
    let aggregate = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &Operation::Push,
            FailurePolicy::ContinueAndAggregate,
            projects(),
            pending::<()>(),
        )
        .await
        .unwrap();
    assert_eq!(aggregate.outcomes.len(), 3);

    let invoker = ScriptedInvoker::new().fail("a", 1, "x");
    let reporter = RecordingReporter::new();
    let fast = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(&Operation::Push, FailurePolicy::FailFast, projects(), pending::<()>())
        .await
        .unwrap();
    assert_eq!(fast.outcomes.len(), 1);
    assert_eq!(aggregate.exit_code(), fast.exit_code());
}

// ---- Flow selection ----

#[tokio::test]
async fn flow_init_processes_only_flow_projects_and_creates_branches() {
    let inspector = Arc::new(FakeInspector::new());
    let invoker = ScriptedInvoker::new().creates_branches(
        Arc::clone(&inspector),
        "a",
        &["master", "develop"],
    );
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, inspector.as_ref(), &reporter)
        .run(
            &flow(FlowVerb::Init, &["-d"]),
            FailurePolicy::FailFast,
            vec![flow_project("a"), project("b")],
            pending::<()>(),
        )
        .await
        .unwrap();

    assert_eq!(result.exit_code(), EXIT_OK);
    assert_eq!(result.outcomes.len(), 1);
    assert_eq!(result.outcomes[0].relpath, "a");
    assert_eq!(
        invoker.calls(),
        vec![(
            "a".to_string(),
            vec!["flow".to_string(), "init".to_string(), "-d".to_string()]
        )]
    );
    assert_eq!(inspector.branches("a"), vec!["develop", "master"]);
    assert!(inspector.branches("b").is_empty());
}

#[tokio::test]
async fn project_without_flow_config_is_never_selected() {
    let invoker = ScriptedInvoker::new();
    let inspector = FakeInspector::new().with_branches("b", &["master", "develop"]);
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &flow(FlowVerb::Feature, &[]),
            FailurePolicy::FailFast,
            vec![project("a"), project("b")],
            pending::<()>(),
        )
        .await
        .unwrap();

    assert!(result.outcomes.is_empty());
    assert!(invoker.calls().is_empty());
    assert_eq!(result.exit_code(), EXIT_OK);
}

#[tokio::test]
async fn flow_arguments_reach_git_unmodified() {
    let invoker = ScriptedInvoker::new();
    let inspector = FakeInspector::new().with_branches("a", &["master", "develop"]);
    let reporter = RecordingReporter::new();
    let args = ["finish", "-m", "release notes with  spaces", "--", "1.0"];

    BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &flow(FlowVerb::Release, &args),
            FailurePolicy::FailFast,
            vec![flow_project("a")],
            pending::<()>(),
        )
        .await
        .unwrap();

    let (_, argv) = &invoker.calls()[0];
    assert_eq!(&argv[..2], &["flow".to_string(), "release".to_string()]);
    assert_eq!(&argv[2..], &args.map(String::from));
}

// ---- Usage errors ----

#[test]
fn bogus_flow_verb_is_rejected_before_any_project() {
    let invoker = ScriptedInvoker::new();
    let err = FlowCommand::parse(&["bogus".to_string()]).unwrap_err();
    assert_eq!(err, UsageError::UnknownSubcommand("bogus".to_string()));
    assert!(invoker.calls().is_empty());
}

// ---- Interrupts ----

#[tokio::test]
async fn interrupt_stops_run_and_keeps_completed_outcomes() {
    let invoker = ScriptedInvoker::new().hang("b");
    let inspector = on_branch(&["a", "b", "c"]);
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &Operation::Push,
            FailurePolicy::ContinueAndAggregate,
            vec![project("a"), project("b"), project("c")],
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    assert!(result.interrupted);
    assert_eq!(result.exit_code(), EXIT_INTERRUPTED);
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.outcomes[0].status, OutcomeStatus::Succeeded);
    assert_eq!(
        result.outcomes[1].status,
        OutcomeStatus::Failed(ProjectError::Interrupted)
    );
    assert_eq!(invoker.invoked_projects(), vec!["a", "b"]);
    assert_eq!(reporter.errors(), vec!["error: b/: interrupted"]);
}

#[tokio::test]
async fn interrupt_preempts_stalled_inspection() {
    let invoker = ScriptedInvoker::new();
    let inspector = on_branch(&["a", "c"]).stall("b");
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &Operation::Push,
            FailurePolicy::ContinueAndAggregate,
            vec![project("a"), project("b"), project("c")],
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    assert_eq!(result.exit_code(), EXIT_INTERRUPTED);
    assert_eq!(
        result.outcomes[1].status,
        OutcomeStatus::Failed(ProjectError::Interrupted)
    );
    assert_eq!(invoker.invoked_projects(), vec!["a"]);
}

#[tokio::test]
async fn interrupt_already_pending_touches_nothing() {
    let invoker = ScriptedInvoker::new();
    let inspector = on_branch(&["a"]);
    let reporter = RecordingReporter::new();

    let result = BatchDispatcher::new(&invoker, &inspector, &reporter)
        .run(
            &Operation::Push,
            FailurePolicy::ContinueAndAggregate,
            vec![project("a")],
            std::future::ready(()),
        )
        .await
        .unwrap();

    assert!(result.interrupted);
    assert!(invoker.calls().is_empty());
}
