//! gitfleet core library
//!
//! Runs one git operation (a `git flow` verb, a push, or a pull) across every
//! project of a multi-repository workspace.
//!
//! ## Pipeline
//!
//! - [`ProjectDirectory`] resolves the requested projects, in order
//! - [`PreconditionValidator`] checks branch invariants per project
//! - [`Materializer`] creates deferred working trees on first use
//! - [`ActionInvoker`] runs git once per project
//! - [`BatchDispatcher`] drives the above under an explicit [`FailurePolicy`]
//!   and collects a [`BatchResult`]

pub mod directory;
pub mod dispatch;
pub mod error;
pub mod fakes;
pub mod git;
pub mod invoke;
pub mod manifest;
pub mod materialize;
pub mod obs;
pub mod operation;
pub mod project;
pub mod report;
pub mod telemetry;
pub mod validate;
pub mod workspace;

pub use directory::ProjectDirectory;
pub use dispatch::{
    BatchDispatcher, BatchResult, OutcomeStatus, ProjectOutcome, EXIT_FAILURE, EXIT_INTERRUPTED,
    EXIT_OK,
};
pub use error::{
    ActionFailure, FleetError, FleetResult, MaterializationError, PreconditionError,
    ProjectError, UsageError,
};
pub use git::GitCli;
pub use invoke::{ActionInvoker, Invocation};
pub use manifest::{
    FsOverlayStore, Manifest, OverlayManifest, OverlayProject, OverlayStore, ProjectSpec,
    RemoteSpec,
};
pub use materialize::{Materializer, OverlaySession, ProjectSyncer};
pub use operation::{FailurePolicy, FlowCommand, FlowVerb, Operation, FLOW_HELP};
pub use project::{BranchModelConfig, MaterializationState, Project};
pub use report::{ConsoleReporter, Reporter};
pub use telemetry::init_tracing;
pub use validate::{PreconditionValidator, ProjectInspector, Verdict};
pub use workspace::Workspace;

/// gitfleet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
