//! Error taxonomy for batch orchestration.
//!
//! Usage errors abort before any project is touched. Everything else is
//! per-project and recovered by the dispatcher according to the run's
//! [`FailurePolicy`](crate::operation::FailurePolicy).

use std::path::PathBuf;

use thiserror::Error;

/// Rejected at the command boundary; no project is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("no flow subcommand given. See 'gitfleet flow help'.")]
    MissingSubcommand,

    #[error("'{0}' is not a flow subcommand.  See 'gitfleet flow help'.")]
    UnknownSubcommand(String),

    #[error("at least one project must be specified")]
    NoProjects,
}

/// A project is not in a state the operation can act on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("project has no branching-model configuration")]
    FlowNotEnabled,

    #[error("permanent branch '{branch}' does not exist locally; run 'gitfleet flow init' first")]
    MissingPermanentBranch { branch: String },

    #[error("could not inspect repository: {0}")]
    Inspection(String),
}

/// Lazily creating a working tree failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterializationError {
    #[error("could not create working tree {path}: {reason}")]
    CreateWorktree { path: PathBuf, reason: String },

    #[error("fetch of '{revision}' failed: {reason}")]
    Fetch { revision: String, reason: String },

    #[error("checkout of '{revision}' failed: {reason}")]
    Checkout { revision: String, reason: String },

    #[error("no revision recorded to materialize from")]
    NoRevision,
}

/// The underlying git process exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("git {command} exited with status {exit_code}")]
pub struct ActionFailure {
    /// First element of the argv handed to git.
    pub command: String,
    pub exit_code: i32,
    /// Captured standard error, verbatim.
    pub stderr: String,
}

/// Anything that can go wrong while processing one project.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Materialization(#[from] MaterializationError),

    #[error(transparent)]
    Action(#[from] ActionFailure),

    #[error("failed to run git: {0}")]
    Spawn(String),

    #[error("interrupted")]
    Interrupted,
}

impl ProjectError {
    /// Error text worth showing the operator under the project's header.
    pub fn detail(&self) -> String {
        match self {
            ProjectError::Action(failure) => failure.stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// Crate-level errors outside the per-project loop.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project {path} has no working tree at {worktree}")]
    WorktreeMissing { path: String, worktree: PathBuf },

    #[error("project {path} references unknown remote '{remote}'")]
    UnknownRemote { path: String, remote: String },

    #[error("invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gitfleet operations.
pub type FleetResult<T> = std::result::Result<T, FleetError>;
