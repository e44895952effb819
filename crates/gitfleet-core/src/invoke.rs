//! Per-project Action Invoker contract.

use async_trait::async_trait;

use crate::error::{ActionFailure, ProjectError};
use crate::project::Project;

/// Result of one external git process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub exit_code: i32,
    /// Empty unless stderr was captured.
    pub stderr: String,
}

impl Invocation {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// `Ok` on exit status zero, otherwise the failure with stderr attached.
    pub fn into_result(self, argv: &[String]) -> Result<(), ActionFailure> {
        if self.success() {
            return Ok(());
        }
        Err(ActionFailure {
            command: argv.first().cloned().unwrap_or_default(),
            exit_code: self.exit_code,
            stderr: self.stderr,
        })
    }
}

/// Runs the underlying version-control command for one project.
///
/// `argv` is passed to the tool exactly as given. Implementations must not
/// re-tokenize or rewrite any element.
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    async fn run(
        &self,
        project: &Project,
        argv: &[String],
        capture_stderr: bool,
    ) -> Result<Invocation, ProjectError>;
}
