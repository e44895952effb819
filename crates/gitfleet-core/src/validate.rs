//! Precondition checks run before a project is handed to the invoker.

use async_trait::async_trait;

use crate::error::PreconditionError;
use crate::operation::{FlowVerb, Operation};
use crate::project::Project;

/// Read-only view of a project's repository state.
#[async_trait]
pub trait ProjectInspector: Send + Sync {
    /// Short name of the checked-out branch; `None` when detached or absent.
    async fn current_branch(&self, project: &Project)
        -> Result<Option<String>, PreconditionError>;

    async fn has_local_branch(
        &self,
        project: &Project,
        branch: &str,
    ) -> Result<bool, PreconditionError>;
}

/// Outcome of a successful precondition check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Run the operation. `branch` is the branch the command should act on.
    Proceed { branch: Option<String> },
    /// Leave the project alone; not a failure.
    Skip { reason: String },
}

/// Checks branch invariants for an operation. Never mutates anything.
pub struct PreconditionValidator<'a> {
    inspector: &'a dyn ProjectInspector,
}

impl<'a> PreconditionValidator<'a> {
    pub fn new(inspector: &'a dyn ProjectInspector) -> Self {
        Self { inspector }
    }

    pub async fn check(
        &self,
        project: &Project,
        operation: &Operation,
    ) -> Result<Verdict, PreconditionError> {
        match operation {
            Operation::Flow(cmd) => {
                let flow = project
                    .flow
                    .as_ref()
                    .ok_or(PreconditionError::FlowNotEnabled)?;
                if matches!(cmd.verb, FlowVerb::Init | FlowVerb::Help) {
                    return Ok(Verdict::Proceed { branch: None });
                }
                for branch in flow.permanent_branches() {
                    if !self.inspector.has_local_branch(project, branch).await? {
                        return Err(PreconditionError::MissingPermanentBranch {
                            branch: branch.to_string(),
                        });
                    }
                }
                Ok(Verdict::Proceed { branch: None })
            }
            Operation::Push => match self.inspector.current_branch(project).await? {
                Some(branch) => Ok(Verdict::Proceed {
                    branch: Some(branch),
                }),
                None => Ok(Verdict::Skip {
                    reason: "no branch checked out".to_string(),
                }),
            },
            Operation::Pull => match project.tracking_branch() {
                Some(branch) => Ok(Verdict::Proceed {
                    branch: Some(branch.to_string()),
                }),
                None => Ok(Verdict::Skip {
                    reason: "revision is not a branch".to_string(),
                }),
            },
        }
    }
}
