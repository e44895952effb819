//! The closed set of batch operations and their failure policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UsageError;
use crate::project::Project;

/// How the dispatcher reacts to a per-project failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure, keep going, report all failures at the end.
    ContinueAndAggregate,
    /// Stop at the first failure.
    FailFast,
}

/// `git flow` verbs accepted by `gitfleet flow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowVerb {
    Init,
    Feature,
    Release,
    Hotfix,
    Help,
}

impl FlowVerb {
    pub const ALL: [FlowVerb; 5] = [
        FlowVerb::Init,
        FlowVerb::Feature,
        FlowVerb::Release,
        FlowVerb::Hotfix,
        FlowVerb::Help,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowVerb::Init => "init",
            FlowVerb::Feature => "feature",
            FlowVerb::Release => "release",
            FlowVerb::Hotfix => "hotfix",
            FlowVerb::Help => "help",
        }
    }
}

impl fmt::Display for FlowVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowVerb {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlowVerb::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UsageError::UnknownSubcommand(s.to_string()))
    }
}

/// A `git flow` invocation: the verb plus the operator's arguments, untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowCommand {
    pub verb: FlowVerb,
    pub args: Vec<String>,
}

impl FlowCommand {
    /// Parse `<verb> [args...]`. The first token must be a known verb.
    pub fn parse(tokens: &[String]) -> Result<Self, UsageError> {
        let (first, rest) = tokens.split_first().ok_or(UsageError::MissingSubcommand)?;
        let verb = first.parse::<FlowVerb>()?;
        Ok(Self {
            verb,
            args: rest.to_vec(),
        })
    }
}

/// One batch operation across the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Flow(FlowCommand),
    Push,
    Pull,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Flow(_) => "flow",
            Operation::Push => "push",
            Operation::Pull => "pull",
        }
    }

    /// Branch initialization changes repository state mid-run, so flow
    /// stops at the first failure. Push and pull are independent per project.
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            Operation::Flow(_) => FailurePolicy::FailFast,
            Operation::Push | Operation::Pull => FailurePolicy::ContinueAndAggregate,
        }
    }

    /// Whether `project` takes part in this operation at all.
    pub fn selects(&self, project: &Project) -> bool {
        match self {
            Operation::Flow(_) => project.flow.is_some(),
            Operation::Push | Operation::Pull => true,
        }
    }

    /// Progress title, if the operation shows a progress meter.
    pub fn progress_title(&self) -> Option<&'static str> {
        match self {
            Operation::Flow(_) => None,
            Operation::Push => Some("Pushing"),
            Operation::Pull => Some("Pulling"),
        }
    }

    /// One-line summary used when aggregating failures.
    pub fn failure_summary(&self) -> String {
        match self {
            Operation::Flow(cmd) => format!("git flow {} failed", cmd.verb),
            Operation::Push => "cannot push".to_string(),
            Operation::Pull => "cannot pull".to_string(),
        }
    }

    /// Arguments for `git`. `branch` is the branch the validator settled on.
    pub fn argv(&self, project: &Project, branch: Option<&str>) -> Vec<String> {
        match self {
            Operation::Flow(cmd) => {
                let mut argv = Vec::with_capacity(cmd.args.len() + 2);
                argv.push("flow".to_string());
                argv.push(cmd.verb.as_str().to_string());
                argv.extend(cmd.args.iter().cloned());
                argv
            }
            Operation::Push => {
                let mut argv = vec!["push".to_string(), project.remote.clone()];
                argv.extend(branch.map(str::to_string));
                argv
            }
            Operation::Pull => {
                let mut argv = vec![
                    "pull".to_string(),
                    "--no-rebase".to_string(),
                    project.remote.clone(),
                ];
                argv.extend(branch.map(str::to_string));
                argv
            }
        }
    }
}

/// Text printed by `gitfleet flow help`.
pub const FLOW_HELP: &str = "\
Available gitfleet flow subcommands are:
  init       Initialize the permanent branches in each flow project.
  feature    Manage your feature branches.
    (none)   Obtain a list of feature branches
    start    Start a new feature
    finish   Finish a feature
    publish  Publish a feature
    track    Track a published feature
    diff     Show feature differences
    checkout Checkout feature
    pull     Pull updates
    delete   Delete feature branch
  release    Manage your release branches.
    (none)   Obtain a list of release branches
    start    Start a new release
    finish   Finish a release
    publish  Publish a release
    track    Track a published release
    delete   Delete release branch
  hotfix     Manage your hotfix branches.
    (none)   Obtain a list of hotfix branches
    start    Start a new hotfix
    finish   Finish a hotfix
    publish  Publish a hotfix
    delete   Delete hotfix branch
";
