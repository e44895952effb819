//! Project records and their derived materialization state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Names of the two permanent branches used by `git flow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchModelConfig {
    #[serde(default = "default_master")]
    pub master: String,
    #[serde(default = "default_develop")]
    pub develop: String,
}

fn default_master() -> String {
    "master".to_string()
}

fn default_develop() -> String {
    "develop".to_string()
}

impl Default for BranchModelConfig {
    fn default() -> Self {
        Self {
            master: default_master(),
            develop: default_develop(),
        }
    }
}

impl BranchModelConfig {
    pub fn new(master: impl Into<String>, develop: impl Into<String>) -> Self {
        Self {
            master: master.into(),
            develop: develop.into(),
        }
    }

    /// Both permanent branches, master first.
    pub fn permanent_branches(&self) -> [&str; 2] {
        [self.master.as_str(), self.develop.as_str()]
    }
}

/// One version-controlled working tree in the workspace.
///
/// Built by a [`ProjectDirectory`](crate::directory::ProjectDirectory); the
/// orchestrator never constructs these itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Path relative to the workspace root. Identity within the workspace.
    pub relpath: String,
    /// Remote name, e.g. `origin`.
    pub remote: String,
    /// Fetch URL of `remote`.
    pub remote_url: String,
    /// Revision expression the project tracks. Cleared for projects whose
    /// checkout is deferred to the materializer.
    pub revision: Option<String>,
    /// Where the working tree lives (or will live).
    pub worktree: PathBuf,
    /// Revision captured before a deferred sync.
    pub previous_revision: Option<String>,
    /// Effective branching-model configuration (own, else the remote's).
    pub flow: Option<BranchModelConfig>,
}

impl Project {
    pub fn new(
        relpath: impl Into<String>,
        remote: impl Into<String>,
        worktree: impl Into<PathBuf>,
    ) -> Self {
        Self {
            relpath: relpath.into(),
            remote: remote.into(),
            remote_url: String::new(),
            revision: None,
            worktree: worktree.into(),
            previous_revision: None,
            flow: None,
        }
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = url.into();
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_previous_revision(mut self, revision: impl Into<String>) -> Self {
        self.previous_revision = Some(revision.into());
        self
    }

    pub fn with_flow(mut self, flow: BranchModelConfig) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Whether the working tree directory exists on disk.
    pub fn worktree_present(&self) -> bool {
        self.worktree.is_dir()
    }

    /// The revision the project follows, whether live or deferred.
    pub fn tracking_revision(&self) -> Option<&str> {
        self.revision
            .as_deref()
            .or(self.previous_revision.as_deref())
    }

    /// Tracked branch name, if the tracking revision names a branch.
    pub fn tracking_branch(&self) -> Option<&str> {
        let rev = self.tracking_revision()?;
        if is_commit_id(rev) || rev.starts_with("refs/tags/") {
            return None;
        }
        Some(rev.strip_prefix("refs/heads/").unwrap_or(rev))
    }

    /// Derived from what is recorded and what is on disk, never stored.
    pub fn materialization_state(&self) -> MaterializationState {
        if self.previous_revision.is_some() && self.worktree_present() {
            MaterializationState::Materialized
        } else {
            MaterializationState::Unmaterialized
        }
    }

    /// Header line printed before the project's command runs.
    pub fn header(&self) -> String {
        format!("Project: {}/", self.relpath)
    }
}

/// Lifecycle of a deferred working tree within one run.
///
/// Transitions only forward: `Unmaterialized -> Materializing -> Materialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializationState {
    Unmaterialized,
    Materializing,
    Materialized,
}

/// Full 40-character hex object id.
pub fn is_commit_id(rev: &str) -> bool {
    rev.len() == 40 && rev.chars().all(|c| c.is_ascii_hexdigit())
}
