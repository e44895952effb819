//! Git process adapters for inspection, invocation, and two-phase sync.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MaterializationError, PreconditionError, ProjectError};
use crate::invoke::{ActionInvoker, Invocation};
use crate::materialize::ProjectSyncer;
use crate::project::Project;
use crate::validate::ProjectInspector;

/// Runs the `git` executable. Implements every git-facing seam.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn query(&self, dir: &Path, args: &[&str]) -> Result<Output, PreconditionError> {
        Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PreconditionError::Inspection(format!("failed to run git: {e}")))
    }

    async fn quiet(&self, dir: &Path, args: &[&str]) -> std::io::Result<Output> {
        Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
    }
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl ProjectInspector for GitCli {
    async fn current_branch(
        &self,
        project: &Project,
    ) -> Result<Option<String>, PreconditionError> {
        if !project.worktree_present() {
            return Ok(None);
        }
        let output = self
            .query(&project.worktree, &["symbolic-ref", "--short", "-q", "HEAD"])
            .await?;
        match output.status.code() {
            Some(0) => {
                let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok((!branch.is_empty()).then_some(branch))
            }
            // Detached HEAD.
            Some(1) => Ok(None),
            _ => Err(PreconditionError::Inspection(stderr_text(&output))),
        }
    }

    async fn has_local_branch(
        &self,
        project: &Project,
        branch: &str,
    ) -> Result<bool, PreconditionError> {
        if !project.worktree_present() {
            return Ok(false);
        }
        let refname = format!("refs/heads/{branch}");
        let output = self
            .query(
                &project.worktree,
                &["rev-parse", "--verify", "-q", refname.as_str()],
            )
            .await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(PreconditionError::Inspection(stderr_text(&output))),
        }
    }
}

#[async_trait]
impl ActionInvoker for GitCli {
    async fn run(
        &self,
        project: &Project,
        argv: &[String],
        capture_stderr: bool,
    ) -> Result<Invocation, ProjectError> {
        debug!(project = %project.relpath, ?argv, "running git");
        let child = Command::new(&self.program)
            .args(argv)
            .current_dir(&project.worktree)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(if capture_stderr {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProjectError::Spawn(e.to_string()))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProjectError::Spawn(e.to_string()))?;

        Ok(Invocation {
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl ProjectSyncer for GitCli {
    async fn fetch(&self, project: &Project, revision: &str) -> Result<(), MaterializationError> {
        let fetch_err = |reason: String| MaterializationError::Fetch {
            revision: revision.to_string(),
            reason,
        };

        if !project.worktree.join(".git").exists() {
            let init = self
                .quiet(&project.worktree, &["init", "-q"])
                .await
                .map_err(|e| fetch_err(e.to_string()))?;
            if !init.status.success() {
                return Err(fetch_err(stderr_text(&init)));
            }
        }

        let output = self
            .quiet(
                &project.worktree,
                &["fetch", "-q", project.remote_url.as_str(), revision],
            )
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        if !output.status.success() {
            return Err(fetch_err(stderr_text(&output)));
        }
        Ok(())
    }

    async fn checkout(
        &self,
        project: &Project,
        revision: &str,
    ) -> Result<(), MaterializationError> {
        let checkout_err = |reason: String| MaterializationError::Checkout {
            revision: revision.to_string(),
            reason,
        };
        let output = self
            .quiet(
                &project.worktree,
                &["checkout", "-q", "--detach", "FETCH_HEAD"],
            )
            .await
            .map_err(|e| checkout_err(e.to_string()))?;
        if !output.status.success() {
            return Err(checkout_err(stderr_text(&output)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn make_git_repo(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        run_git(dir, &["init", "-q"]);
        run_git(dir, &["config", "user.name", "test-user"]);
        run_git(dir, &["config", "user.email", "test@example.com"]);
        run_git(dir, &["checkout", "-q", "-b", "trunk"]);
        run_git(dir, &["commit", "-q", "--allow-empty", "-m", "initial"]);
    }

    fn project_at(dir: &Path) -> Project {
        Project::new("p", "origin", dir)
    }

    #[tokio::test]
    async fn current_branch_reads_symbolic_ref() {
        let tmp = tempfile::tempdir().unwrap();
        make_git_repo(tmp.path());
        let git = GitCli::default();
        assert_eq!(
            git.current_branch(&project_at(tmp.path())).await.unwrap(),
            Some("trunk".to_string())
        );
    }

    #[tokio::test]
    async fn current_branch_none_when_detached() {
        let tmp = tempfile::tempdir().unwrap();
        make_git_repo(tmp.path());
        run_git(tmp.path(), &["checkout", "-q", "--detach"]);
        let git = GitCli::default();
        assert_eq!(
            git.current_branch(&project_at(tmp.path())).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn missing_worktree_has_no_branches() {
        let tmp = tempfile::tempdir().unwrap();
        let git = GitCli::default();
        let p = project_at(&tmp.path().join("absent"));
        assert_eq!(git.current_branch(&p).await.unwrap(), None);
        assert!(!git.has_local_branch(&p, "trunk").await.unwrap());
    }

    #[tokio::test]
    async fn has_local_branch_checks_heads() {
        let tmp = tempfile::tempdir().unwrap();
        make_git_repo(tmp.path());
        run_git(tmp.path(), &["branch", "develop"]);
        let git = GitCli::default();
        let p = project_at(tmp.path());
        assert!(git.has_local_branch(&p, "develop").await.unwrap());
        assert!(!git.has_local_branch(&p, "release").await.unwrap());
    }

    #[tokio::test]
    async fn inspection_outside_repo_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let git = GitCli::default();
        let result = git.current_branch(&project_at(tmp.path())).await;
        assert!(matches!(result, Err(PreconditionError::Inspection(_))));
    }

    #[tokio::test]
    async fn run_reports_exit_status_and_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        make_git_repo(tmp.path());
        let git = GitCli::default();
        let p = project_at(tmp.path());

        let ok = git
            .run(&p, &["rev-parse".to_string(), "HEAD".to_string()], true)
            .await
            .unwrap();
        assert!(ok.success());

        let bad = git
            .run(&p, &["checkout".to_string(), "no-such-branch".to_string()], true)
            .await
            .unwrap();
        assert!(!bad.success());
        assert!(bad.stderr.contains("no-such-branch"));
    }

    #[tokio::test]
    async fn run_missing_program_is_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let git = GitCli::new(tmp.path().join("not-git"));
        let err = git
            .run(&project_at(tmp.path()), &["status".to_string()], true)
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::Spawn(_)));
    }

    #[tokio::test]
    async fn fetch_and_checkout_materialize_upstream_revision() {
        let tmp = tempfile::tempdir().unwrap();
        let upstream = tmp.path().join("upstream");
        make_git_repo(&upstream);
        let head = run_git(&upstream, &["rev-parse", "HEAD"]);

        let worktree = tmp.path().join("client").join("p");
        std::fs::create_dir_all(&worktree).unwrap();
        let p = Project::new("p", "origin", &worktree)
            .with_remote_url(upstream.to_string_lossy().to_string());

        let git = GitCli::default();
        git.fetch(&p, "trunk").await.unwrap();
        git.checkout(&p, "trunk").await.unwrap();

        assert_eq!(run_git(&worktree, &["rev-parse", "HEAD"]), head);
        assert_eq!(git.current_branch(&p).await.unwrap(), None);
    }

    #[tokio::test]
    async fn fetch_unknown_revision_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let upstream = tmp.path().join("upstream");
        make_git_repo(&upstream);

        let worktree = tmp.path().join("client").join("p");
        std::fs::create_dir_all(&worktree).unwrap();
        let p = Project::new("p", "origin", &worktree)
            .with_remote_url(upstream.to_string_lossy().to_string());

        let err = GitCli::default().fetch(&p, "nope").await.unwrap_err();
        assert!(matches!(err, MaterializationError::Fetch { .. }));
    }
}
