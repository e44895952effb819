//! Lazy materialization of deferred working trees.
//!
//! A run in overlay mode goes through two phases:
//!
//! 1. [`OverlaySession::classify`] records each selected project's previous
//!    revision, clears its live revision, and saves the overlay manifest.
//!    The session is consumed, so the manifest is written at most once.
//! 2. [`Materializer::ensure`] is called just before a project is acted on
//!    and performs the fetch + checkout if the project is not yet on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{FleetResult, MaterializationError};
use crate::manifest::{OverlayManifest, OverlayStore};
use crate::obs;
use crate::project::{MaterializationState, Project};

/// Two-phase sync of one project: network half, then local half.
#[async_trait]
pub trait ProjectSyncer: Send + Sync {
    /// Bring `revision`'s objects into the project's repository.
    async fn fetch(&self, project: &Project, revision: &str) -> Result<(), MaterializationError>;

    /// Check out the fetched `revision` into the working tree.
    async fn checkout(&self, project: &Project, revision: &str)
        -> Result<(), MaterializationError>;
}

/// Unsaved overlay state for one run.
pub struct OverlaySession<'a> {
    overlay: &'a mut OverlayManifest,
    store: &'a dyn OverlayStore,
}

impl<'a> OverlaySession<'a> {
    pub fn new(overlay: &'a mut OverlayManifest, store: &'a dyn OverlayStore) -> Self {
        Self { overlay, store }
    }

    /// Classify every project and persist the overlay, consuming the session.
    ///
    /// A previous revision that is already recorded is never overwritten.
    /// The manifest is saved only when classification changed it.
    pub fn classify<'s>(
        self,
        projects: &mut [Project],
        syncer: &'s dyn ProjectSyncer,
    ) -> FleetResult<Materializer<'s>> {
        let mut changed = 0usize;

        for project in projects.iter_mut() {
            let entry = self
                .overlay
                .projects
                .entry(project.relpath.clone())
                .or_default();

            if project.previous_revision.is_none() {
                project.previous_revision = project.revision.take();
            }
            project.revision = None;

            if entry.previous_revision != project.previous_revision || entry.revision.is_some() {
                entry.previous_revision = project.previous_revision.clone();
                entry.revision = None;
                changed += 1;
            }
        }

        let saved = changed > 0;
        if saved {
            self.store.save(self.overlay)?;
        }
        obs::emit_overlay_classified(projects.len(), changed, saved);

        Ok(Materializer { syncer })
    }
}

/// Turns unmaterialized projects into working trees on first use.
pub struct Materializer<'a> {
    syncer: &'a dyn ProjectSyncer,
}

impl<'a> Materializer<'a> {
    /// Materialize `project` if needed. Idempotent for projects already on disk.
    pub async fn ensure(
        &self,
        project: &Project,
    ) -> Result<MaterializationState, MaterializationError> {
        if project.materialization_state() == MaterializationState::Materialized {
            debug!(project = %project.relpath, "already materialized");
            return Ok(MaterializationState::Materialized);
        }

        let revision = project
            .previous_revision
            .as_deref()
            .ok_or(MaterializationError::NoRevision)?;

        obs::emit_materialization_state(&project.relpath, MaterializationState::Materializing);

        let mut guard = PendingWorktree::create(&project.worktree)?;
        self.syncer.fetch(project, revision).await?;
        self.syncer.checkout(project, revision).await?;
        guard.keep();

        obs::emit_materialization_state(&project.relpath, MaterializationState::Materialized);
        Ok(MaterializationState::Materialized)
    }
}

/// A working tree created by [`Materializer::ensure`] that is removed again
/// unless the checkout completes. Covers sync errors and a dropped future.
struct PendingWorktree {
    path: Option<PathBuf>,
}

impl PendingWorktree {
    fn create(path: &Path) -> Result<Self, MaterializationError> {
        if path.exists() {
            return Ok(Self { path: None });
        }
        std::fs::create_dir_all(path).map_err(|e| MaterializationError::CreateWorktree {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
        })
    }

    fn keep(&mut self) {
        self.path = None;
    }
}

impl Drop for PendingWorktree {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove incomplete working tree"
                );
            }
        }
    }
}
