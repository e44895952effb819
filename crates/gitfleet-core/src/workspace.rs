//! Explicit workspace context passed to every component of a run.

use std::path::{Path, PathBuf};

use crate::directory::ProjectDirectory;
use crate::error::{FleetError, FleetResult};
use crate::manifest::{
    FsOverlayStore, Manifest, OverlayManifest, ProjectSpec, MANIFEST_FILE, OVERLAY_FILE,
    STATE_DIR,
};
use crate::project::Project;

/// A loaded workspace: root directory, manifest, and optional overlay.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub manifest: Manifest,
    /// Present when the workspace defers checkouts until first use.
    pub overlay: Option<OverlayManifest>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, manifest: Manifest) -> Self {
        Self {
            root: root.into(),
            manifest,
            overlay: None,
        }
    }

    pub fn with_overlay(mut self, overlay: OverlayManifest) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Load `.gitfleet/manifest.json` and, when present, `.gitfleet/overlay.json`.
    pub fn open(root: impl AsRef<Path>) -> FleetResult<Self> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(STATE_DIR).join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(FleetError::InvalidManifest {
                path: manifest_path,
                reason: "not found; is this a gitfleet workspace?".to_string(),
            });
        }
        let manifest = Manifest::load(&manifest_path)?;

        let overlay_path = root.join(STATE_DIR).join(OVERLAY_FILE);
        let overlay = if overlay_path.is_file() {
            let mut overlay = OverlayManifest::load(&overlay_path)?;
            if overlay.client_dir.is_relative() {
                overlay.client_dir = root.join(&overlay.client_dir);
            }
            Some(overlay)
        } else {
            None
        };

        Ok(Self {
            root,
            manifest,
            overlay,
        })
    }

    pub fn is_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    /// Store for this workspace's overlay manifest.
    pub fn overlay_store(&self) -> FsOverlayStore {
        FsOverlayStore::new(self.root.join(STATE_DIR).join(OVERLAY_FILE))
    }

    fn worktree_for(&self, relpath: &str) -> PathBuf {
        match &self.overlay {
            Some(overlay) => overlay.client_dir.join(relpath),
            None => self.root.join(relpath),
        }
    }

    fn build_project(&self, spec: &ProjectSpec) -> FleetResult<Project> {
        let remote =
            self.manifest
                .remote(&spec.remote)
                .ok_or_else(|| FleetError::UnknownRemote {
                    path: spec.path.clone(),
                    remote: spec.remote.clone(),
                })?;

        let mut project = Project::new(&spec.path, &remote.name, self.worktree_for(&spec.path))
            .with_remote_url(&remote.fetch);
        project.flow = spec.flow.clone().or_else(|| remote.flow.clone());
        project.revision = spec.revision.clone();

        if let Some(entry) = self
            .overlay
            .as_ref()
            .and_then(|o| o.projects.get(&spec.path))
        {
            project.revision = entry.revision.clone();
            project.previous_revision = entry.previous_revision.clone();
        }
        Ok(project)
    }

    fn find_spec(&self, token: &str) -> Option<&ProjectSpec> {
        let name = token.trim_end_matches('/');
        if let Some(spec) = self.manifest.projects.iter().find(|p| p.path == name) {
            return Some(spec);
        }

        let candidate = normalize(&self.root.join(token));
        self.manifest.projects.iter().find(|p| {
            normalize(&self.root.join(&p.path)) == candidate
                || normalize(&self.worktree_for(&p.path)) == candidate
        })
    }
}

impl ProjectDirectory for Workspace {
    fn resolve(&self, names: &[String], allow_missing: bool) -> FleetResult<Vec<Project>> {
        let specs: Vec<&ProjectSpec> = if names.is_empty() {
            self.manifest.projects.iter().collect()
        } else {
            let mut picked: Vec<&ProjectSpec> = Vec::with_capacity(names.len());
            for token in names {
                let spec = self
                    .find_spec(token)
                    .ok_or_else(|| FleetError::ProjectNotFound(token.clone()))?;
                if !picked.iter().any(|p| p.path == spec.path) {
                    picked.push(spec);
                }
            }
            picked
        };

        let mut projects = Vec::with_capacity(specs.len());
        for spec in specs {
            let project = self.build_project(spec)?;
            if !allow_missing && !project.worktree_present() {
                return Err(FleetError::WorktreeMissing {
                    path: project.relpath,
                    worktree: project.worktree,
                });
            }
            projects.push(project);
        }
        Ok(projects)
    }
}

/// Lexically collapse `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
