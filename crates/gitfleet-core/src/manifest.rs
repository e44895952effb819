//! On-disk workspace description and the overlay manifest.
//!
//! Layout under the workspace root:
//!
//! ```text
//! .gitfleet/manifest.json   remotes and projects
//! .gitfleet/overlay.json    optional; enables deferred checkout
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{FleetError, FleetResult};
use crate::project::BranchModelConfig;

pub const STATE_DIR: &str = ".gitfleet";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const OVERLAY_FILE: &str = "overlay.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSpec {
    pub name: String,
    pub fetch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<BranchModelConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub path: String,
    pub remote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<BranchModelConfig>,
}

/// The set of projects and remotes making up one workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub remotes: Vec<RemoteSpec>,
    #[serde(default)]
    pub projects: Vec<ProjectSpec>,
}

impl Manifest {
    pub fn load(path: &Path) -> FleetResult<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| FleetError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn remote(&self, name: &str) -> Option<&RemoteSpec> {
        self.remotes.iter().find(|r| r.name == name)
    }
}

/// Per-project record in the overlay manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayProject {
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub previous_revision: Option<String>,
}

/// Persisted record of deferred projects and their prior revision pointers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayManifest {
    /// Directory the deferred working trees are created under.
    pub client_dir: PathBuf,
    #[serde(default)]
    pub projects: BTreeMap<String, OverlayProject>,
}

impl OverlayManifest {
    pub fn new(client_dir: impl Into<PathBuf>) -> Self {
        Self {
            client_dir: client_dir.into(),
            projects: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> FleetResult<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| FleetError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Persistence for the overlay manifest. Called at most once per run.
pub trait OverlayStore: Send + Sync {
    fn save(&self, overlay: &OverlayManifest) -> FleetResult<()>;
}

/// Writes the overlay manifest as pretty JSON, atomically.
pub struct FsOverlayStore {
    path: PathBuf,
}

impl FsOverlayStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OverlayStore for FsOverlayStore {
    fn save(&self, overlay: &OverlayManifest) -> FleetResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let body = serde_json::to_vec_pretty(overlay)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&body)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parses_minimal_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(
            &path,
            r#"{
                "remotes": [{"name": "origin", "fetch": "https://example.com/", "flow": {}}],
                "projects": [
                    {"path": "platform/a", "remote": "origin", "revision": "main"},
                    {"path": "platform/b", "remote": "origin"}
                ]
            }"#,
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.projects.len(), 2);
        assert_eq!(manifest.projects[1].revision, None);
        let origin = manifest.remote("origin").unwrap();
        assert_eq!(origin.flow, Some(BranchModelConfig::default()));
    }

    #[test]
    fn test_invalid_manifest_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, "{ not json").unwrap();
        let err = Manifest::load(&path).unwrap_err();
        assert!(err.to_string().contains(MANIFEST_FILE));
    }

    #[test]
    fn test_fs_overlay_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_DIR).join(OVERLAY_FILE);
        let store = FsOverlayStore::new(&path);

        let mut overlay = OverlayManifest::new(dir.path().join("client"));
        overlay.projects.insert(
            "a".to_string(),
            OverlayProject {
                revision: None,
                previous_revision: Some("main".to_string()),
            },
        );
        store.save(&overlay).unwrap();

        let back = OverlayManifest::load(&path).unwrap();
        assert_eq!(back, overlay);
    }

    #[test]
    fn test_fs_overlay_store_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OVERLAY_FILE);
        let store = FsOverlayStore::new(&path);

        store.save(&OverlayManifest::new("/one")).unwrap();
        store.save(&OverlayManifest::new("/two")).unwrap();

        let back = OverlayManifest::load(&path).unwrap();
        assert_eq!(back.client_dir, PathBuf::from("/two"));
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
