//! In-memory fakes for the orchestration seams (testing only)
//!
//! Provides `ScriptedInvoker`, `FakeInspector`, `FakeSyncer`,
//! `MemoryOverlayStore`, and `RecordingReporter`, which satisfy the trait
//! contracts without spawning git or touching a real workspace.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{FleetResult, MaterializationError, PreconditionError, ProjectError};
use crate::invoke::{ActionInvoker, Invocation};
use crate::manifest::{OverlayManifest, OverlayStore};
use crate::materialize::ProjectSyncer;
use crate::project::Project;
use crate::report::Reporter;
use crate::validate::ProjectInspector;

// ---------------------------------------------------------------------------
// FakeInspector
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RepoState {
    current: Option<String>,
    branches: HashSet<String>,
    stalled: bool,
}

/// Repository state keyed by project path. Unknown projects are detached
/// and have no branches.
#[derive(Debug, Default)]
pub struct FakeInspector {
    repos: Mutex<HashMap<String, RepoState>>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current(self, relpath: &str, branch: &str) -> Self {
        {
            let mut repos = self.repos.lock().unwrap();
            let repo = repos.entry(relpath.to_string()).or_default();
            repo.current = Some(branch.to_string());
            repo.branches.insert(branch.to_string());
        }
        self
    }

    pub fn with_branches(self, relpath: &str, branches: &[&str]) -> Self {
        self.add_branches(relpath, branches);
        self
    }

    /// Inspection of `relpath` never completes.
    pub fn stall(self, relpath: &str) -> Self {
        self.repos
            .lock()
            .unwrap()
            .entry(relpath.to_string())
            .or_default()
            .stalled = true;
        self
    }

    fn stalled(&self, relpath: &str) -> bool {
        let repos = self.repos.lock().unwrap();
        repos.get(relpath).map(|r| r.stalled).unwrap_or(false)
    }

    pub fn add_branches(&self, relpath: &str, branches: &[&str]) {
        let mut repos = self.repos.lock().unwrap();
        let repo = repos.entry(relpath.to_string()).or_default();
        repo.branches
            .extend(branches.iter().map(|b| b.to_string()));
    }

    pub fn branches(&self, relpath: &str) -> Vec<String> {
        let repos = self.repos.lock().unwrap();
        let mut out: Vec<String> = repos
            .get(relpath)
            .map(|r| r.branches.iter().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }
}

#[async_trait]
impl ProjectInspector for FakeInspector {
    async fn current_branch(
        &self,
        project: &Project,
    ) -> Result<Option<String>, PreconditionError> {
        if self.stalled(&project.relpath) {
            std::future::pending::<()>().await;
        }
        let repos = self.repos.lock().unwrap();
        Ok(repos.get(&project.relpath).and_then(|r| r.current.clone()))
    }

    async fn has_local_branch(
        &self,
        project: &Project,
        branch: &str,
    ) -> Result<bool, PreconditionError> {
        if self.stalled(&project.relpath) {
            std::future::pending::<()>().await;
        }
        let repos = self.repos.lock().unwrap();
        Ok(repos
            .get(&project.relpath)
            .map(|r| r.branches.contains(branch))
            .unwrap_or(false))
    }
}

// ---------------------------------------------------------------------------
// ScriptedInvoker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Script {
    Exit { code: i32, stderr: String },
    SpawnError,
    Hang,
}

/// Records every invocation and answers from a per-project script.
/// Unscripted projects exit 0.
#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: HashMap<String, Script>,
    creates: Vec<(Arc<FakeInspector>, String, Vec<String>)>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, relpath: &str, code: i32, stderr: &str) -> Self {
        self.scripts.insert(
            relpath.to_string(),
            Script::Exit {
                code,
                stderr: stderr.to_string(),
            },
        );
        self
    }

    pub fn spawn_error(mut self, relpath: &str) -> Self {
        self.scripts.insert(relpath.to_string(), Script::SpawnError);
        self
    }

    /// The invocation for `relpath` never completes.
    pub fn hang(mut self, relpath: &str) -> Self {
        self.scripts.insert(relpath.to_string(), Script::Hang);
        self
    }

    /// A successful invocation for `relpath` creates `branches` in `inspector`.
    pub fn creates_branches(
        mut self,
        inspector: Arc<FakeInspector>,
        relpath: &str,
        branches: &[&str],
    ) -> Self {
        self.creates.push((
            inspector,
            relpath.to_string(),
            branches.iter().map(|b| b.to_string()).collect(),
        ));
        self
    }

    /// `(relpath, argv)` for every invocation, in order.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn invoked_projects(&self) -> Vec<String> {
        self.calls().into_iter().map(|(p, _)| p).collect()
    }
}

#[async_trait]
impl ActionInvoker for ScriptedInvoker {
    async fn run(
        &self,
        project: &Project,
        argv: &[String],
        capture_stderr: bool,
    ) -> Result<Invocation, ProjectError> {
        self.calls
            .lock()
            .unwrap()
            .push((project.relpath.clone(), argv.to_vec()));

        match self.scripts.get(&project.relpath).cloned() {
            Some(Script::Exit { code, stderr }) => Ok(Invocation {
                exit_code: code,
                stderr: if capture_stderr { stderr } else { String::new() },
            }),
            Some(Script::SpawnError) => {
                Err(ProjectError::Spawn("No such file or directory".to_string()))
            }
            Some(Script::Hang) => std::future::pending().await,
            None => {
                for (inspector, relpath, branches) in &self.creates {
                    if *relpath == project.relpath {
                        let names: Vec<&str> = branches.iter().map(String::as_str).collect();
                        inspector.add_branches(relpath, &names);
                    }
                }
                Ok(Invocation {
                    exit_code: 0,
                    stderr: String::new(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FakeSyncer
// ---------------------------------------------------------------------------

/// Records fetch/checkout calls; optionally fails or stalls a phase per project.
#[derive(Debug, Default)]
pub struct FakeSyncer {
    fail_fetch: HashSet<String>,
    fail_checkout: HashSet<String>,
    hang_fetch: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeSyncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_fetch(mut self, relpath: &str) -> Self {
        self.fail_fetch.insert(relpath.to_string());
        self
    }

    pub fn fail_checkout(mut self, relpath: &str) -> Self {
        self.fail_checkout.insert(relpath.to_string());
        self
    }

    /// The fetch for `relpath` never completes.
    pub fn hang_fetch(mut self, relpath: &str) -> Self {
        self.hang_fetch.insert(relpath.to_string());
        self
    }

    /// `"fetch <relpath> <rev>"` / `"checkout <relpath> <rev>"`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, relpath: &str) -> usize {
        let prefix = format!("fetch {relpath} ");
        self.calls()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }
}

#[async_trait]
impl ProjectSyncer for FakeSyncer {
    async fn fetch(&self, project: &Project, revision: &str) -> Result<(), MaterializationError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("fetch {} {}", project.relpath, revision));
        if self.hang_fetch.contains(&project.relpath) {
            std::future::pending::<()>().await;
        }
        if self.fail_fetch.contains(&project.relpath) {
            return Err(MaterializationError::Fetch {
                revision: revision.to_string(),
                reason: "could not read from remote repository".to_string(),
            });
        }
        Ok(())
    }

    async fn checkout(
        &self,
        project: &Project,
        revision: &str,
    ) -> Result<(), MaterializationError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("checkout {} {}", project.relpath, revision));
        if self.fail_checkout.contains(&project.relpath) {
            return Err(MaterializationError::Checkout {
                revision: revision.to_string(),
                reason: "local changes would be overwritten".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryOverlayStore
// ---------------------------------------------------------------------------

/// Keeps every saved overlay in memory.
#[derive(Debug, Default)]
pub struct MemoryOverlayStore {
    saves: Mutex<Vec<OverlayManifest>>,
}

impl MemoryOverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn last_saved(&self) -> Option<OverlayManifest> {
        self.saves.lock().unwrap().last().cloned()
    }
}

impl OverlayStore for MemoryOverlayStore {
    fn save(&self, overlay: &OverlayManifest) -> FleetResult<()> {
        self.saves.lock().unwrap().push(overlay.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Begin { title: String, total: usize },
    Header(String),
    Update,
    End,
    Error(String),
}

/// Captures everything the dispatcher reports.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn headers(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Header(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Error(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    pub fn begun(&self) -> Vec<(String, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Begin { title, total } => Some((title, total)),
                _ => None,
            })
            .collect()
    }

    pub fn update_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == ReportEvent::Update)
            .count()
    }

    pub fn end_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == ReportEvent::End)
            .count()
    }

    fn push(&self, event: ReportEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn begin(&self, title: &str, total: usize) {
        self.push(ReportEvent::Begin {
            title: title.to_string(),
            total,
        });
    }

    fn header(&self, text: &str) {
        self.push(ReportEvent::Header(text.to_string()));
    }

    fn update(&self) {
        self.push(ReportEvent::Update);
    }

    fn end(&self) {
        self.push(ReportEvent::End);
    }

    fn error(&self, text: &str) {
        self.push(ReportEvent::Error(text.to_string()));
    }
}
