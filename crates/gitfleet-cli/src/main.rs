//! gitfleet - batch git operations across a multi-repository workspace
//!
//! ## Commands
//!
//! - `flow`: run a `git flow` verb in every flow-enabled project
//! - `push`: push the checked-out branch of the named projects
//! - `pull`: merge the tracked branch into the named projects

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, Level};

use gitfleet_core::{
    init_tracing, BatchDispatcher, ConsoleReporter, FlowCommand, FlowVerb, GitCli, Operation,
    OverlaySession, ProjectDirectory, UsageError, Workspace, EXIT_FAILURE, EXIT_OK, FLOW_HELP,
};

#[derive(Parser)]
#[command(name = "gitfleet")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run git operations across every project of a workspace", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Workspace root (contains .gitfleet/manifest.json)
    #[arg(
        short = 'C',
        long,
        global = true,
        env = "GITFLEET_WORKSPACE",
        default_value = "."
    )]
    workspace: PathBuf,

    /// git executable to run
    #[arg(long, global = true, env = "GITFLEET_GIT", default_value = "git")]
    git: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform git flow commands for all flow enabled projects
    ///
    /// Equivalent to running `git flow <command> <arguments>` in each project
    /// that has a flow configuration, directly or through its remote.
    Flow {
        /// Flow subcommand followed by its arguments, passed through unmodified
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
        args: Vec<String>,
    },

    /// Push local branches to their remotes
    ///
    /// Projects that do not have a branch checked out are skipped.
    Push {
        /// Push in all projects
        #[arg(long)]
        all: bool,

        /// Projects to push (by path)
        #[arg(conflicts_with = "all")]
        projects: Vec<String>,
    },

    /// Merge the tracked branch from the remote into each project
    Pull {
        /// Projects to pull (by path); all projects when omitted
        projects: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_tracing(cli.json, level);

    let code = match cli.command {
        Commands::Flow { args } => cmd_flow(&cli.workspace, &cli.git, &args).await?,
        Commands::Push { all, projects } => {
            cmd_push(&cli.workspace, &cli.git, all, projects).await?
        }
        Commands::Pull { projects } => {
            run_batch(&cli.workspace, &cli.git, Operation::Pull, projects).await?
        }
    };

    Ok(ExitCode::from(code as u8))
}

/// Parse the flow verb before touching the workspace.
async fn cmd_flow(workspace: &Path, git: &Path, args: &[String]) -> Result<i32> {
    let cmd = match FlowCommand::parse(args) {
        Ok(cmd) => cmd,
        Err(err) => return Ok(usage_error(&err)),
    };

    if cmd.verb == FlowVerb::Help {
        print!("{FLOW_HELP}");
        return Ok(EXIT_OK);
    }

    run_batch(workspace, git, Operation::Flow(cmd), Vec::new()).await
}

async fn cmd_push(workspace: &Path, git: &Path, all: bool, projects: Vec<String>) -> Result<i32> {
    if let Err(err) = push_selection(all, &projects) {
        return Ok(usage_error(&err));
    }
    run_batch(workspace, git, Operation::Push, projects).await
}

/// Without `--all`, push needs at least one named project.
fn push_selection(all: bool, projects: &[String]) -> Result<(), UsageError> {
    if !all && projects.is_empty() {
        return Err(UsageError::NoProjects);
    }
    Ok(())
}

fn usage_error(err: &UsageError) -> i32 {
    eprintln!("gitfleet: {err}");
    EXIT_FAILURE
}

async fn run_batch(
    root: &Path,
    git_program: &Path,
    operation: Operation,
    names: Vec<String>,
) -> Result<i32> {
    let mut workspace = Workspace::open(root)
        .with_context(|| format!("Failed to open workspace at {}", root.display()))?;

    let projects = workspace
        .resolve(&names, workspace.is_overlay())
        .context("Failed to resolve projects")?;
    debug!(count = projects.len(), operation = operation.name(), "resolved projects");

    let git = GitCli::new(git_program);
    let reporter = ConsoleReporter::new();
    let store = workspace.overlay_store();
    let policy = operation.failure_policy();

    let mut dispatcher = BatchDispatcher::new(&git, &git, &reporter);
    if let Some(overlay) = workspace.overlay.as_mut() {
        dispatcher = dispatcher.with_overlay(OverlaySession::new(overlay, &store), &git);
    }

    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let result = dispatcher
        .run(&operation, policy, projects, interrupt)
        .await
        .context("Batch run failed")?;

    Ok(result.exit_code())
}
