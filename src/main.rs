use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowstate_config::{WorkflowDef, load_graph};
use flowstate_graph::ResourceGraph;
use flowstate_scheduler::{Scheduler, SchedulerConfig};
use flowstate_store::{FsStateStore, SqliteStateStore, StateStore};

/// Flowstate - incremental runs of file and command workflows
#[derive(Parser)]
#[command(name = "flowstate")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Directory holding workflow state (default: ~/.flowstate)
  #[arg(long, global = true)]
  state_dir: Option<PathBuf>,

  /// State store backend
  #[arg(long, global = true, value_enum, default_value_t = Backend::File)]
  backend: Backend,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Bring a workflow up to date, applying only stale resources
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// Maximum number of resources applied concurrently (default: number of cores)
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Cancel the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Commit resources applied before a cancellation
    #[arg(long)]
    commit_on_cancel: bool,
  },

  /// Show what a run would do, without applying or committing anything
  Plan {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Show the recorded state of every resource of a workflow
  Status {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
  /// A single JSON document, replaced atomically on commit
  File,
  /// A SQLite database
  Sqlite,
}

fn main() -> Result<()> {
  let Cli {
    state_dir,
    backend,
    command,
  } = Cli::parse();
  init_logging();

  let state_dir = match state_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory, pass --state-dir")?
      .join(".flowstate"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  let succeeded = rt.block_on(async move {
    match command {
      Commands::Run {
        workflow_file,
        jobs,
        timeout_secs,
        commit_on_cancel,
      } => {
        let mut config = SchedulerConfig::default();
        if let Some(jobs) = jobs {
          config.max_parallel = jobs.max(1);
        }
        config.timeout = timeout_secs.map(Duration::from_secs);
        config.commit_on_cancel = commit_on_cancel;
        run_workflow(&workflow_file, &state_dir, backend, config).await
      }
      Commands::Plan { workflow_file } => {
        plan_workflow(&workflow_file, &state_dir, backend).await?;
        Ok(true)
      }
      Commands::Status { workflow_file } => {
        workflow_status(&workflow_file, &state_dir, backend).await?;
        Ok(true)
      }
    }
  })?;

  if !succeeded {
    std::process::exit(1);
  }
  Ok(())
}

fn init_logging() {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();
}

async fn run_workflow(
  workflow_file: &Path,
  state_dir: &Path,
  backend: Backend,
  config: SchedulerConfig,
) -> Result<bool> {
  let graph = load_workflow(workflow_file)?;
  let store = open_store(workflow_file, state_dir, backend).await?;
  let scheduler = Scheduler::new(graph, store, config);

  let cancel = CancellationToken::new();
  let interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling run");
      interrupt.cancel();
    }
  });

  let report = scheduler.run(cancel).await.context("workflow run failed")?;
  println!("{}", serde_json::to_string_pretty(&report)?);

  Ok(report.is_success())
}

async fn plan_workflow(workflow_file: &Path, state_dir: &Path, backend: Backend) -> Result<()> {
  let graph = load_workflow(workflow_file)?;
  let store = open_store(workflow_file, state_dir, backend).await?;
  let scheduler = Scheduler::new(graph, store, SchedulerConfig::default());

  let plan = scheduler.plan().await.context("failed to plan workflow")?;
  println!("{}", serde_json::to_string_pretty(&plan)?);
  Ok(())
}

async fn workflow_status(workflow_file: &Path, state_dir: &Path, backend: Backend) -> Result<()> {
  let graph = load_workflow(workflow_file)?;
  let store = open_store(workflow_file, state_dir, backend).await?;

  let mut output = serde_json::Map::new();
  for handle in graph.iter() {
    let record = store
      .get(handle.name())
      .await
      .with_context(|| format!("failed to read state of '{}'", handle.name()))?;
    output.insert(handle.name().to_string(), serde_json::to_value(record)?);
  }

  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

fn load_workflow(workflow_file: &Path) -> Result<ResourceGraph> {
  let def = WorkflowDef::from_path(workflow_file)
    .with_context(|| format!("failed to load workflow file: {}", workflow_file.display()))?;

  let base_dir = workflow_file
    .parent()
    .filter(|dir| !dir.as_os_str().is_empty())
    .unwrap_or(Path::new("."));
  let graph = load_graph(&def, base_dir)
    .with_context(|| format!("invalid workflow: {}", workflow_file.display()))?;

  info!(
    workflow = %workflow_file.display(),
    resources = graph.len(),
    root_directory = %graph.root_directory().display(),
    "workflow_loaded"
  );
  Ok(graph)
}

/// Open the state store of a workflow: `<state-dir>/<file stem>.state.{json,db}`.
async fn open_store(
  workflow_file: &Path,
  state_dir: &Path,
  backend: Backend,
) -> Result<Arc<dyn StateStore>> {
  let stem = workflow_file
    .file_stem()
    .and_then(|stem| stem.to_str())
    .with_context(|| format!("invalid workflow file name: {}", workflow_file.display()))?;

  let store: Arc<dyn StateStore> = match backend {
    Backend::File => {
      let path = state_dir.join(format!("{}.state.json", stem));
      Arc::new(
        FsStateStore::open(&path)
          .await
          .with_context(|| format!("failed to open state file: {}", path.display()))?,
      )
    }
    Backend::Sqlite => {
      tokio::fs::create_dir_all(state_dir)
        .await
        .with_context(|| format!("failed to create state directory: {}", state_dir.display()))?;
      let path = state_dir.join(format!("{}.state.db", stem));
      Arc::new(
        SqliteStateStore::connect(&path)
          .await
          .with_context(|| format!("failed to open state database: {}", path.display()))?,
      )
    }
  };
  Ok(store)
}
