use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use slabflow_adsorption::process::{CommandGenerator, CommandLine, CommandSimulator};
use slabflow_adsorption::{Collaborators, adsorption_workflow};
use slabflow_config::{AdsorptionRequest, TIMEOUT_MS};
use slabflow_runtime::{RunReport, RunStatus, WorkflowRuntime};
use slabflow_store::open_sink;

/// Slabflow - dynamic adsorption workflows over external simulation codes
#[derive(Parser)]
#[command(name = "slabflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.slabflow)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run an adsorption workflow
  Run {
    /// Path to the request file (JSON)
    request_file: PathBuf,

    /// Command that runs one simulation (JSON on stdin and stdout)
    #[arg(long)]
    simulator: String,

    /// Command that generates slabs and adsorbate placements
    #[arg(long)]
    generator: String,

    /// Maximum simulations running at once (overrides the request options)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-task timeout in milliseconds (overrides the request options)
    #[arg(long)]
    timeout_ms: Option<u64>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".slabflow"),
  };

  match cli.command {
    Some(Commands::Run {
      request_file,
      simulator,
      generator,
      concurrency,
      timeout_ms,
    }) => {
      let args = RunArgs {
        request_file,
        simulator,
        generator,
        concurrency,
        timeout_ms,
      };
      let rt = tokio::runtime::Runtime::new()?;
      let report = rt.block_on(run_workflow(args, &data_dir))?;
      if report.status == RunStatus::Failed {
        bail!("workflow {} failed", report.execution_id);
      }
    }
    None => {
      println!("slabflow - use --help to see available commands");
    }
  }

  Ok(())
}

struct RunArgs {
  request_file: PathBuf,
  simulator: String,
  generator: String,
  concurrency: Option<usize>,
  timeout_ms: Option<u64>,
}

async fn run_workflow(args: RunArgs, data_dir: &Path) -> Result<RunReport> {
  let content = tokio::fs::read_to_string(&args.request_file)
    .await
    .with_context(|| format!("failed to read request file: {}", args.request_file.display()))?;
  let mut request: AdsorptionRequest = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse request file: {}", args.request_file.display()))?;

  if let Some(ms) = args.timeout_ms {
    request.options.set(TIMEOUT_MS, ms);
  }

  let simulator = CommandLine::parse(&args.simulator).context("invalid --simulator command")?;
  let generator = CommandLine::parse(&args.generator).context("invalid --generator command")?;
  let sink = open_sink(&request.sink, &request.name)
    .await
    .context("failed to open result sink")?;
  let collaborators = Collaborators::new(
    Arc::new(CommandGenerator::new(generator)),
    Arc::new(CommandSimulator::new(simulator)),
    sink,
  );

  let mut workflow =
    adsorption_workflow(&request, collaborators).context("failed to build workflow")?;
  if let Some(limit) = args.concurrency {
    workflow.runtime_config.max_concurrency = limit;
  }

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling run");
      on_interrupt.cancel();
    }
  });

  let runtime = WorkflowRuntime::new(workflow.runtime_config);
  let report = runtime
    .execute_workflow(workflow.graph, cancel)
    .wait()
    .await
    .with_context(|| format!("workflow '{}' aborted", workflow.name))?;

  let rendered = serde_json::to_string_pretty(&report)?;
  save_report(data_dir, &report.execution_id, &rendered).await?;
  println!("{}", rendered);

  Ok(report)
}

/// Keep a copy of every run report under `<data_dir>/runs`.
async fn save_report(data_dir: &Path, execution_id: &str, rendered: &str) -> Result<()> {
  let runs_dir = data_dir.join("runs");
  tokio::fs::create_dir_all(&runs_dir)
    .await
    .with_context(|| format!("failed to create {}", runs_dir.display()))?;

  let path = runs_dir.join(format!("{}.json", execution_id));
  tokio::fs::write(&path, rendered)
    .await
    .with_context(|| format!("failed to write run report: {}", path.display()))?;

  info!(path = %path.display(), "run_report_saved");
  Ok(())
}
