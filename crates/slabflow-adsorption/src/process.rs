//! Collaborators backed by external programs.
//!
//! Each call launches the configured command, writes one JSON request to its
//! stdin and reads one JSON response from stdout. The child is killed if the
//! calling task is dropped (timeout or cancellation).

use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::collaborators::{SimulationExecutor, StructureGenerator};
use crate::error::{GenerationError, ProcessError, SimulationError};
use crate::models::{
  GeneratedStructure, SimulationDocument, SimulationRequest, SlabParams, Structure,
};

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
  program: String,
  args: Vec<String>,
}

impl CommandLine {
  /// Split a command line on whitespace.
  pub fn parse(line: &str) -> Result<Self, ProcessError> {
    let mut parts = line.split_whitespace().map(String::from);
    let program = parts.next().ok_or(ProcessError::EmptyCommand)?;
    Ok(Self {
      program,
      args: parts.collect(),
    })
  }

  pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self {
      program: program.into(),
      args: args.into_iter().map(Into::into).collect(),
    }
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  /// Run the command with `request` on stdin and decode its stdout.
  pub async fn call<Req, Resp>(&self, request: &Req) -> Result<Resp, ProcessError>
  where
    Req: Serialize + Sync,
    Resp: DeserializeOwned,
  {
    let json_error = |source| ProcessError::Json {
      program: self.program.clone(),
      source,
    };
    let input = serde_json::to_vec(request).map_err(json_error)?;
    let launch_error = |source| ProcessError::Launch {
      program: self.program.clone(),
      source,
    };

    let mut child = Command::new(&self.program)
      .args(&self.args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(launch_error)?;

    if let Some(mut stdin) = child.stdin.take() {
      stdin.write_all(&input).await.map_err(launch_error)?;
    }

    let output = child.wait_with_output().await.map_err(launch_error)?;
    debug!(
      program = %self.program,
      status = ?output.status.code(),
      "collaborator_exited"
    );

    if !output.status.success() {
      return Err(ProcessError::Exit {
        program: self.program.clone(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    serde_json::from_slice(&output.stdout).map_err(json_error)
  }
}

/// Runs simulations through an external program.
///
/// stdin: a [`SimulationRequest`]; stdout: a [`SimulationDocument`].
#[derive(Debug, Clone)]
pub struct CommandSimulator {
  command: CommandLine,
}

impl CommandSimulator {
  pub fn new(command: CommandLine) -> Self {
    Self { command }
  }
}

#[async_trait]
impl SimulationExecutor for CommandSimulator {
  async fn run(&self, request: SimulationRequest) -> Result<SimulationDocument, SimulationError> {
    Ok(self.command.call(&request).await?)
  }
}

/// The request written to a generator program.
#[derive(Debug, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
enum GeneratorRequest<'a> {
  Slabs {
    structure: &'a Structure,
    params: &'a SlabParams,
  },
  AdsorbatePlacements {
    slab: &'a Structure,
    molecule: &'a serde_json::Value,
  },
}

/// Generates structures through an external program.
///
/// stdin: `{"operation": "slabs" | "adsorbate_placements", ...}`;
/// stdout: a list of `{"tag", "structure"}` objects.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
  command: CommandLine,
}

impl CommandGenerator {
  pub fn new(command: CommandLine) -> Self {
    Self { command }
  }
}

#[async_trait]
impl StructureGenerator for CommandGenerator {
  async fn slabs(
    &self,
    bulk: &Structure,
    params: &SlabParams,
  ) -> Result<Vec<GeneratedStructure>, GenerationError> {
    let request = GeneratorRequest::Slabs {
      structure: bulk,
      params,
    };
    Ok(self.command.call(&request).await?)
  }

  async fn adsorbate_placements(
    &self,
    slab: &Structure,
    molecule: &serde_json::Value,
  ) -> Result<Vec<GeneratedStructure>, GenerationError> {
    let request = GeneratorRequest::AdsorbatePlacements { slab, molecule };
    Ok(self.command.call(&request).await?)
  }
}
