use slabflow_workflow::{GraphError, TaskError};
use thiserror::Error;

/// Failure running an external program that speaks JSON over stdio.
#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to launch '{program}': {source}")]
  Launch {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("'{program}' exited with status {code:?}: {stderr}")]
  Exit {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("invalid JSON exchanged with '{program}': {source}")]
  Json {
    program: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("empty command line")]
  EmptyCommand,
}

#[derive(Debug, Error)]
pub enum SimulationError {
  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error("{0}")]
  Failed(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error("{0}")]
  Failed(String),
}

impl From<SimulationError> for TaskError {
  fn from(err: SimulationError) -> Self {
    TaskError::simulation(err.to_string())
  }
}

impl From<GenerationError> for TaskError {
  fn from(err: GenerationError) -> Self {
    TaskError::generation(err.to_string())
  }
}

#[derive(Debug, Error)]
#[error("invalid miller index key '{key}': expected a non-empty string of digits")]
pub struct MillerIndexError {
  pub key: String,
}

/// Errors building the initial adsorption graph from a request.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  MillerIndex(#[from] MillerIndexError),

  #[error("adsorption config is empty")]
  EmptyConfig,

  #[error("adsorbate '{name}' is listed more than once for miller index '{key}'")]
  DuplicateAdsorbate { key: String, name: String },

  #[error(transparent)]
  Graph(#[from] GraphError),
}
