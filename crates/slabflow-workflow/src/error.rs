use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::NodeId;

/// Structural errors in the task graph.
///
/// These indicate an invalid expansion or a scheduler bug and are always
/// fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("delta would create a cycle through node '{node_id}'")]
  CycleDetected { node_id: NodeId },

  #[error("node '{node_id}' depends on unknown node '{dependency}'")]
  UnknownDependency { node_id: NodeId, dependency: NodeId },

  #[error("node id '{node_id}' already exists")]
  NodeIdCollision { node_id: NodeId },

  #[error("node '{node_id}' not found")]
  NodeNotFound { node_id: NodeId },

  #[error("cannot add a dependency to node '{node_id}' in state {state}")]
  FrozenDependent { node_id: NodeId, state: &'static str },

  #[error("node '{node_id}' cannot move from {from} to {to}")]
  InvalidTransition {
    node_id: NodeId,
    from: &'static str,
    to: &'static str,
  },
}

/// Result store errors. Both indicate a scheduler defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  #[error("result for node '{node_id}' was already written")]
  DuplicateWrite { node_id: NodeId },

  #[error("no result for node '{node_id}'")]
  NotFound { node_id: NodeId },
}

/// Errors from graph operations that also touch the result store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Why a single task failed.
///
/// Scoped to one node: dependents are failed with `UpstreamFailure`, sibling
/// subtrees keep running.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
  #[error("simulation failed: {message}")]
  Simulation { message: String },

  #[error("validation failed: {message}")]
  Validation { message: String },

  #[error("structure generation failed: {message}")]
  Generation { message: String },

  #[error("result sink failed: {message}")]
  Sink { message: String },

  #[error("task timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  #[error("task cancelled")]
  Cancelled,

  #[error("task panicked: {message}")]
  Panicked { message: String },

  #[error("run aborted: {reason}")]
  Aborted { reason: String },

  #[error("upstream node '{upstream}' failed")]
  UpstreamFailure { upstream: NodeId },
}

impl TaskError {
  pub fn simulation(message: impl Into<String>) -> Self {
    TaskError::Simulation {
      message: message.into(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    TaskError::Validation {
      message: message.into(),
    }
  }

  pub fn generation(message: impl Into<String>) -> Self {
    TaskError::Generation {
      message: message.into(),
    }
  }

  pub fn sink(message: impl Into<String>) -> Self {
    TaskError::Sink {
      message: message.into(),
    }
  }
}
