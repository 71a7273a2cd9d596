//! Runtime errors.

use slabflow_workflow::{GraphError, StoreError, WorkflowError};

/// Errors that abort a whole workflow run.
///
/// Failures of individual tasks are not errors at this level; they are
/// recorded on the node and show up in the run report.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// A task returned a structurally invalid graph delta.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// The result store rejected a write or read.
  #[error(transparent)]
  Store(#[from] StoreError),

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,

  /// Nodes remain unfinished but none is ready or running.
  #[error("workflow stalled with {unfinished} unfinished nodes and nothing runnable")]
  Stalled { unfinished: usize },

  /// A worker finished that the executor has no node for.
  #[error("task join error: {message}")]
  TaskJoin { message: String },
}

impl From<WorkflowError> for RuntimeError {
  fn from(err: WorkflowError) -> Self {
    match err {
      WorkflowError::Graph(e) => RuntimeError::Graph(e),
      WorkflowError::Store(e) => RuntimeError::Store(e),
    }
  }
}
