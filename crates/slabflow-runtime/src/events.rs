//! Execution events and notifiers for observability.
//!
//! Events are emitted while a run progresses so consumers can persist state,
//! stream progress, or assert on ordering in tests.

use serde::{Deserialize, Serialize};
use slabflow_workflow::{NodeId, TaskError};
use tokio::sync::mpsc;

use crate::report::RunStatus;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// Workflow execution has started.
  WorkflowStarted { execution_id: String, nodes: usize },

  /// A node's dependencies are satisfied and it can be dispatched.
  NodeReady { execution_id: String, node_id: NodeId },

  /// A node has been dispatched to a worker.
  NodeStarted { execution_id: String, node_id: NodeId },

  /// A node's action added nodes to the graph.
  GraphExpanded {
    execution_id: String,
    node_id: NodeId,
    added: Vec<NodeId>,
  },

  /// A node has completed successfully.
  NodeCompleted {
    execution_id: String,
    node_id: NodeId,
    data: serde_json::Value,
  },

  /// A node has failed, either itself or through an upstream failure.
  NodeFailed {
    execution_id: String,
    node_id: NodeId,
    error: TaskError,
  },

  /// No node is left to run.
  WorkflowCompleted {
    execution_id: String,
    status: RunStatus,
  },

  /// The run was aborted by a fatal error or cancellation.
  WorkflowFailed { execution_id: String, error: String },
}

/// Trait for receiving execution events.
///
/// The runtime calls `notify` for each event. Implementations must not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that forwards events to an unbounded channel.
///
/// Unbounded so a slow consumer never holds up scheduling; volume is a few
/// events per node.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
