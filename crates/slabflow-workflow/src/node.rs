use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Node identifier, unique within a workflow run.
pub type NodeId = String;

/// Lifecycle state of a task node.
///
/// `Pending -> Ready -> Running -> Completed | Failed`. Pending and Ready
/// nodes may also fail directly when an upstream node fails or the run is
/// cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
  Pending,
  Ready,
  Running,
  Completed,
  Failed(TaskError),
}

impl NodeState {
  pub fn name(&self) -> &'static str {
    match self {
      NodeState::Pending => "pending",
      NodeState::Ready => "ready",
      NodeState::Running => "running",
      NodeState::Completed => "completed",
      NodeState::Failed(_) => "failed",
    }
  }

  /// Completed or failed.
  pub fn is_terminal(&self) -> bool {
    matches!(self, NodeState::Completed | NodeState::Failed(_))
  }
}

impl fmt::Display for NodeState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NodeState::Failed(reason) => write!(f, "failed ({})", reason),
      other => f.write_str(other.name()),
    }
  }
}

/// A scheduled instance of an action inside a workflow graph.
///
/// Generic over the action handle so the graph stays independent of how
/// actions are executed.
#[derive(Debug, Clone)]
pub struct TaskNode<A> {
  pub(crate) id: NodeId,
  pub(crate) action: A,
  pub(crate) static_inputs: serde_json::Value,
  pub(crate) dependencies: BTreeSet<NodeId>,
  pub(crate) state: NodeState,
  pub(crate) spawned_by: Option<NodeId>,
  pub(crate) timeout_ms: Option<u64>,
  pub(crate) join_root: Option<NodeId>,
}

impl<A> TaskNode<A> {
  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn action(&self) -> &A {
    &self.action
  }

  /// Configuration captured when the node was created.
  pub fn static_inputs(&self) -> &serde_json::Value {
    &self.static_inputs
  }

  pub fn dependencies(&self) -> &BTreeSet<NodeId> {
    &self.dependencies
  }

  pub fn state(&self) -> &NodeState {
    &self.state
  }

  /// The node whose expansion created this one. `None` for seeded nodes.
  pub fn spawned_by(&self) -> Option<&str> {
    self.spawned_by.as_deref()
  }

  pub fn timeout_ms(&self) -> Option<u64> {
    self.timeout_ms
  }

  /// For aggregation nodes, the root whose whole subtree must finish first.
  pub fn join_root(&self) -> Option<&str> {
    self.join_root.as_deref()
  }

  pub fn is_join(&self) -> bool {
    self.join_root.is_some()
  }
}
