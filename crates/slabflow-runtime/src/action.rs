//! Task actions and the context they run with.

use std::sync::Arc;

use async_trait::async_trait;
use slabflow_workflow::{
  GraphDelta, NodeId, NodeSpec, ResultStore, StoreError, SubtreeOutcome, TaskError, WorkflowGraph,
};

/// Shared handle to an action, as stored in graph nodes.
pub type ActionRef = Arc<dyn TaskAction>;

/// The graph type executed by the runtime.
pub type RuntimeGraph = WorkflowGraph<ActionRef>;

/// A delta returned by an expanding action.
pub type RuntimeDelta = GraphDelta<ActionRef>;

pub type RuntimeNodeSpec = NodeSpec<ActionRef>;

/// A unit of work executed for one node.
///
/// Actions see only their static inputs and a snapshot of the result store
/// taken at dispatch time. They never touch the live graph: growth happens by
/// returning [`ActionOutcome::Expanding`].
#[async_trait]
pub trait TaskAction: Send + Sync {
  /// Short name used in logs.
  fn name(&self) -> &str;

  async fn run(&self, ctx: TaskContext) -> Result<ActionOutcome, TaskError>;
}

/// What a finished action hands back to the scheduler.
pub enum ActionOutcome {
  /// A result payload only.
  Terminal(serde_json::Value),
  /// A result payload plus new nodes to merge before dependents are released.
  Expanding {
    result: serde_json::Value,
    delta: RuntimeDelta,
  },
}

impl ActionOutcome {
  pub fn terminal(result: serde_json::Value) -> Self {
    ActionOutcome::Terminal(result)
  }

  pub fn expanding(result: serde_json::Value, delta: RuntimeDelta) -> Self {
    ActionOutcome::Expanding { result, delta }
  }
}

/// Inputs for one action invocation.
#[derive(Debug, Clone)]
pub struct TaskContext {
  pub execution_id: String,
  pub node_id: NodeId,
  /// Configuration captured when the node was created.
  pub static_inputs: serde_json::Value,
  /// Results of every node completed before this one was dispatched.
  pub results: ResultStore,
  /// For aggregation nodes, the final outcome of the root's subtree.
  pub subtree: Option<SubtreeOutcome>,
}

impl TaskContext {
  /// Result of a completed node.
  pub fn result(&self, node_id: &str) -> Result<&serde_json::Value, StoreError> {
    self.results.get(node_id)
  }

  /// Look up a static input by key.
  pub fn input(&self, key: &str) -> Option<&serde_json::Value> {
    self.static_inputs.get(key)
  }
}
