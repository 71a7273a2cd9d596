//! Run reports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slabflow_workflow::{NodeId, NodeState, TaskError, WorkflowGraph};

/// Overall outcome of a run that reached the end of scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  /// Every node completed.
  Completed,
  /// Aggregation ran but some branches failed.
  PartiallyFailed,
  /// Aggregation never ran, or nothing succeeded.
  Failed,
}

impl RunStatus {
  /// Derive the status from a graph in which every node is terminal.
  ///
  /// With aggregation nodes present, their outcome decides between `Failed`
  /// and the other two. Without them, the run is `Failed` only if every node
  /// failed.
  pub fn of<A>(graph: &WorkflowGraph<A>) -> Self {
    let any_failed = graph.nodes().any(|n| matches!(n.state(), NodeState::Failed(_)));
    if !any_failed {
      return RunStatus::Completed;
    }

    let mut joins = graph.join_nodes().peekable();
    if joins.peek().is_some() {
      if joins.all(|n| *n.state() == NodeState::Completed) {
        RunStatus::PartiallyFailed
      } else {
        RunStatus::Failed
      }
    } else if graph.nodes().all(|n| matches!(n.state(), NodeState::Failed(_))) {
      RunStatus::Failed
    } else {
      RunStatus::PartiallyFailed
    }
  }
}

/// Per-node entry in a run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
  pub state: NodeState,
  pub spawned_by: Option<NodeId>,
  pub dependencies: Vec<NodeId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub join_root: Option<NodeId>,
}

/// Result of a finished workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
  /// Unique execution ID.
  pub execution_id: String,
  pub status: RunStatus,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub nodes: BTreeMap<NodeId, NodeSummary>,
  /// Result payloads of completed nodes, keyed by node id.
  pub results: BTreeMap<NodeId, serde_json::Value>,
  /// Failure reason of every failed node.
  pub failed: BTreeMap<NodeId, TaskError>,
}

impl RunReport {
  pub fn from_graph<A>(
    execution_id: impl Into<String>,
    started_at: DateTime<Utc>,
    graph: &WorkflowGraph<A>,
  ) -> Self {
    let nodes = graph
      .nodes()
      .map(|n| {
        let summary = NodeSummary {
          state: n.state().clone(),
          spawned_by: n.spawned_by().map(String::from),
          dependencies: n.dependencies().iter().cloned().collect(),
          join_root: n.join_root().map(String::from),
        };
        (n.id().to_string(), summary)
      })
      .collect();

    let failed = graph
      .nodes()
      .filter_map(|n| match n.state() {
        NodeState::Failed(reason) => Some((n.id().to_string(), reason.clone())),
        _ => None,
      })
      .collect();

    let results = graph
      .results()
      .iter()
      .map(|(id, payload)| (id.to_string(), payload.clone()))
      .collect();

    Self {
      execution_id: execution_id.into(),
      status: RunStatus::of(graph),
      started_at,
      finished_at: Utc::now(),
      nodes,
      results,
      failed,
    }
  }

  pub fn result(&self, node_id: &str) -> Option<&serde_json::Value> {
    self.results.get(node_id)
  }

  pub fn state(&self, node_id: &str) -> Option<&NodeState> {
    self.nodes.get(node_id).map(|n| &n.state)
  }
}
