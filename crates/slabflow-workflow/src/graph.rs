//! The mutable task graph of one workflow run.
//!
//! Nodes live in an arena indexed by position; edges are stored as index
//! lists in both directions. The graph only ever grows: deltas add nodes and
//! edges, nothing is removed or retargeted once a node has started.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::delta::GraphDelta;
use crate::error::{GraphError, StoreError, TaskError, WorkflowError};
use crate::node::{NodeId, NodeState, TaskNode};
use crate::store::ResultStore;

/// Nodes whose state changed as a side effect of a graph operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateChanges {
  /// Nodes that moved to `Ready`.
  pub ready: Vec<NodeId>,
  /// Nodes that moved to `Failed`, with the reason.
  pub failed: Vec<(NodeId, TaskError)>,
}

impl StateChanges {
  pub fn is_empty(&self) -> bool {
    self.ready.is_empty() && self.failed.is_empty()
  }
}

/// Terminal outcome of every node in a root's subtree.
///
/// Aggregation nodes over the same root are not part of the subtree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtreeOutcome {
  pub completed: Vec<NodeId>,
  pub failed: Vec<(NodeId, TaskError)>,
}

/// Dynamic DAG of task nodes plus the run's result store.
#[derive(Debug, Clone)]
pub struct WorkflowGraph<A> {
  nodes: Vec<TaskNode<A>>,
  index: HashMap<NodeId, usize>,
  /// node -> nodes it depends on.
  upstream: Vec<Vec<usize>>,
  /// node -> nodes that depend on it.
  downstream: Vec<Vec<usize>>,
  /// node -> nodes created by its expansion.
  spawned: Vec<Vec<usize>>,
  joins: Vec<usize>,
  results: ResultStore,
}

impl<A> Default for WorkflowGraph<A> {
  fn default() -> Self {
    Self {
      nodes: Vec::new(),
      index: HashMap::new(),
      upstream: Vec::new(),
      downstream: Vec::new(),
      spawned: Vec::new(),
      joins: Vec::new(),
      results: ResultStore::new(),
    }
  }
}

impl<A> WorkflowGraph<A> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a graph from an initial set of nodes (no origin).
  pub fn seeded(delta: GraphDelta<A>) -> Result<Self, GraphError> {
    let mut graph = Self::new();
    graph.insert_delta(None, delta)?;
    Ok(graph)
  }

  /// Atomically merge a delta produced by `origin`.
  ///
  /// Either the whole delta is applied or the graph is left untouched. New
  /// nodes start `Pending`; those whose dependencies are already complete
  /// move to `Ready` before this returns.
  pub fn insert_delta(
    &mut self,
    origin: Option<&str>,
    delta: GraphDelta<A>,
  ) -> Result<StateChanges, GraphError> {
    let origin_idx = origin.map(|id| self.lookup(id)).transpose()?;
    let base = self.nodes.len();

    let mut new_index: HashMap<NodeId, usize> = HashMap::with_capacity(delta.nodes.len());
    for (offset, spec) in delta.nodes.iter().enumerate() {
      if self.index.contains_key(&spec.id) || new_index.contains_key(&spec.id) {
        return Err(GraphError::NodeIdCollision {
          node_id: spec.id.clone(),
        });
      }
      new_index.insert(spec.id.clone(), base + offset);
    }

    let resolve = |id: &str| {
      self
        .index
        .get(id)
        .or_else(|| new_index.get(id))
        .copied()
    };

    let mut edges: Vec<(usize, usize)> = Vec::new();
    for spec in &delta.nodes {
      let to = new_index[&spec.id];
      for dependency in &spec.dependencies {
        let from = resolve(dependency).ok_or_else(|| GraphError::UnknownDependency {
          node_id: spec.id.clone(),
          dependency: dependency.clone(),
        })?;
        edges.push((from, to));
      }
      if let Some(root) = &spec.join_root {
        resolve(root).ok_or_else(|| GraphError::UnknownDependency {
          node_id: spec.id.clone(),
          dependency: root.clone(),
        })?;
      }
    }

    for (dependency, dependent) in &delta.edges {
      let to = resolve(dependent).ok_or_else(|| GraphError::NodeNotFound {
        node_id: dependent.clone(),
      })?;
      let from = resolve(dependency).ok_or_else(|| GraphError::UnknownDependency {
        node_id: dependent.clone(),
        dependency: dependency.clone(),
      })?;
      if to < base {
        let state = &self.nodes[to].state;
        if !matches!(state, NodeState::Pending | NodeState::Ready) {
          return Err(GraphError::FrozenDependent {
            node_id: dependent.clone(),
            state: state.name(),
          });
        }
        if self.upstream[to].contains(&from) {
          continue;
        }
      }
      edges.push((from, to));
    }

    edges.sort_unstable();
    edges.dedup();

    let new_ids: Vec<&str> = delta.nodes.iter().map(|spec| spec.id.as_str()).collect();
    self.check_acyclic(&new_ids, &edges)?;

    // Validation is done; from here on nothing can fail.
    let origin_id = origin_idx.map(|idx| self.nodes[idx].id.clone());
    let mut touched: Vec<usize> = Vec::with_capacity(delta.nodes.len());
    for spec in delta.nodes {
      let idx = self.nodes.len();
      if spec.join_root.is_some() {
        self.joins.push(idx);
      }
      if let Some(origin_idx) = origin_idx {
        self.spawned[origin_idx].push(idx);
      }
      self.index.insert(spec.id.clone(), idx);
      self.nodes.push(TaskNode {
        id: spec.id,
        action: spec.action,
        static_inputs: spec.static_inputs,
        dependencies: BTreeSet::new(),
        state: NodeState::Pending,
        spawned_by: origin_id.clone(),
        timeout_ms: spec.timeout_ms,
        join_root: spec.join_root,
      });
      self.upstream.push(Vec::new());
      self.downstream.push(Vec::new());
      self.spawned.push(Vec::new());
      touched.push(idx);
    }

    for (from, to) in edges {
      self.upstream[to].push(from);
      self.downstream[from].push(to);
      let dependency = self.nodes[from].id.clone();
      self.nodes[to].dependencies.insert(dependency);
      if to < base && !touched.contains(&to) {
        touched.push(to);
      }
    }

    let mut changes = StateChanges::default();
    for idx in touched {
      self.evaluate(idx, &mut changes);
    }
    self.refresh_joins(&mut changes);
    Ok(changes)
  }

  /// Move a `Ready` node to `Running`.
  pub fn start(&mut self, node_id: &str) -> Result<(), GraphError> {
    let idx = self.lookup(node_id)?;
    let node = &mut self.nodes[idx];
    if node.state != NodeState::Ready {
      return Err(GraphError::InvalidTransition {
        node_id: node_id.to_string(),
        from: node.state.name(),
        to: "running",
      });
    }
    node.state = NodeState::Running;
    Ok(())
  }

  /// Record a node's result and release its dependents.
  ///
  /// The result write and the `Running -> Completed` transition happen
  /// together. A second completion of the same node is rejected with
  /// `DuplicateWrite` and changes nothing.
  pub fn mark_completed(
    &mut self,
    node_id: &str,
    result: serde_json::Value,
  ) -> Result<StateChanges, WorkflowError> {
    let idx = self.lookup(node_id)?;
    match &self.nodes[idx].state {
      NodeState::Running => {}
      _ if self.results.contains(node_id) => {
        return Err(
          StoreError::DuplicateWrite {
            node_id: node_id.to_string(),
          }
          .into(),
        );
      }
      other => {
        return Err(
          GraphError::InvalidTransition {
            node_id: node_id.to_string(),
            from: other.name(),
            to: "completed",
          }
          .into(),
        );
      }
    }

    self.results.put(node_id, result)?;
    self.nodes[idx].state = NodeState::Completed;

    let mut changes = StateChanges::default();
    for dependent in self.downstream[idx].clone() {
      self.evaluate(dependent, &mut changes);
    }
    self.refresh_joins(&mut changes);
    Ok(changes)
  }

  /// Fail a node that has not finished and propagate to its dependents.
  pub fn mark_failed(&mut self, node_id: &str, error: TaskError) -> Result<StateChanges, GraphError> {
    let idx = self.lookup(node_id)?;
    let state = &self.nodes[idx].state;
    if state.is_terminal() {
      return Err(GraphError::InvalidTransition {
        node_id: node_id.to_string(),
        from: state.name(),
        to: "failed",
      });
    }

    let mut changes = StateChanges::default();
    self.fail_node(idx, error, &mut changes);
    self.refresh_joins(&mut changes);
    Ok(changes)
  }

  /// Fail every node that has not finished with `Cancelled`.
  pub fn cancel(&mut self) -> StateChanges {
    self.abort(TaskError::Cancelled)
  }

  /// Fail every node that has not finished with `reason`.
  ///
  /// Leaves nothing schedulable; used when the run stops early.
  pub fn abort(&mut self, reason: TaskError) -> StateChanges {
    let mut changes = StateChanges::default();
    for node in self.nodes.iter_mut().filter(|n| !n.state.is_terminal()) {
      node.state = NodeState::Failed(reason.clone());
      changes.failed.push((node.id.clone(), reason.clone()));
    }
    changes
  }

  /// Every node transitively reachable from `node_id` through dependency
  /// edges or expansion (`spawned_by`) links.
  pub fn descendants_of(&self, node_id: &str) -> Result<BTreeSet<NodeId>, GraphError> {
    let idx = self.lookup(node_id)?;
    Ok(
      self
        .reachable(idx, |_| false)
        .into_iter()
        .map(|i| self.nodes[i].id.clone())
        .collect(),
    )
  }

  /// Whether every node spawned under `join`'s root has finished.
  ///
  /// Holds only when the root has completed, every node currently reachable
  /// from it is terminal, and no unfinished node anywhere traces its
  /// `spawned_by` chain back to the root.
  pub fn is_frontier_closed(&self, join_id: &str) -> Result<bool, GraphError> {
    let idx = self.lookup(join_id)?;
    Ok(self.frontier_closed(idx))
  }

  /// Completed and failed nodes under `root`, excluding aggregations over it.
  pub fn subtree_outcome(&self, root: &str) -> Result<SubtreeOutcome, GraphError> {
    let root_idx = self.lookup(root)?;
    let mut outcome = SubtreeOutcome::default();
    for idx in self.subtree(root_idx) {
      let node = &self.nodes[idx];
      match &node.state {
        NodeState::Completed => outcome.completed.push(node.id.clone()),
        NodeState::Failed(reason) => outcome.failed.push((node.id.clone(), reason.clone())),
        _ => {}
      }
    }
    outcome.completed.sort();
    outcome.failed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(outcome)
  }

  /// Ids of nodes currently `Ready`, in insertion order.
  pub fn ready_nodes(&self) -> Vec<NodeId> {
    self
      .nodes
      .iter()
      .filter(|n| n.state == NodeState::Ready)
      .map(|n| n.id.clone())
      .collect()
  }

  /// True when no node is pending, ready or running.
  pub fn is_finished(&self) -> bool {
    self.nodes.iter().all(|n| n.state.is_terminal())
  }

  pub fn node(&self, node_id: &str) -> Option<&TaskNode<A>> {
    self.index.get(node_id).map(|&idx| &self.nodes[idx])
  }

  pub fn state(&self, node_id: &str) -> Option<&NodeState> {
    self.node(node_id).map(|n| &n.state)
  }

  pub fn nodes(&self) -> impl Iterator<Item = &TaskNode<A>> {
    self.nodes.iter()
  }

  /// Aggregation nodes, in insertion order.
  pub fn join_nodes(&self) -> impl Iterator<Item = &TaskNode<A>> {
    self.joins.iter().map(|&idx| &self.nodes[idx])
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn contains(&self, node_id: &str) -> bool {
    self.index.contains_key(node_id)
  }

  pub fn results(&self) -> &ResultStore {
    &self.results
  }

  fn lookup(&self, node_id: &str) -> Result<usize, GraphError> {
    self
      .index
      .get(node_id)
      .copied()
      .ok_or_else(|| GraphError::NodeNotFound {
        node_id: node_id.to_string(),
      })
  }

  /// Kahn's algorithm over the existing edges plus `extra`.
  fn check_acyclic(&self, new_ids: &[&str], extra: &[(usize, usize)]) -> Result<(), GraphError> {
    let total = self.nodes.len() + new_ids.len();
    let mut indegree = vec![0usize; total];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); total];

    for (from, outs) in self.downstream.iter().enumerate() {
      for &to in outs {
        adjacency[from].push(to);
        indegree[to] += 1;
      }
    }
    for &(from, to) in extra {
      adjacency[from].push(to);
      indegree[to] += 1;
    }

    let mut queue: VecDeque<usize> = (0..total).filter(|&i| indegree[i] == 0).collect();
    let mut visited = 0;
    while let Some(idx) = queue.pop_front() {
      visited += 1;
      for &next in &adjacency[idx] {
        indegree[next] -= 1;
        if indegree[next] == 0 {
          queue.push_back(next);
        }
      }
    }

    if visited == total {
      return Ok(());
    }

    let stuck = extra
      .iter()
      .map(|&(_, to)| to)
      .find(|&to| indegree[to] > 0)
      .or_else(|| (0..total).find(|&i| indegree[i] > 0))
      .unwrap_or(0);
    let node_id = if stuck < self.nodes.len() {
      self.nodes[stuck].id.clone()
    } else {
      new_ids[stuck - self.nodes.len()].to_string()
    };
    Err(GraphError::CycleDetected { node_id })
  }

  /// Recompute readiness of a pending or ready node.
  fn evaluate(&mut self, idx: usize, changes: &mut StateChanges) {
    if !matches!(self.nodes[idx].state, NodeState::Pending | NodeState::Ready) {
      return;
    }

    let failed_upstream = self.upstream[idx]
      .iter()
      .copied()
      .find(|&up| matches!(self.nodes[up].state, NodeState::Failed(_)));
    if let Some(up) = failed_upstream {
      let reason = TaskError::UpstreamFailure {
        upstream: self.nodes[up].id.clone(),
      };
      self.fail_node(idx, reason, changes);
      return;
    }

    let dependencies_done = self.upstream[idx]
      .iter()
      .all(|&up| self.nodes[up].state == NodeState::Completed);
    let satisfied = dependencies_done && self.frontier_closed(idx);

    let node = &mut self.nodes[idx];
    if satisfied && node.state == NodeState::Pending {
      node.state = NodeState::Ready;
      changes.ready.push(node.id.clone());
    } else if !satisfied && node.state == NodeState::Ready {
      // A new dependency arrived before the node was dispatched.
      node.state = NodeState::Pending;
    }
  }

  fn fail_node(&mut self, idx: usize, reason: TaskError, changes: &mut StateChanges) {
    self.nodes[idx].state = NodeState::Failed(reason.clone());
    changes.failed.push((self.nodes[idx].id.clone(), reason));
    for dependent in self.downstream[idx].clone() {
      self.evaluate(dependent, changes);
    }
  }

  fn refresh_joins(&mut self, changes: &mut StateChanges) {
    for idx in self.joins.clone() {
      self.evaluate(idx, changes);
    }
  }

  /// Frontier-closed check for a join node. Non-join nodes always pass.
  fn frontier_closed(&self, idx: usize) -> bool {
    let Some(root_id) = self.nodes[idx].join_root.as_deref() else {
      return true;
    };
    let Some(&root) = self.index.get(root_id) else {
      return false;
    };
    if self.nodes[root].state != NodeState::Completed {
      return false;
    }

    let subtree = self.subtree(root);
    if subtree.iter().any(|&i| !self.nodes[i].state.is_terminal()) {
      return false;
    }

    !self.nodes.iter().any(|node| {
      !node.state.is_terminal()
        && node.join_root.as_deref() != Some(root_id)
        && self.spawned_from(node, root_id)
    })
  }

  /// Descendants of `root`, not entering aggregation nodes over `root`.
  fn subtree(&self, root: usize) -> Vec<usize> {
    let root_id = self.nodes[root].id.as_str();
    self.reachable(root, |node| node.join_root.as_deref() == Some(root_id))
  }

  fn reachable(&self, start: usize, skip: impl Fn(&TaskNode<A>) -> bool) -> Vec<usize> {
    let mut seen = vec![false; self.nodes.len()];
    seen[start] = true;
    let mut queue = VecDeque::from([start]);
    let mut found = Vec::new();

    while let Some(idx) = queue.pop_front() {
      for &next in self.downstream[idx].iter().chain(&self.spawned[idx]) {
        if seen[next] || skip(&self.nodes[next]) {
          continue;
        }
        seen[next] = true;
        found.push(next);
        queue.push_back(next);
      }
    }
    found
  }

  fn spawned_from(&self, node: &TaskNode<A>, root_id: &str) -> bool {
    let mut current = node.spawned_by.as_deref();
    while let Some(parent) = current {
      if parent == root_id {
        return true;
      }
      current = self
        .index
        .get(parent)
        .and_then(|&idx| self.nodes[idx].spawned_by.as_deref());
    }
    false
  }
}
