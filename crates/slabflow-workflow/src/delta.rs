//! Graph deltas: batches of new nodes and edges merged into a running graph.

use crate::node::NodeId;

/// Definition of a node to be inserted by a delta.
#[derive(Debug, Clone)]
pub struct NodeSpec<A> {
  pub id: NodeId,
  pub action: A,
  pub static_inputs: serde_json::Value,
  pub dependencies: Vec<NodeId>,
  pub timeout_ms: Option<u64>,
  /// Makes this node a dynamic join over everything spawned from the root.
  pub join_root: Option<NodeId>,
}

impl<A> NodeSpec<A> {
  pub fn new(id: impl Into<NodeId>, action: A) -> Self {
    Self {
      id: id.into(),
      action,
      static_inputs: serde_json::Value::Null,
      dependencies: Vec::new(),
      timeout_ms: None,
      join_root: None,
    }
  }

  pub fn depends_on(mut self, dependency: impl Into<NodeId>) -> Self {
    self.dependencies.push(dependency.into());
    self
  }

  pub fn with_inputs(mut self, static_inputs: serde_json::Value) -> Self {
    self.static_inputs = static_inputs;
    self
  }

  pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
    self.timeout_ms = timeout_ms;
    self
  }

  /// Turn this node into an aggregation over `root`'s subtree.
  ///
  /// The node also depends on `root` directly.
  pub fn joining(mut self, root: impl Into<NodeId>) -> Self {
    let root = root.into();
    if !self.dependencies.contains(&root) {
      self.dependencies.push(root.clone());
    }
    self.join_root = Some(root);
    self
  }
}

/// A batch of new nodes plus extra dependency edges.
///
/// Edges are `(dependency, dependent)` pairs. The dependent may be a node in
/// the same delta or an existing node that has not started yet.
#[derive(Debug, Clone)]
pub struct GraphDelta<A> {
  pub nodes: Vec<NodeSpec<A>>,
  pub edges: Vec<(NodeId, NodeId)>,
}

impl<A> Default for GraphDelta<A> {
  fn default() -> Self {
    Self {
      nodes: Vec::new(),
      edges: Vec::new(),
    }
  }
}

impl<A> GraphDelta<A> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn node(mut self, spec: NodeSpec<A>) -> Self {
    self.nodes.push(spec);
    self
  }

  pub fn edge(mut self, dependency: impl Into<NodeId>, dependent: impl Into<NodeId>) -> Self {
    self.edges.push((dependency.into(), dependent.into()));
    self
  }

  pub fn push(&mut self, spec: NodeSpec<A>) {
    self.nodes.push(spec);
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty() && self.edges.is_empty()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }
}
