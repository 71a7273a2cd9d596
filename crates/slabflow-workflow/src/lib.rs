//! Slabflow Workflow
//!
//! This crate provides the dynamic task graph that a slabflow run executes.
//! Unlike a static DAG, the graph grows while it runs: a completed node may
//! return a [`GraphDelta`] describing new nodes and edges, which is merged
//! atomically before anything downstream is released.
//!
//! Key pieces:
//! - [`WorkflowGraph`] owns nodes, edges and the run's [`ResultStore`]
//! - [`TaskNode`] tracks one node's lifecycle ([`NodeState`])
//! - Aggregation nodes (see [`NodeSpec::joining`]) wait until every node
//!   transitively spawned under their root has finished, not just the nodes
//!   visible when the join was created
//!
//! The graph is generic over the action handle stored in each node so it can
//! be tested without an executor.

mod delta;
mod error;
mod graph;
mod node;
mod store;

pub use delta::{GraphDelta, NodeSpec};
pub use error::{GraphError, StoreError, TaskError, WorkflowError};
pub use graph::{StateChanges, SubtreeOutcome, WorkflowGraph};
pub use node::{NodeId, NodeState, TaskNode};
pub use store::ResultStore;
