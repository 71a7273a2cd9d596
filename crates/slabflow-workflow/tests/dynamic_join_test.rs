//! Randomized expansion tests for aggregation nodes.

use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use slabflow_workflow::{GraphDelta, NodeSpec, NodeState, WorkflowGraph};

type Graph = WorkflowGraph<()>;

fn spec(id: &str) -> NodeSpec<()> {
  NodeSpec::new(id, ())
}

/// Drive the graph to completion in a random order.
///
/// Every first-generation child expands into its own random set of
/// grandchildren when it completes. Returns the number of non-join nodes
/// that completed before the join became ready, and the number of times
/// the join was reported ready.
fn drive(seed: u64) -> (usize, usize, usize) {
  let mut rng = StdRng::seed_from_u64(seed);
  let mut graph = Graph::seeded(
    GraphDelta::new()
      .node(spec("root"))
      .node(spec("join").joining("root")),
  )
  .unwrap();

  let mut running: Vec<String> = Vec::new();
  let mut ready: Vec<String> = graph.ready_nodes();
  let mut join_ready_count = 0;
  let mut completed_before_join = 0;
  let mut total_spawned = 0;

  loop {
    for id in ready.drain(..) {
      if id == "join" {
        join_ready_count += 1;
        completed_before_join = graph
          .nodes()
          .filter(|n| !n.is_join() && *n.state() == NodeState::Completed)
          .count();
      }
      graph.start(&id).unwrap();
      running.push(id);
    }
    if running.is_empty() {
      break;
    }

    let pick = rng.gen_range(0..running.len());
    let id = running.swap_remove(pick);

    let generation = id.matches('/').count();
    if generation < 2 && id != "join" {
      let count = rng.gen_range(0..=20);
      total_spawned += count;
      let mut delta = GraphDelta::new();
      for i in 0..count {
        delta.push(spec(&format!("{}/{}", id, i)).depends_on(id.as_str()));
      }
      graph.insert_delta(Some(&id), delta).unwrap();
    }

    let changes = graph.mark_completed(&id, json!({ "id": id })).unwrap();
    ready.extend(changes.ready);
  }

  assert!(graph.is_finished());
  (join_ready_count, completed_before_join, total_spawned)
}

#[test]
fn test_join_ready_once_after_every_descendant() {
  for seed in 0..64 {
    let (ready_count, completed_before, spawned) = drive(seed);
    assert_eq!(ready_count, 1, "seed {seed}");
    // root plus everything it spawned, transitively
    assert_eq!(completed_before, spawned + 1, "seed {seed}");
  }
}

#[test]
fn test_two_joins_on_same_root_do_not_wait_on_each_other() {
  let mut graph = Graph::seeded(
    GraphDelta::new()
      .node(spec("root"))
      .node(spec("summary").joining("root"))
      .node(spec("report").joining("root")),
  )
  .unwrap();

  graph.start("root").unwrap();
  graph
    .insert_delta(Some("root"), GraphDelta::new().node(spec("leaf").depends_on("root")))
    .unwrap();
  graph.mark_completed("root", json!(null)).unwrap();
  graph.start("leaf").unwrap();
  let changes = graph.mark_completed("leaf", json!(null)).unwrap();

  assert_eq!(changes.ready, vec!["summary".to_string(), "report".to_string()]);
}

#[test]
fn test_subtree_outcome_lists_every_branch() {
  let mut graph = Graph::seeded(
    GraphDelta::new()
      .node(spec("root"))
      .node(spec("join").joining("root")),
  )
  .unwrap();
  graph.start("root").unwrap();
  graph
    .insert_delta(
      Some("root"),
      GraphDelta::new()
        .node(spec("a").depends_on("root"))
        .node(spec("b").depends_on("root")),
    )
    .unwrap();
  graph.mark_completed("root", json!(null)).unwrap();

  graph.start("a").unwrap();
  graph
    .insert_delta(Some("a"), GraphDelta::new().node(spec("a/0").depends_on("a")))
    .unwrap();
  graph.mark_completed("a", json!(null)).unwrap();
  graph.start("b").unwrap();
  graph
    .mark_failed("b", slabflow_workflow::TaskError::simulation("scf did not converge"))
    .unwrap();
  graph.start("a/0").unwrap();
  let changes = graph.mark_completed("a/0", json!(null)).unwrap();
  assert_eq!(changes.ready, vec!["join".to_string()]);

  let outcome = graph.subtree_outcome("root").unwrap();
  assert_eq!(outcome.completed, vec!["a".to_string(), "a/0".to_string()]);
  assert_eq!(outcome.failed.len(), 1);
  assert_eq!(outcome.failed[0].0, "b");
}
