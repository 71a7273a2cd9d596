//! Integration tests for WorkflowRuntime using in-process actions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use slabflow_runtime::{
  ActionOutcome, ActionRef, ChannelNotifier, ExecutionEvent, RunStatus, RuntimeConfig,
  RuntimeDelta, RuntimeError, RuntimeGraph, TaskAction, TaskContext, WorkflowRuntime,
};
use slabflow_workflow::{GraphDelta, GraphError, NodeSpec, NodeState, TaskError};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

/// Returns a fixed payload.
struct Constant(serde_json::Value);

#[async_trait]
impl TaskAction for Constant {
  fn name(&self) -> &str {
    "constant"
  }

  async fn run(&self, _ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    Ok(ActionOutcome::terminal(self.0.clone()))
  }
}

/// Spawns `width` children per level, `depth` levels deep.
struct Fanout {
  width: usize,
  depth: usize,
}

#[async_trait]
impl TaskAction for Fanout {
  fn name(&self) -> &str {
    "fanout"
  }

  async fn run(&self, ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    if self.depth == 0 {
      return Ok(ActionOutcome::terminal(json!({ "leaf": ctx.node_id })));
    }
    let mut delta = RuntimeDelta::new();
    for i in 0..self.width {
      let child: ActionRef = Arc::new(Fanout {
        width: self.width,
        depth: self.depth - 1,
      });
      delta.push(NodeSpec::new(format!("{}.{}", ctx.node_id, i), child).depends_on(&ctx.node_id));
    }
    Ok(ActionOutcome::expanding(json!({ "spawned": self.width }), delta))
  }
}

/// Reports what its aggregation context saw.
struct Collect;

#[async_trait]
impl TaskAction for Collect {
  fn name(&self) -> &str {
    "collect"
  }

  async fn run(&self, ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    let subtree = ctx
      .subtree
      .ok_or_else(|| TaskError::validation("not an aggregation node"))?;
    for id in &subtree.completed {
      ctx.results.get(id).map_err(|e| TaskError::validation(e.to_string()))?;
    }
    Ok(ActionOutcome::terminal(json!({
      "completed": subtree.completed,
      "failed": subtree.failed.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>(),
    })))
  }
}

/// Always fails.
struct Fail;

#[async_trait]
impl TaskAction for Fail {
  fn name(&self) -> &str {
    "fail"
  }

  async fn run(&self, _ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    Err(TaskError::simulation("electronic steps did not converge"))
  }
}

/// Counts invocations.
struct Counted(Arc<AtomicUsize>);

#[async_trait]
impl TaskAction for Counted {
  fn name(&self) -> &str {
    "counted"
  }

  async fn run(&self, _ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    self.0.fetch_add(1, Ordering::SeqCst);
    Ok(ActionOutcome::terminal(json!(null)))
  }
}

/// Sleeps while tracking the peak number of concurrent invocations.
struct Probe {
  current: Arc<AtomicUsize>,
  peak: Arc<AtomicUsize>,
}

#[async_trait]
impl TaskAction for Probe {
  fn name(&self) -> &str {
    "probe"
  }

  async fn run(&self, _ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(30)).await;
    self.current.fetch_sub(1, Ordering::SeqCst);
    Ok(ActionOutcome::terminal(json!(null)))
  }
}

/// Panics instead of returning.
struct Panics;

#[async_trait]
impl TaskAction for Panics {
  fn name(&self) -> &str {
    "panics"
  }

  async fn run(&self, _ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    panic!("scratch directory vanished");
  }
}

/// Never finishes on its own.
struct Hang;

#[async_trait]
impl TaskAction for Hang {
  fn name(&self) -> &str {
    "hang"
  }

  async fn run(&self, _ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    std::future::pending::<()>().await;
    Ok(ActionOutcome::terminal(json!(null)))
  }
}

/// Returns a delta whose node depends on something that does not exist.
struct BadExpansion;

#[async_trait]
impl TaskAction for BadExpansion {
  fn name(&self) -> &str {
    "bad-expansion"
  }

  async fn run(&self, _ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    let delta = RuntimeDelta::new()
      .node(NodeSpec::new("child", action(Constant(json!(1)))).depends_on("missing"));
    Ok(ActionOutcome::expanding(json!(null), delta))
  }
}

fn action(action: impl TaskAction + 'static) -> ActionRef {
  Arc::new(action)
}

fn drain(mut receiver: UnboundedReceiver<ExecutionEvent>) -> Vec<ExecutionEvent> {
  let mut events = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    events.push(event);
  }
  events
}

fn fanout_with_join(width: usize, depth: usize) -> RuntimeGraph {
  RuntimeGraph::seeded(
    GraphDelta::new()
      .node(NodeSpec::new("root", action(Fanout { width, depth })))
      .node(NodeSpec::new("collect", action(Collect)).joining("root")),
  )
  .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_runs_after_every_spawned_node() {
  let (notifier, receiver) = ChannelNotifier::channel();
  let runtime = WorkflowRuntime::new(RuntimeConfig::default()).with_notifier(Arc::new(notifier));

  let report = runtime
    .execute_workflow(fanout_with_join(3, 2), CancellationToken::new())
    .wait()
    .await
    .unwrap();

  assert_eq!(report.status, RunStatus::Completed);
  // root + 3 children + 9 grandchildren + the join
  assert_eq!(report.results.len(), 14);
  let completed = report.result("collect").unwrap()["completed"]
    .as_array()
    .unwrap()
    .len();
  assert_eq!(completed, 12);

  let events = drain(receiver);
  let join_ready: Vec<usize> = events
    .iter()
    .enumerate()
    .filter(|(_, e)| matches!(e, ExecutionEvent::NodeReady { node_id, .. } if node_id == "collect"))
    .map(|(i, _)| i)
    .collect();
  assert_eq!(join_ready.len(), 1);

  let last_leaf = events
    .iter()
    .rposition(
      |e| matches!(e, ExecutionEvent::NodeCompleted { node_id, .. } if node_id != "collect"),
    )
    .unwrap();
  assert!(join_ready[0] > last_leaf);
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::WorkflowCompleted {
      status: RunStatus::Completed,
      ..
    })
  ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_limit_is_respected() {
  let current = Arc::new(AtomicUsize::new(0));
  let peak = Arc::new(AtomicUsize::new(0));
  let mut delta = GraphDelta::new();
  for i in 0..8 {
    delta.push(NodeSpec::new(
      format!("probe-{i}"),
      action(Probe {
        current: current.clone(),
        peak: peak.clone(),
      }),
    ));
  }
  let graph = RuntimeGraph::seeded(delta).unwrap();
  let runtime = WorkflowRuntime::new(RuntimeConfig {
    max_concurrency: 2,
    default_timeout: None,
  });

  let report = runtime
    .execute_workflow(graph, CancellationToken::new())
    .wait()
    .await
    .unwrap();

  assert_eq!(report.status, RunStatus::Completed);
  assert_eq!(report.results.len(), 8);
  assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_timeout_fails_node_and_its_dependents() {
  let graph = RuntimeGraph::seeded(
    GraphDelta::new()
      .node(NodeSpec::new("slow", action(Hang)).with_timeout_ms(Some(20)))
      .node(NodeSpec::new("after-slow", action(Constant(json!(1)))).depends_on("slow"))
      .node(NodeSpec::new("sibling", action(Constant(json!(2))))),
  )
  .unwrap();
  let runtime = WorkflowRuntime::new(RuntimeConfig::default());

  let report = runtime
    .execute_workflow(graph, CancellationToken::new())
    .wait()
    .await
    .unwrap();

  assert_eq!(report.status, RunStatus::PartiallyFailed);
  assert_eq!(
    report.failed.get("slow"),
    Some(&TaskError::Timeout { timeout_ms: 20 })
  );
  assert_eq!(
    report.failed.get("after-slow"),
    Some(&TaskError::UpstreamFailure {
      upstream: "slow".to_string()
    })
  );
  assert_eq!(report.result("sibling"), Some(&json!(2)));
}

#[tokio::test]
async fn test_default_timeout_applies_to_nodes_without_their_own() {
  let graph =
    RuntimeGraph::seeded(GraphDelta::new().node(NodeSpec::new("slow", action(Hang)))).unwrap();
  let runtime = WorkflowRuntime::new(RuntimeConfig {
    max_concurrency: 1,
    default_timeout: Some(Duration::from_millis(15)),
  });

  let report = runtime
    .execute_workflow(graph, CancellationToken::new())
    .wait()
    .await
    .unwrap();

  assert_eq!(report.status, RunStatus::Failed);
  assert_eq!(
    report.state("slow"),
    Some(&NodeState::Failed(TaskError::Timeout { timeout_ms: 15 }))
  );
}

#[tokio::test]
async fn test_failed_node_never_runs_dependents() {
  let calls = Arc::new(AtomicUsize::new(0));
  let graph = RuntimeGraph::seeded(
    GraphDelta::new()
      .node(NodeSpec::new("parent", action(Fail)))
      .node(NodeSpec::new("left", action(Counted(calls.clone()))).depends_on("parent"))
      .node(NodeSpec::new("right", action(Counted(calls.clone()))).depends_on("parent")),
  )
  .unwrap();
  let runtime = WorkflowRuntime::new(RuntimeConfig::default());

  let report = runtime
    .execute_workflow(graph, CancellationToken::new())
    .wait()
    .await
    .unwrap();

  assert_eq!(calls.load(Ordering::SeqCst), 0);
  assert_eq!(report.status, RunStatus::Failed);
  for id in ["left", "right"] {
    assert_eq!(
      report.failed.get(id),
      Some(&TaskError::UpstreamFailure {
        upstream: "parent".to_string()
      })
    );
  }
}

#[tokio::test]
async fn test_failed_branch_still_reaches_aggregation() {
  let mut delta = RuntimeDelta::new();
  delta.push(NodeSpec::new("ok", action(Constant(json!("fine")))).depends_on("root"));
  delta.push(NodeSpec::new("broken", action(Fail)).depends_on("root"));

  struct Seed(std::sync::Mutex<Option<RuntimeDelta>>);

  #[async_trait]
  impl TaskAction for Seed {
    fn name(&self) -> &str {
      "seed"
    }

    async fn run(&self, _ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
      let delta = self.0.lock().unwrap().take().unwrap_or_default();
      Ok(ActionOutcome::expanding(json!(null), delta))
    }
  }

  let graph = RuntimeGraph::seeded(
    GraphDelta::new()
      .node(NodeSpec::new("root", action(Seed(std::sync::Mutex::new(Some(delta))))))
      .node(NodeSpec::new("collect", action(Collect)).joining("root")),
  )
  .unwrap();
  let runtime = WorkflowRuntime::new(RuntimeConfig::default());

  let report = runtime
    .execute_workflow(graph, CancellationToken::new())
    .wait()
    .await
    .unwrap();

  assert_eq!(report.status, RunStatus::PartiallyFailed);
  let collected = report.result("collect").unwrap();
  assert_eq!(collected["completed"], json!(["ok"]));
  assert_eq!(collected["failed"], json!(["broken"]));
}

#[tokio::test]
async fn test_malformed_delta_aborts_run() {
  let graph = RuntimeGraph::seeded(
    GraphDelta::new()
      .node(NodeSpec::new("root", action(BadExpansion)))
      .node(NodeSpec::new("collect", action(Collect)).joining("root")),
  )
  .unwrap();
  let runtime = WorkflowRuntime::new(RuntimeConfig::default());
  let execution = runtime.execute_workflow(graph, CancellationToken::new());
  let graph = execution.graph();

  let err = execution.wait().await.unwrap_err();

  assert!(matches!(
    err,
    RuntimeError::Graph(GraphError::UnknownDependency { ref dependency, .. }) if dependency == "missing"
  ));
  let graph = graph.lock().await;
  assert!(!graph.contains("child"));
  assert!(graph.is_finished());
  for id in ["root", "collect"] {
    assert!(matches!(
      graph.state(id),
      Some(NodeState::Failed(TaskError::Aborted { reason })) if reason.contains("missing")
    ));
  }
}

#[tokio::test]
async fn test_panicking_action_fails_only_its_node() {
  let graph = RuntimeGraph::seeded(
    GraphDelta::new()
      .node(NodeSpec::new("boom", action(Panics)))
      .node(NodeSpec::new("after", action(Constant(json!(1)))).depends_on("boom"))
      .node(NodeSpec::new("sibling", action(Constant(json!(2))))),
  )
  .unwrap();
  let runtime = WorkflowRuntime::new(RuntimeConfig::default());

  let report = runtime
    .execute_workflow(graph, CancellationToken::new())
    .wait()
    .await
    .unwrap();

  assert_eq!(report.status, RunStatus::PartiallyFailed);
  assert!(matches!(
    report.failed.get("boom"),
    Some(TaskError::Panicked { message }) if message.contains("scratch directory vanished")
  ));
  assert_eq!(
    report.failed.get("after"),
    Some(&TaskError::UpstreamFailure {
      upstream: "boom".to_string()
    })
  );
  assert_eq!(report.state("sibling"), Some(&NodeState::Completed));
  assert_eq!(report.result("sibling"), Some(&json!(2)));
}

#[tokio::test]
async fn test_cancellation_fails_unfinished_nodes() {
  let graph = RuntimeGraph::seeded(
    GraphDelta::new()
      .node(NodeSpec::new("stuck", action(Hang)))
      .node(NodeSpec::new("after", action(Constant(json!(1)))).depends_on("stuck")),
  )
  .unwrap();
  let (notifier, receiver) = ChannelNotifier::channel();
  let runtime = WorkflowRuntime::new(RuntimeConfig::default()).with_notifier(Arc::new(notifier));
  let cancel = CancellationToken::new();
  let execution = runtime.execute_workflow(graph, cancel.clone());
  let graph = execution.graph();

  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(20)).await;
    trigger.cancel();
  });

  let err = execution.wait().await.unwrap_err();
  assert!(matches!(err, RuntimeError::Cancelled));

  let graph = graph.lock().await;
  for id in ["stuck", "after"] {
    assert_eq!(graph.state(id), Some(&NodeState::Failed(TaskError::Cancelled)));
  }

  let events = drain(receiver);
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::WorkflowFailed { .. })
  ));
}
