//! Workflow execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use slabflow_workflow::{GraphError, NodeId, StateChanges, TaskError};
use tokio::sync::Mutex;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::action::{ActionOutcome, ActionRef, RuntimeGraph, TaskContext};
use crate::error::RuntimeError;
use crate::events::ExecutionEvent;
use crate::report::RunReport;
use crate::runtime::WorkflowRuntime;

/// What a worker hands back: the node it ran and the action's outcome.
type TaskOutput = (NodeId, Result<ActionOutcome, TaskError>);

/// A handle to a workflow execution.
///
/// Call `.wait()` to run the execution and get the report.
pub struct WorkflowExecution<'a> {
  runtime: &'a WorkflowRuntime,
  execution_id: String,
  graph: Arc<Mutex<RuntimeGraph>>,
  cancel: CancellationToken,
}

impl<'a> WorkflowExecution<'a> {
  pub(crate) fn new(
    runtime: &'a WorkflowRuntime,
    execution_id: String,
    graph: RuntimeGraph,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      runtime,
      execution_id,
      graph: Arc::new(Mutex::new(graph)),
      cancel,
    }
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Shared handle to the run's graph.
  ///
  /// Stays valid after `wait` returns, so callers can inspect node states
  /// of a run that ended with an error.
  pub fn graph(&self) -> Arc<Mutex<RuntimeGraph>> {
    self.graph.clone()
  }

  /// Run until no node is pending, ready or running.
  #[instrument(
    name = "workflow_execute",
    skip(self),
    fields(execution_id = %self.execution_id)
  )]
  pub async fn wait(self) -> Result<RunReport, RuntimeError> {
    let started_at = Utc::now();
    let initially_ready = {
      let graph = self.graph.lock().await;
      info!(
        execution_id = %self.execution_id,
        nodes = graph.len(),
        "workflow_started"
      );
      self.emit(ExecutionEvent::WorkflowStarted {
        execution_id: self.execution_id.clone(),
        nodes: graph.len(),
      });
      graph.ready_nodes()
    };
    for node_id in initially_ready {
      self.emit(ExecutionEvent::NodeReady {
        execution_id: self.execution_id.clone(),
        node_id,
      });
    }

    let result = match self.run_loop().await {
      Ok(()) => {
        let graph = self.graph.lock().await;
        Ok(RunReport::from_graph(&self.execution_id, started_at, &graph))
      }
      Err(e) => Err(e),
    };

    match &result {
      Ok(report) => {
        info!(
          execution_id = %self.execution_id,
          status = ?report.status,
          failed = report.failed.len(),
          "workflow_completed"
        );
        self.emit(ExecutionEvent::WorkflowCompleted {
          execution_id: self.execution_id.clone(),
          status: report.status,
        });
      }
      Err(e) => {
        error!(
          execution_id = %self.execution_id,
          error = %e,
          "workflow_failed"
        );
        self.emit(ExecutionEvent::WorkflowFailed {
          execution_id: self.execution_id.clone(),
          error: e.to_string(),
        });
      }
    }

    result
  }

  /// Run the main execution loop.
  ///
  /// On a fatal error every unfinished node is failed before returning, so
  /// the graph is left with nothing pending or running.
  async fn run_loop(&self) -> Result<(), RuntimeError> {
    let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
    let mut workers: HashMap<task::Id, NodeId> = HashMap::new();

    let result = self.drive(&mut tasks, &mut workers).await;
    match &result {
      Err(RuntimeError::Cancelled) | Ok(()) => {}
      Err(e) => self.abort_run(&mut tasks, e).await,
    }
    result
  }

  async fn drive(
    &self,
    tasks: &mut JoinSet<TaskOutput>,
    workers: &mut HashMap<task::Id, NodeId>,
  ) -> Result<(), RuntimeError> {
    loop {
      if self.cancel.is_cancelled() {
        return Err(self.cancel_run(tasks).await);
      }

      self.dispatch_ready(tasks, workers).await?;

      if tasks.is_empty() {
        let graph = self.graph.lock().await;
        if graph.is_finished() {
          return Ok(());
        }
        let unfinished = graph
          .nodes()
          .filter(|n| !n.state().is_terminal())
          .count();
        return Err(RuntimeError::Stalled { unfinished });
      }

      let next = tokio::select! {
        joined = tasks.join_next_with_id() => Some(joined),
        _ = self.cancel.cancelled() => None,
      };

      let Some(joined) = next else {
        return Err(self.cancel_run(tasks).await);
      };
      match joined {
        None => continue,
        Some(Ok((id, (node_id, outcome)))) => {
          workers.remove(&id);
          self.settle(&node_id, outcome).await?;
        }
        Some(Err(e)) => {
          let node_id = workers
            .remove(&e.id())
            .ok_or_else(|| RuntimeError::TaskJoin {
              message: e.to_string(),
            })?;
          let panicked = TaskError::Panicked {
            message: e.to_string(),
          };
          self.settle(&node_id, Err(panicked)).await?;
        }
      }
    }
  }

  /// Start as many ready nodes as there are free slots.
  ///
  /// Contexts are built under the same lock that moves nodes to `Running`,
  /// so each action sees a consistent result snapshot.
  async fn dispatch_ready(
    &self,
    tasks: &mut JoinSet<TaskOutput>,
    workers: &mut HashMap<task::Id, NodeId>,
  ) -> Result<(), RuntimeError> {
    let capacity = self.runtime.max_concurrency().saturating_sub(tasks.len());
    if capacity == 0 {
      return Ok(());
    }

    let mut graph = self.graph.lock().await;
    for node_id in graph.ready_nodes().into_iter().take(capacity) {
      graph.start(&node_id)?;
      let node = graph
        .node(&node_id)
        .ok_or_else(|| GraphError::NodeNotFound {
          node_id: node_id.clone(),
        })?;

      let subtree = match node.join_root() {
        Some(root) => Some(graph.subtree_outcome(root)?),
        None => None,
      };
      let ctx = TaskContext {
        execution_id: self.execution_id.clone(),
        node_id: node_id.clone(),
        static_inputs: node.static_inputs().clone(),
        results: graph.results().snapshot(),
        subtree,
      };
      let action = node.action().clone();
      let timeout = node
        .timeout_ms()
        .map(Duration::from_millis)
        .or(self.runtime.config.default_timeout);

      info!(
        execution_id = %self.execution_id,
        node_id = %node_id,
        action = action.name(),
        "task_started"
      );
      self.emit(ExecutionEvent::NodeStarted {
        execution_id: self.execution_id.clone(),
        node_id: node_id.clone(),
      });

      let handle = tasks.spawn(run_task(
        self.execution_id.clone(),
        node_id.clone(),
        action,
        ctx,
        timeout,
      ));
      workers.insert(handle.id(), node_id);
    }

    Ok(())
  }

  /// Apply a finished task's outcome to the graph.
  ///
  /// For expanding actions the delta is merged before the node is marked
  /// completed, under one lock, so dependents only become ready once the
  /// whole expansion is visible.
  async fn settle(
    &self,
    node_id: &str,
    outcome: Result<ActionOutcome, TaskError>,
  ) -> Result<(), RuntimeError> {
    let mut graph = self.graph.lock().await;

    // Results arriving after cancellation are dropped.
    if self.cancel.is_cancelled() {
      return Ok(());
    }

    let changes = match outcome {
      Ok(ActionOutcome::Terminal(result)) => {
        let changes = graph.mark_completed(node_id, result.clone())?;
        self.completed(node_id, result);
        changes
      }
      Ok(ActionOutcome::Expanding { result, delta }) => {
        let added: Vec<NodeId> = delta.nodes.iter().map(|spec| spec.id.clone()).collect();
        let mut changes = graph.insert_delta(Some(node_id), delta)?;
        info!(
          execution_id = %self.execution_id,
          node_id = %node_id,
          added = added.len(),
          "graph_expanded"
        );
        self.emit(ExecutionEvent::GraphExpanded {
          execution_id: self.execution_id.clone(),
          node_id: node_id.to_string(),
          added,
        });

        let completed = graph.mark_completed(node_id, result.clone())?;
        self.completed(node_id, result);
        changes.ready.extend(completed.ready);
        changes.failed.extend(completed.failed);
        changes
      }
      Err(e) => {
        warn!(
          execution_id = %self.execution_id,
          node_id = %node_id,
          error = %e,
          "task_failed"
        );
        graph.mark_failed(node_id, e)?
      }
    };

    self.publish(changes);
    Ok(())
  }

  /// Fail every unfinished node and stop workers.
  async fn cancel_run(&self, tasks: &mut JoinSet<TaskOutput>) -> RuntimeError {
    tasks.abort_all();
    let changes = self.graph.lock().await.cancel();
    warn!(
      execution_id = %self.execution_id,
      cancelled = changes.failed.len(),
      "workflow cancelled"
    );
    self.publish(changes);
    RuntimeError::Cancelled
  }

  /// Stop workers and fail every unfinished node after a fatal error.
  async fn abort_run(&self, tasks: &mut JoinSet<TaskOutput>, cause: &RuntimeError) {
    tasks.abort_all();
    let changes = self.graph.lock().await.abort(TaskError::Aborted {
      reason: cause.to_string(),
    });
    warn!(
      execution_id = %self.execution_id,
      aborted = changes.failed.len(),
      "workflow aborted"
    );
    self.publish(changes);
  }

  fn completed(&self, node_id: &str, data: serde_json::Value) {
    info!(
      execution_id = %self.execution_id,
      node_id = %node_id,
      "task_completed"
    );
    self.emit(ExecutionEvent::NodeCompleted {
      execution_id: self.execution_id.clone(),
      node_id: node_id.to_string(),
      data,
    });
  }

  fn publish(&self, changes: StateChanges) {
    if changes.is_empty() {
      return;
    }
    for (node_id, error) in changes.failed {
      self.emit(ExecutionEvent::NodeFailed {
        execution_id: self.execution_id.clone(),
        node_id,
        error,
      });
    }
    for node_id in changes.ready {
      self.emit(ExecutionEvent::NodeReady {
        execution_id: self.execution_id.clone(),
        node_id,
      });
    }
  }

  fn emit(&self, event: ExecutionEvent) {
    self.runtime.notifier.notify(event);
  }
}

/// Run one action, bounded by its timeout.
#[instrument(
  name = "task_execute",
  skip(action, ctx, timeout),
  fields(execution_id = %execution_id, node_id = %node_id)
)]
async fn run_task(
  execution_id: String,
  node_id: NodeId,
  action: ActionRef,
  ctx: TaskContext,
  timeout: Option<Duration>,
) -> TaskOutput {
  let outcome = match timeout {
    Some(limit) => match tokio::time::timeout(limit, action.run(ctx)).await {
      Ok(outcome) => outcome,
      Err(_) => Err(TaskError::Timeout {
        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
      }),
    },
    None => action.run(ctx).await,
  };
  (node_id, outcome)
}
