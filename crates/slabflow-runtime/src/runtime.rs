//! Workflow runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::action::RuntimeGraph;
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::execution::WorkflowExecution;

/// Configuration for the workflow runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Maximum number of actions running at once. Values below one are
  /// treated as one.
  pub max_concurrency: usize,
  /// Timeout applied to nodes that do not carry their own.
  pub default_timeout: Option<Duration>,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      max_concurrency: 4,
      default_timeout: None,
    }
  }
}

/// The workflow runtime.
///
/// Holds scheduling configuration and the event notifier. Each call to
/// [`WorkflowRuntime::execute_workflow`] runs one graph to completion.
pub struct WorkflowRuntime {
  pub(crate) config: RuntimeConfig,
  pub(crate) notifier: Arc<dyn ExecutionNotifier>,
}

impl WorkflowRuntime {
  pub fn new(config: RuntimeConfig) -> Self {
    Self {
      config,
      notifier: Arc::new(NoopNotifier),
    }
  }

  /// Replace the event notifier.
  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Execute a seeded graph.
  ///
  /// Returns a `WorkflowExecution` handle. Call `.wait()` to run the execution
  /// and get the report.
  pub fn execute_workflow(
    &self,
    graph: RuntimeGraph,
    cancel: CancellationToken,
  ) -> WorkflowExecution<'_> {
    let execution_id = uuid::Uuid::new_v4().to_string();

    WorkflowExecution::new(self, execution_id, graph, cancel)
  }

  pub(crate) fn max_concurrency(&self) -> usize {
    self.config.max_concurrency.max(1)
  }
}
