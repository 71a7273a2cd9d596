//! Workflow runtime for slabflow.
//!
//! This crate schedules the nodes of a [`slabflow_workflow::WorkflowGraph`]
//! onto a bounded pool of tokio tasks, merges graph deltas returned by
//! expanding actions, and reports the outcome of the run.
//!
//! # Architecture
//!
//! ```text
//! WorkflowRuntime
//! ├── new(config) / with_notifier(notifier)
//! └── execute_workflow(graph, cancel) -> WorkflowExecution
//!
//! WorkflowExecution
//! └── wait() - dispatch ready nodes, settle outcomes, repeat until finished
//!
//! TaskAction
//! └── run(ctx) -> Terminal(result) | Expanding { result, delta }
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use slabflow_runtime::{RuntimeConfig, WorkflowRuntime};
//!
//! let runtime = WorkflowRuntime::new(RuntimeConfig::default());
//! let report = runtime.execute_workflow(graph, cancel).wait().await?;
//! ```

mod action;
mod error;
mod events;
mod execution;
mod report;
mod runtime;

pub use action::{
  ActionOutcome, ActionRef, RuntimeDelta, RuntimeGraph, RuntimeNodeSpec, TaskAction, TaskContext,
};
pub use error::RuntimeError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use execution::WorkflowExecution;
pub use report::{NodeSummary, RunReport, RunStatus};
pub use runtime::{RuntimeConfig, WorkflowRuntime};
