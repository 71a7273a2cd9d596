//! Task actions of the adsorption workflow.
//!
//! ```text
//! optimize-bulk ──► slab-<key> ──► adsorbate-<key>-<molecule>-<n>
//!       │
//!       └─ (join) ──► analyze-adsorption
//! ```

mod adsorbate;
mod analyze;
mod optimize;
mod slab;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use slabflow_runtime::{ActionRef, TaskAction, TaskContext};
use slabflow_workflow::TaskError;

pub use adsorbate::AdsorbateRelax;
pub use analyze::AnalyzeAdsorption;
pub use optimize::OptimizeBulk;
pub use slab::SlabRelax;

/// Root node id.
pub const OPTIMIZE_BULK: &str = "optimize-bulk";

/// Aggregation node id.
pub const ANALYZE_ADSORPTION: &str = "analyze-adsorption";

pub fn slab_node_id(miller_index: &str) -> String {
  format!("slab-{}", miller_index)
}

pub fn adsorbate_node_id(miller_index: &str, adsorbate: &str, n: usize) -> String {
  format!("adsorbate-{}-{}-{}", miller_index, adsorbate, n)
}

pub(crate) fn action(action: impl TaskAction + 'static) -> ActionRef {
  Arc::new(action)
}

/// Decode a static input of the running node.
pub(crate) fn input<T: DeserializeOwned>(ctx: &TaskContext, key: &str) -> Result<T, TaskError> {
  let value = ctx.input(key).ok_or_else(|| {
    TaskError::validation(format!(
      "node '{}' is missing static input '{}'",
      ctx.node_id, key
    ))
  })?;
  serde_json::from_value(value.clone()).map_err(|e| {
    TaskError::validation(format!(
      "node '{}' has invalid static input '{}': {}",
      ctx.node_id, key, e
    ))
  })
}

/// Decode the stored result of a completed node.
pub(crate) fn stored<T: DeserializeOwned>(ctx: &TaskContext, node_id: &str) -> Result<T, TaskError> {
  let value = ctx
    .result(node_id)
    .map_err(|e| TaskError::validation(e.to_string()))?;
  serde_json::from_value(value.clone()).map_err(|e| {
    TaskError::validation(format!("result of node '{}' is malformed: {}", node_id, e))
  })
}

pub(crate) fn payload<T: Serialize>(value: &T) -> Result<serde_json::Value, TaskError> {
  serde_json::to_value(value)
    .map_err(|e| TaskError::validation(format!("failed to encode result: {}", e)))
}
