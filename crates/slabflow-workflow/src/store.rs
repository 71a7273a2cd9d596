//! Run-scoped result store.
//!
//! Every completed node writes exactly one entry. Entries are never removed
//! while the run exists so aggregation and auditing can read them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::node::NodeId;

/// Write-once map from producing node id to its result payload.
///
/// Payloads are reference counted so snapshots handed to running tasks are
/// cheap to take.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
  entries: HashMap<NodeId, Arc<serde_json::Value>>,
}

impl ResultStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Write the result for `node_id`. Fails if one was already written.
  pub fn put(&mut self, node_id: &str, payload: serde_json::Value) -> Result<(), StoreError> {
    if self.entries.contains_key(node_id) {
      return Err(StoreError::DuplicateWrite {
        node_id: node_id.to_string(),
      });
    }
    self.entries.insert(node_id.to_string(), Arc::new(payload));
    Ok(())
  }

  pub fn get(&self, node_id: &str) -> Result<&serde_json::Value, StoreError> {
    self
      .entries
      .get(node_id)
      .map(|payload| payload.as_ref())
      .ok_or_else(|| StoreError::NotFound {
        node_id: node_id.to_string(),
      })
  }

  pub fn contains(&self, node_id: &str) -> bool {
    self.entries.contains_key(node_id)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
    self
      .entries
      .iter()
      .map(|(id, payload)| (id.as_str(), payload.as_ref()))
  }

  /// A read-only copy of the current entries.
  pub fn snapshot(&self) -> ResultStore {
    self.clone()
  }
}
