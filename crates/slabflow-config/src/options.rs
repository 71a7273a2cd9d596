//! Opaque workflow options.
//!
//! Options are a flat JSON object. A handful of keys have typed accessors with
//! defaults; every other key is carried along untouched.
//!
//! ```json
//! {
//!   "min_slab_size": 9.0,
//!   "min_vacuum_size": 15.0,
//!   "concurrency_limit": 8,
//!   "timeout_ms": 3600000,
//!   "incar_update": { "ENCUT": 520 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MIN_SLAB_SIZE: &str = "min_slab_size";
pub const MIN_VACUUM_SIZE: &str = "min_vacuum_size";
pub const MAX_NORMAL_SEARCH: &str = "max_normal_search";
pub const CENTER_SLAB: &str = "center_slab";
pub const CONCURRENCY_LIMIT: &str = "concurrency_limit";
pub const TIMEOUT_MS: &str = "timeout_ms";

const DEFAULT_MIN_SLAB_SIZE: f64 = 7.0;
const DEFAULT_MIN_VACUUM_SIZE: f64 = 12.0;
const DEFAULT_MAX_NORMAL_SEARCH: u32 = 1;
const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Named options forwarded verbatim into task static inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowOptions(Map<String, Value>);

impl WorkflowOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set an option, returning the updated options.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.0.insert(key.into(), value.into());
    self
  }

  /// Set an option in place.
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
    self.0.insert(key.into(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  /// Minimum slab thickness in angstroms.
  pub fn min_slab_size(&self) -> f64 {
    self
      .get(MIN_SLAB_SIZE)
      .and_then(Value::as_f64)
      .unwrap_or(DEFAULT_MIN_SLAB_SIZE)
  }

  /// Minimum vacuum thickness in angstroms.
  pub fn min_vacuum_size(&self) -> f64 {
    self
      .get(MIN_VACUUM_SIZE)
      .and_then(Value::as_f64)
      .unwrap_or(DEFAULT_MIN_VACUUM_SIZE)
  }

  /// Search depth for a lattice vector normal to the surface.
  pub fn max_normal_search(&self) -> u32 {
    self
      .get(MAX_NORMAL_SEARCH)
      .and_then(Value::as_u64)
      .and_then(|v| u32::try_from(v).ok())
      .unwrap_or(DEFAULT_MAX_NORMAL_SEARCH)
  }

  pub fn center_slab(&self) -> bool {
    self
      .get(CENTER_SLAB)
      .and_then(Value::as_bool)
      .unwrap_or(true)
  }

  /// Maximum number of tasks running at once. Never less than one.
  pub fn concurrency_limit(&self) -> usize {
    self
      .get(CONCURRENCY_LIMIT)
      .and_then(Value::as_u64)
      .map(|v| v.max(1) as usize)
      .unwrap_or(DEFAULT_CONCURRENCY_LIMIT)
  }

  /// Per-task timeout, if any.
  pub fn timeout_ms(&self) -> Option<u64> {
    self.get(TIMEOUT_MS).and_then(Value::as_u64)
  }
}

impl From<Map<String, Value>> for WorkflowOptions {
  fn from(map: Map<String, Value>) -> Self {
    Self(map)
  }
}
