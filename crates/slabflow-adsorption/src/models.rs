//! Domain documents exchanged with collaborators and stored as node results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use slabflow_config::WorkflowOptions;
use slabflow_workflow::{NodeId, TaskError};

use crate::error::MillerIndexError;

/// A crystal structure, kept in whatever shape the collaborators use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Structure(pub serde_json::Value);

impl Structure {
  pub fn new(value: serde_json::Value) -> Self {
    Self(value)
  }

  pub fn as_value(&self) -> &serde_json::Value {
    &self.0
  }

  /// Reduced formula, when the document carries one.
  pub fn formula(&self) -> Option<&str> {
    self.0.get("formula").and_then(|f| f.as_str())
  }
}

/// Miller index written as concatenated digits, e.g. `"111"` or `"100"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MillerIndex(Vec<u8>);

impl MillerIndex {
  pub fn digits(&self) -> &[u8] {
    &self.0
  }

  pub fn max_digit(&self) -> u8 {
    self.0.iter().copied().max().unwrap_or(0)
  }
}

impl FromStr for MillerIndex {
  type Err = MillerIndexError;

  fn from_str(key: &str) -> Result<Self, Self::Err> {
    let digits: Option<Vec<u8>> = key
      .chars()
      .map(|c| c.to_digit(10).map(|d| d as u8))
      .collect();
    match digits {
      Some(digits) if !digits.is_empty() => Ok(Self(digits)),
      _ => Err(MillerIndexError {
        key: key.to_string(),
      }),
    }
  }
}

impl fmt::Display for MillerIndex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for digit in &self.0 {
      write!(f, "{}", digit)?;
    }
    Ok(())
  }
}

/// Largest digit across all keys; the search depth for slab generation.
pub fn max_miller_index<'a>(
  keys: impl IntoIterator<Item = &'a str>,
) -> Result<u8, MillerIndexError> {
  let mut max = 0;
  for key in keys {
    max = max.max(key.parse::<MillerIndex>()?.max_digit());
  }
  Ok(max)
}

/// Which stage of the workflow a simulation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationKind {
  Bulk,
  Slab,
  Adsorbate,
}

/// Input for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
  pub kind: SimulationKind,
  pub structure: Structure,
  /// Workflow options, forwarded verbatim.
  pub parameters: WorkflowOptions,
}

/// Output of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationDocument {
  pub final_structure: Structure,
  pub energy: f64,
  /// Anything else the simulator reports.
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Slab generation settings derived from the workflow options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabParams {
  pub max_index: u8,
  pub min_slab_size: f64,
  pub min_vacuum_size: f64,
  pub max_normal_search: u32,
  pub center_slab: bool,
}

impl SlabParams {
  pub fn from_options(max_index: u8, options: &WorkflowOptions) -> Self {
    Self {
      max_index,
      min_slab_size: options.min_slab_size(),
      min_vacuum_size: options.min_vacuum_size(),
      max_normal_search: options.max_normal_search(),
      center_slab: options.center_slab(),
    }
  }
}

/// A structure produced by the generator, tagged with the key that made it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedStructure {
  pub tag: String,
  pub structure: Structure,
}

/// Result payload of each workflow stage, as written to the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageResult {
  Bulk {
    simulation: SimulationDocument,
    /// Unique miller keys of every generated slab.
    generated_slabs: Vec<String>,
  },
  Slab {
    miller_index: String,
    simulation: SimulationDocument,
  },
  Adsorbate {
    miller_index: String,
    adsorbate: String,
    placement: String,
    simulation: SimulationDocument,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabEnergy {
  pub node_id: NodeId,
  pub energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdsorbateEnergy {
  pub node_id: NodeId,
  pub miller_index: String,
  pub adsorbate: String,
  pub placement: String,
  pub energy: f64,
  /// Energy minus the parent slab's energy, if the slab completed.
  pub relative_energy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedBranch {
  pub node_id: NodeId,
  pub error: TaskError,
}

/// The aggregation document written to the result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdsorptionAnalysis {
  pub name: String,
  pub initial_structure: Structure,
  pub optimized_structure: Structure,
  pub bulk_energy: f64,
  pub slab_energies: std::collections::BTreeMap<String, SlabEnergy>,
  pub adsorbate_energies: Vec<AdsorbateEnergy>,
  /// Every simulation node whose result went into this document.
  pub task_ids: Vec<NodeId>,
  pub failed: Vec<FailedBranch>,
}
