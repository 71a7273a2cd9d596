//! Contracts for the external services the workflow calls out to.

use std::sync::Arc;

use async_trait::async_trait;
use slabflow_store::ResultSink;

use crate::error::{GenerationError, SimulationError};
use crate::models::{
  GeneratedStructure, SimulationDocument, SimulationRequest, SlabParams, Structure,
};

/// Derives slabs and adsorbate placements from a structure.
///
/// Expected to be deterministic for a fixed input.
#[async_trait]
pub trait StructureGenerator: Send + Sync {
  /// Slabs up to `params.max_index`, each tagged with its miller key.
  async fn slabs(
    &self,
    bulk: &Structure,
    params: &SlabParams,
  ) -> Result<Vec<GeneratedStructure>, GenerationError>;

  /// Adsorption configurations of `molecule` on `slab`, tagged by site.
  async fn adsorbate_placements(
    &self,
    slab: &Structure,
    molecule: &serde_json::Value,
  ) -> Result<Vec<GeneratedStructure>, GenerationError>;
}

/// Runs one structural relaxation.
#[async_trait]
pub trait SimulationExecutor: Send + Sync {
  async fn run(&self, request: SimulationRequest) -> Result<SimulationDocument, SimulationError>;
}

/// Everything the adsorption actions need besides their static inputs.
#[derive(Clone)]
pub struct Collaborators {
  pub generator: Arc<dyn StructureGenerator>,
  pub simulator: Arc<dyn SimulationExecutor>,
  pub sink: Arc<dyn ResultSink>,
}

impl Collaborators {
  pub fn new(
    generator: Arc<dyn StructureGenerator>,
    simulator: Arc<dyn SimulationExecutor>,
    sink: Arc<dyn ResultSink>,
  ) -> Self {
    Self {
      generator,
      simulator,
      sink,
    }
  }
}
