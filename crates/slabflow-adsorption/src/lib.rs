//! Slabflow Adsorption
//!
//! This crate turns an [`slabflow_config::AdsorptionRequest`] into a dynamic
//! task graph and provides the actions that run in it:
//!
//! 1. `optimize-bulk` relaxes the bulk structure, generates slabs and adds
//!    one `slab-<key>` node per configured miller index
//! 2. each slab node relaxes its slab and adds one node per adsorbate
//!    placement
//! 3. `analyze-adsorption` waits for everything spawned under the root and
//!    writes the aggregated energies to the configured sink
//!
//! Structure generation and simulation are external collaborators behind the
//! [`StructureGenerator`] and [`SimulationExecutor`] traits. The
//! [`process`] module implements both on top of external programs.

pub mod actions;
mod collaborators;
mod error;
mod models;
pub mod process;
mod workflow;

pub use collaborators::{Collaborators, SimulationExecutor, StructureGenerator};
pub use error::{BuildError, GenerationError, MillerIndexError, ProcessError, SimulationError};
pub use models::{
  AdsorbateEnergy, AdsorptionAnalysis, FailedBranch, GeneratedStructure, MillerIndex,
  SimulationDocument, SimulationKind, SimulationRequest, SlabEnergy, SlabParams, StageResult,
  Structure, max_miller_index,
};
pub use workflow::{AdsorptionWorkflow, adsorption_workflow};
