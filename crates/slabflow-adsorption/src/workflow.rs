//! Builds the initial graph of an adsorption run.

use std::collections::HashSet;

use serde_json::json;
use slabflow_config::AdsorptionRequest;
use slabflow_runtime::{RuntimeConfig, RuntimeGraph};
use slabflow_workflow::{GraphDelta, NodeSpec};
use tracing::info;

use crate::actions::{ANALYZE_ADSORPTION, AnalyzeAdsorption, OPTIMIZE_BULK, OptimizeBulk, action};
use crate::collaborators::Collaborators;
use crate::error::BuildError;
use crate::models::MillerIndex;

/// A seeded adsorption graph plus the scheduler settings from its options.
pub struct AdsorptionWorkflow {
  pub name: String,
  pub graph: RuntimeGraph,
  pub runtime_config: RuntimeConfig,
}

/// Seed the graph for `request`.
///
/// The graph starts with two nodes: the bulk optimization root and the
/// analysis node joined over everything the root spawns. Slab and adsorbate
/// nodes are added at run time as their parents complete.
pub fn adsorption_workflow(
  request: &AdsorptionRequest,
  collaborators: Collaborators,
) -> Result<AdsorptionWorkflow, BuildError> {
  if request.adsorption_config.is_empty() {
    return Err(BuildError::EmptyConfig);
  }
  for (key, adsorbates) in &request.adsorption_config {
    key.parse::<MillerIndex>()?;

    // Adsorbate node ids embed the name, so names must be unique per key.
    let mut seen = HashSet::new();
    for adsorbate in adsorbates {
      if !seen.insert(adsorbate.name.as_str()) {
        return Err(BuildError::DuplicateAdsorbate {
          key: key.clone(),
          name: adsorbate.name.clone(),
        });
      }
    }
  }

  let options = &request.options;
  let root = NodeSpec::new(OPTIMIZE_BULK, action(OptimizeBulk::new(collaborators.clone())))
    .with_inputs(json!({
      "structure": request.structure,
      "adsorption_config": request.adsorption_config,
      "options": options,
    }))
    .with_timeout_ms(options.timeout_ms());
  let analyze = NodeSpec::new(ANALYZE_ADSORPTION, action(AnalyzeAdsorption::new(collaborators)))
    .with_inputs(json!({
      "name": request.name,
      "initial_structure": request.structure,
      "options": options,
    }))
    .joining(OPTIMIZE_BULK);

  let graph = RuntimeGraph::seeded(GraphDelta::new().node(root).node(analyze))?;
  let runtime_config = RuntimeConfig {
    max_concurrency: options.concurrency_limit(),
    default_timeout: None,
  };

  info!(
    name = %request.name,
    orientations = request.adsorption_config.len(),
    max_concurrency = runtime_config.max_concurrency,
    "adsorption_workflow_built"
  );

  Ok(AdsorptionWorkflow {
    name: request.name.clone(),
    graph,
    runtime_config,
  })
}
