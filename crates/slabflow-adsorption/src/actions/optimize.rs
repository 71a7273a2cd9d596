use async_trait::async_trait;
use serde_json::json;
use slabflow_config::{AdsorptionConfig, WorkflowOptions};
use slabflow_runtime::{ActionOutcome, RuntimeDelta, TaskAction, TaskContext};
use slabflow_workflow::{NodeSpec, TaskError};
use tracing::info;

use super::{SlabRelax, action, input, payload, slab_node_id};
use crate::collaborators::Collaborators;
use crate::models::{
  GeneratedStructure, SimulationKind, SimulationRequest, SlabParams, StageResult, Structure,
  max_miller_index,
};

/// Relaxes the bulk structure and expands into one slab node per
/// configured miller index.
///
/// Static inputs: `structure`, `adsorption_config`, `options`.
pub struct OptimizeBulk {
  collaborators: Collaborators,
}

impl OptimizeBulk {
  pub fn new(collaborators: Collaborators) -> Self {
    Self { collaborators }
  }
}

#[async_trait]
impl TaskAction for OptimizeBulk {
  fn name(&self) -> &str {
    "optimize-bulk"
  }

  async fn run(&self, ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    let structure: Structure = input(&ctx, "structure")?;
    let config: AdsorptionConfig = input(&ctx, "adsorption_config")?;
    let options: WorkflowOptions = input(&ctx, "options")?;

    let simulation = self
      .collaborators
      .simulator
      .run(SimulationRequest {
        kind: SimulationKind::Bulk,
        structure,
        parameters: options.clone(),
      })
      .await?;

    let max_index = max_miller_index(config.keys().map(String::as_str))
      .map_err(|e| TaskError::validation(e.to_string()))?;
    let slabs = self
      .collaborators
      .generator
      .slabs(
        &simulation.final_structure,
        &SlabParams::from_options(max_index, &options),
      )
      .await?;

    let unique = unique_tags(&slabs);
    if config.keys().any(|key| !unique.contains(key)) {
      return Err(TaskError::validation(format!(
        "Miller index not in generated slab list. Unique slabs are {:?}",
        unique
      )));
    }

    let mut delta = RuntimeDelta::new();
    for (key, adsorbates) in &config {
      // the first slab generated for a key is the one relaxed
      let Some(slab) = slabs.iter().find(|s| &s.tag == key) else {
        continue;
      };
      delta.push(
        NodeSpec::new(slab_node_id(key), action(SlabRelax::new(self.collaborators.clone())))
          .depends_on(ctx.node_id.as_str())
          .with_inputs(json!({
            "miller_index": key,
            "slab": slab.structure,
            "adsorbates": adsorbates,
            "options": options,
          }))
          .with_timeout_ms(options.timeout_ms()),
      );
    }

    info!(
      node_id = %ctx.node_id,
      energy = simulation.energy,
      max_index,
      generated = slabs.len(),
      selected = delta.len(),
      "bulk_optimized"
    );

    let result = payload(&StageResult::Bulk {
      simulation,
      generated_slabs: unique,
    })?;
    Ok(ActionOutcome::expanding(result, delta))
  }
}

/// Slab tags in generation order, without repeats.
fn unique_tags(slabs: &[GeneratedStructure]) -> Vec<String> {
  let mut unique: Vec<String> = Vec::new();
  for slab in slabs {
    if !unique.contains(&slab.tag) {
      unique.push(slab.tag.clone());
    }
  }
  unique
}
