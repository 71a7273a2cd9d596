use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::json;
use slabflow_config::{AdsorbateSpec, WorkflowOptions};
use slabflow_runtime::{ActionOutcome, RuntimeDelta, TaskAction, TaskContext};
use slabflow_workflow::{NodeSpec, TaskError};
use tracing::info;

use super::{AdsorbateRelax, action, adsorbate_node_id, input, payload};
use crate::collaborators::Collaborators;
use crate::models::{SimulationKind, SimulationRequest, StageResult, Structure};

/// Relaxes one slab and expands into a node per adsorbate placement.
///
/// Static inputs: `miller_index`, `slab`, `adsorbates`, `options`.
pub struct SlabRelax {
  collaborators: Collaborators,
}

impl SlabRelax {
  pub fn new(collaborators: Collaborators) -> Self {
    Self { collaborators }
  }
}

#[async_trait]
impl TaskAction for SlabRelax {
  fn name(&self) -> &str {
    "slab-relax"
  }

  async fn run(&self, ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    let miller_index: String = input(&ctx, "miller_index")?;
    let slab: Structure = input(&ctx, "slab")?;
    let adsorbates: Vec<AdsorbateSpec> = input(&ctx, "adsorbates")?;
    let options: WorkflowOptions = input(&ctx, "options")?;

    let simulation = self
      .collaborators
      .simulator
      .run(SimulationRequest {
        kind: SimulationKind::Slab,
        structure: slab,
        parameters: options.clone(),
      })
      .await?;

    let generator = &self.collaborators.generator;
    let placements = try_join_all(
      adsorbates
        .iter()
        .map(|a| generator.adsorbate_placements(&simulation.final_structure, &a.molecule)),
    )
    .await?;

    let mut delta = RuntimeDelta::new();
    for (adsorbate, structures) in adsorbates.iter().zip(placements) {
      for (n, placement) in structures.into_iter().enumerate() {
        delta.push(
          NodeSpec::new(
            adsorbate_node_id(&miller_index, &adsorbate.name, n),
            action(AdsorbateRelax::new(self.collaborators.clone())),
          )
          .depends_on(ctx.node_id.as_str())
          .with_inputs(json!({
            "miller_index": miller_index,
            "adsorbate": adsorbate.name,
            "placement": placement.tag,
            "structure": placement.structure,
            "options": options,
          }))
          .with_timeout_ms(options.timeout_ms()),
        );
      }
    }

    info!(
      node_id = %ctx.node_id,
      energy = simulation.energy,
      placements = delta.len(),
      "slab_relaxed"
    );

    let result = payload(&StageResult::Slab {
      miller_index,
      simulation,
    })?;
    Ok(ActionOutcome::expanding(result, delta))
  }
}
