use async_trait::async_trait;
use slabflow_config::WorkflowOptions;
use slabflow_runtime::{ActionOutcome, TaskAction, TaskContext};
use slabflow_workflow::TaskError;

use super::{input, payload};
use crate::collaborators::Collaborators;
use crate::models::{SimulationKind, SimulationRequest, StageResult, Structure};

/// Relaxes one adsorbate placement.
pub struct AdsorbateRelax {
  collaborators: Collaborators,
}

impl AdsorbateRelax {
  pub fn new(collaborators: Collaborators) -> Self {
    Self { collaborators }
  }
}

#[async_trait]
impl TaskAction for AdsorbateRelax {
  fn name(&self) -> &str {
    "adsorbate-relax"
  }

  async fn run(&self, ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    let structure: Structure = input(&ctx, "structure")?;
    let options: WorkflowOptions = input(&ctx, "options")?;

    let simulation = self
      .collaborators
      .simulator
      .run(SimulationRequest {
        kind: SimulationKind::Adsorbate,
        structure,
        parameters: options,
      })
      .await?;

    let result = payload(&StageResult::Adsorbate {
      miller_index: input(&ctx, "miller_index")?,
      adsorbate: input(&ctx, "adsorbate")?,
      placement: input(&ctx, "placement")?,
      simulation,
    })?;
    Ok(ActionOutcome::terminal(result))
  }
}
