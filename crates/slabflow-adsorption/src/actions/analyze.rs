use std::collections::BTreeMap;

use async_trait::async_trait;
use slabflow_runtime::{ActionOutcome, TaskAction, TaskContext};
use slabflow_workflow::TaskError;
use tracing::info;

use super::{OPTIMIZE_BULK, input, payload, stored};
use crate::collaborators::Collaborators;
use crate::models::{
  AdsorbateEnergy, AdsorptionAnalysis, FailedBranch, SlabEnergy, StageResult, Structure,
};

/// Collects every energy computed under the bulk optimization and writes
/// the analysis document to the result sink.
///
/// Runs as an aggregation over `optimize-bulk`. Static inputs: `name`,
/// `initial_structure`.
pub struct AnalyzeAdsorption {
  collaborators: Collaborators,
}

impl AnalyzeAdsorption {
  pub fn new(collaborators: Collaborators) -> Self {
    Self { collaborators }
  }
}

#[async_trait]
impl TaskAction for AnalyzeAdsorption {
  fn name(&self) -> &str {
    "analyze-adsorption"
  }

  async fn run(&self, ctx: TaskContext) -> Result<ActionOutcome, TaskError> {
    let subtree = ctx
      .subtree
      .as_ref()
      .ok_or_else(|| TaskError::validation("adsorption analysis must run as an aggregation"))?;

    let StageResult::Bulk {
      simulation: bulk, ..
    } = stored::<StageResult>(&ctx, OPTIMIZE_BULK)?
    else {
      return Err(TaskError::validation(format!(
        "node '{}' did not produce a bulk result",
        OPTIMIZE_BULK
      )));
    };

    let mut slab_energies = BTreeMap::new();
    let mut adsorbate_energies = Vec::new();
    let mut task_ids = Vec::with_capacity(subtree.completed.len());

    for node_id in &subtree.completed {
      match stored::<StageResult>(&ctx, node_id)? {
        StageResult::Slab {
          miller_index,
          simulation,
        } => {
          slab_energies.insert(
            miller_index,
            SlabEnergy {
              node_id: node_id.clone(),
              energy: simulation.energy,
            },
          );
        }
        StageResult::Adsorbate {
          miller_index,
          adsorbate,
          placement,
          simulation,
        } => adsorbate_energies.push(AdsorbateEnergy {
          node_id: node_id.clone(),
          miller_index,
          adsorbate,
          placement,
          energy: simulation.energy,
          relative_energy: None,
        }),
        StageResult::Bulk { .. } => continue,
      }
      task_ids.push(node_id.clone());
    }

    for entry in &mut adsorbate_energies {
      entry.relative_energy = slab_energies
        .get(&entry.miller_index)
        .map(|slab: &SlabEnergy| entry.energy - slab.energy);
    }

    let failed: Vec<FailedBranch> = subtree
      .failed
      .iter()
      .map(|(node_id, error)| FailedBranch {
        node_id: node_id.clone(),
        error: error.clone(),
      })
      .collect();

    let analysis = AdsorptionAnalysis {
      name: input(&ctx, "name")?,
      initial_structure: input::<Structure>(&ctx, "initial_structure")?,
      optimized_structure: bulk.final_structure,
      bulk_energy: bulk.energy,
      slab_energies,
      adsorbate_energies,
      task_ids,
      failed,
    };
    let document = payload(&analysis)?;

    self
      .collaborators
      .sink
      .write(&document)
      .await
      .map_err(|e| TaskError::sink(e.to_string()))?;

    info!(
      node_id = %ctx.node_id,
      simulations = analysis.task_ids.len(),
      failed = analysis.failed.len(),
      "adsorption_analysis_complete"
    );

    Ok(ActionOutcome::terminal(document))
  }
}
