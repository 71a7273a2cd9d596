use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::options::WorkflowOptions;

/// An adsorbate molecule to place on a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdsorbateSpec {
  /// Short label used in node ids, e.g. "CO".
  pub name: String,
  /// Molecule description, passed to the structure generator as-is.
  pub molecule: serde_json::Value,
}

/// Miller index key (e.g. "111") to the adsorbates placed on that surface.
pub type AdsorptionConfig = BTreeMap<String, Vec<AdsorbateSpec>>;

/// Where the aggregated adsorption document is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
  JsonFile { path: PathBuf },
  Sqlite { url: String },
}

impl Default for SinkConfig {
  fn default() -> Self {
    SinkConfig::JsonFile {
      path: PathBuf::from("adsorption.json"),
    }
  }
}

/// A complete adsorption workflow request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdsorptionRequest {
  pub name: String,
  /// Bulk structure to optimize before slab generation.
  pub structure: serde_json::Value,
  pub adsorption_config: AdsorptionConfig,
  #[serde(default)]
  pub options: WorkflowOptions,
  #[serde(default)]
  pub sink: SinkConfig,
}
