//! Slabflow Config
//!
//! This crate contains the serializable request types for slabflow. A request
//! describes one adsorption workflow run before it is turned into a task graph:
//! the bulk structure, which surface orientations to study, which adsorbates
//! to place on them, and where the aggregated result should be written.
//!
//! Requests are loaded from JSON files (via the CLI) and handed to the
//! adsorption workflow builder, which seeds the runtime graph.
//!
//! Options are intentionally opaque: the core never interprets keys it does
//! not know about and forwards the whole map into every task's static inputs.

mod options;
mod request;

pub use options::{
  CENTER_SLAB, CONCURRENCY_LIMIT, MAX_NORMAL_SEARCH, MIN_SLAB_SIZE, MIN_VACUUM_SIZE, TIMEOUT_MS,
  WorkflowOptions,
};
pub use request::{AdsorbateSpec, AdsorptionConfig, AdsorptionRequest, SinkConfig};
