//! Slabflow Store
//!
//! This crate provides the [`ResultSink`] trait and its implementations. A
//! sink receives the aggregation document produced at the end of an
//! adsorption run and persists it:
//! - [`JsonFileSink`] writes a pretty-printed JSON file
//! - [`SqliteSink`] inserts a row into an `adsorption` table
//! - [`MemorySink`] keeps documents in memory, for tests and dry runs

mod fs;
mod memory;
mod sqlite;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use slabflow_config::SinkConfig;

pub use fs::JsonFileSink;
pub use memory::MemorySink;
pub use sqlite::SqliteSink;
pub use types::AdsorptionRecord;

/// Error type for sink operations.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
  /// Writing to the filesystem failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The document could not be encoded.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Destination for aggregation documents.
#[async_trait]
pub trait ResultSink: Send + Sync {
  async fn write(&self, document: &serde_json::Value) -> Result<(), SinkError>;
}

/// Open the sink described by `config`.
///
/// `name` labels the rows written by database sinks.
pub async fn open_sink(config: &SinkConfig, name: &str) -> Result<Arc<dyn ResultSink>, SinkError> {
  let sink: Arc<dyn ResultSink> = match config {
    SinkConfig::JsonFile { path } => Arc::new(JsonFileSink::new(path.clone())),
    SinkConfig::Sqlite { url } => Arc::new(SqliteSink::connect(url, name).await?),
  };
  Ok(sink)
}
