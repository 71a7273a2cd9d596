use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::{ResultSink, SinkError};

/// Writes each document to a JSON file, replacing earlier contents.
///
/// Parent directories are created automatically.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
  path: PathBuf,
}

impl JsonFileSink {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[async_trait]
impl ResultSink for JsonFileSink {
  async fn write(&self, document: &serde_json::Value) -> Result<(), SinkError> {
    let contents = serde_json::to_string_pretty(document)?;

    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).await?;
    }
    fs::write(&self.path, contents).await?;

    info!(path = %self.path.display(), "result_written");
    Ok(())
  }
}
