use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ResultSink, SinkError};

/// Keeps written documents in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
  documents: Mutex<Vec<serde_json::Value>>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  /// Documents written so far, oldest first.
  pub fn documents(&self) -> Vec<serde_json::Value> {
    match self.documents.lock() {
      Ok(documents) => documents.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }
}

#[async_trait]
impl ResultSink for MemorySink {
  async fn write(&self, document: &serde_json::Value) -> Result<(), SinkError> {
    let mut documents = match self.documents.lock() {
      Ok(documents) => documents,
      Err(poisoned) => poisoned.into_inner(),
    };
    documents.push(document.clone());
    Ok(())
  }
}
