use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// An aggregation document as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AdsorptionRecord {
  pub id: String,
  pub name: String,
  pub document: Json<serde_json::Value>,
  pub created_at: DateTime<Utc>,
}
