use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::types::Json;
use tracing::info;

use crate::{AdsorptionRecord, ResultSink, SinkError};

/// SQLite-backed sink writing to the `adsorption` table.
pub struct SqliteSink {
  pool: SqlitePool,
  name: String,
}

impl SqliteSink {
  /// Create a sink over an existing pool. The table must already exist; see
  /// [`SqliteSink::create_table`].
  pub fn new(pool: SqlitePool, name: impl Into<String>) -> Self {
    Self {
      pool,
      name: name.into(),
    }
  }

  /// Connect to `url`, creating the database file and table if needed.
  pub async fn connect(url: &str, name: impl Into<String>) -> Result<Self, SinkError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    let sink = Self::new(pool, name);
    sink.create_table().await?;
    Ok(sink)
  }

  pub async fn create_table(&self) -> Result<(), SinkError> {
    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS adsorption (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        document TEXT NOT NULL,
        created_at TEXT NOT NULL
      )
      "#,
    )
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  /// Records written under this sink's name, oldest first.
  pub async fn list(&self) -> Result<Vec<AdsorptionRecord>, SinkError> {
    let records = sqlx::query_as(
      r#"
      SELECT id, name, document, created_at
      FROM adsorption
      WHERE name = ?
      ORDER BY created_at ASC
      "#,
    )
    .bind(&self.name)
    .fetch_all(&self.pool)
    .await?;

    Ok(records)
  }
}

#[async_trait]
impl ResultSink for SqliteSink {
  async fn write(&self, document: &serde_json::Value) -> Result<(), SinkError> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
      r#"
      INSERT INTO adsorption (id, name, document, created_at)
      VALUES (?, ?, ?, ?)
      "#,
    )
    .bind(&id)
    .bind(&self.name)
    .bind(Json(document))
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    info!(id = %id, name = %self.name, "result_written");
    Ok(())
  }
}
