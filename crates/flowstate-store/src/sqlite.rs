use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowstate_resource::Fingerprint;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::{StateBatch, StateRecord, StateStore, StoreError};

/// SQLite-based state store. A commit is a single transaction.
pub struct SqliteStateStore {
  pool: SqlitePool,
}

impl SqliteStateStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) a database file and run migrations.
  pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::new()
      .filename(path.as_ref())
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect_with(options)
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Create the state table if it does not exist.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            CREATE TABLE IF NOT EXISTS resource_states (
              name TEXT PRIMARY KEY NOT NULL,
              fingerprint BLOB NOT NULL,
              committed_at TEXT NOT NULL
            )
            "#,
    )
    .execute(&self.pool)
    .await?;

    Ok(())
  }
}

fn decode_record(
  name: &str,
  fingerprint: Vec<u8>,
  committed_at: DateTime<Utc>,
) -> Result<StateRecord, StoreError> {
  let fingerprint = Fingerprint::from_slice(&fingerprint).map_err(|e| StoreError::Corrupt {
    message: format!("resource '{}': {}", name, e),
  })?;
  Ok(StateRecord {
    fingerprint,
    committed_at,
  })
}

#[async_trait]
impl StateStore for SqliteStateStore {
  async fn get(&self, name: &str) -> Result<Option<StateRecord>, StoreError> {
    let row: Option<(Vec<u8>, DateTime<Utc>)> = sqlx::query_as(
      r#"
            SELECT fingerprint, committed_at
            FROM resource_states
            WHERE name = ?
            "#,
    )
    .bind(name)
    .fetch_optional(&self.pool)
    .await?;

    row
      .map(|(fingerprint, committed_at)| decode_record(name, fingerprint, committed_at))
      .transpose()
  }

  async fn commit(&self, batch: StateBatch) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;

    for (name, record) in batch.into_records(Utc::now()) {
      sqlx::query(
        r#"
            INSERT INTO resource_states (name, fingerprint, committed_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE
            SET fingerprint = excluded.fingerprint, committed_at = excluded.committed_at
            "#,
      )
      .bind(&name)
      .bind(record.fingerprint.as_bytes().as_slice())
      .bind(record.committed_at)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn list(&self) -> Result<Vec<(String, StateRecord)>, StoreError> {
    let rows: Vec<(String, Vec<u8>, DateTime<Utc>)> = sqlx::query_as(
      r#"
            SELECT name, fingerprint, committed_at
            FROM resource_states
            ORDER BY name ASC
            "#,
    )
    .fetch_all(&self.pool)
    .await?;

    rows
      .into_iter()
      .map(|(name, fingerprint, committed_at)| {
        let record = decode_record(&name, fingerprint, committed_at)?;
        Ok((name, record))
      })
      .collect()
  }
}
