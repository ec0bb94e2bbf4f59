//! Flowstate Store
//!
//! This crate provides the state store: a durable mapping from resource name
//! to the fingerprint recorded at the end of the last successful run.
//!
//! The [`StateStore`] trait defines the only operations the scheduler needs:
//! - `get` the previous record of a resource (absent on first run)
//! - stage writes into a [`StateBatch`] with `put`
//! - `commit` a batch atomically (all records become visible, or none)
//!
//! Backends: [`MemoryStateStore`], [`FsStateStore`] (a single JSON document
//! replaced by atomic rename) and [`SqliteStateStore`].

mod batch;
mod fs;
mod memory;
mod sqlite;

pub use batch::StateBatch;
pub use fs::FsStateStore;
pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowstate_resource::Fingerprint;
use serde::{Deserialize, Serialize};

/// Error type for storage operations.
///
/// Every variant is fatal to a run: state consistency cannot be guaranteed
/// once the backing medium misbehaves.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The backing file or directory could not be read or written.
  #[error("storage unavailable: {0}")]
  StorageUnavailable(#[from] std::io::Error),

  /// The backing database failed.
  #[error("storage unavailable: database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Stored data could not be decoded.
  #[error("corrupt state store: {message}")]
  Corrupt { message: String },
}

/// The last committed state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
  pub fingerprint: Fingerprint,
  pub committed_at: DateTime<Utc>,
}

/// Storage trait for previous resource states.
///
/// Only one run may use a given backing store at a time; serializing runs is
/// the caller's job.
#[async_trait]
pub trait StateStore: Send + Sync {
  /// Get the last committed record for a resource, or `None` if the resource
  /// never completed a run.
  async fn get(&self, name: &str) -> Result<Option<StateRecord>, StoreError>;

  /// Atomically persist every staged write of the batch.
  async fn commit(&self, batch: StateBatch) -> Result<(), StoreError>;

  /// List all records, ordered by resource name.
  async fn list(&self) -> Result<Vec<(String, StateRecord)>, StoreError>;
}
