use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::{StateBatch, StateRecord, StateStore, StoreError};

/// In-memory store. Nothing survives the process; used for tests and plans.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
  records: RwLock<HashMap<String, StateRecord>>,
}

impl MemoryStateStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl StateStore for MemoryStateStore {
  async fn get(&self, name: &str) -> Result<Option<StateRecord>, StoreError> {
    let records = self.records.read().unwrap_or_else(|e| e.into_inner());
    Ok(records.get(name).copied())
  }

  async fn commit(&self, batch: StateBatch) -> Result<(), StoreError> {
    let staged = batch.into_records(Utc::now());
    let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
    records.extend(staged);
    Ok(())
  }

  async fn list(&self) -> Result<Vec<(String, StateRecord)>, StoreError> {
    let records = self.records.read().unwrap_or_else(|e| e.into_inner());
    let mut all: Vec<_> = records.iter().map(|(k, v)| (k.clone(), *v)).collect();
    all.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(all)
  }
}
