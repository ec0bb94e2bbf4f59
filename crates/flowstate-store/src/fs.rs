use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{StateBatch, StateRecord, StateStore, StoreError};

/// Current on-disk document version.
const FORMAT_VERSION: u32 = 1;

/// On-disk document.
#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
  version: u32,
  resources: BTreeMap<String, StateRecord>,
}

/// Filesystem-based state store.
///
/// All records live in a single JSON document at `path`. A commit writes the
/// complete new document to a temporary file next to it, syncs it, and then
/// renames it over the old one, so readers only ever observe the fully
/// pre-commit or fully post-commit document.
pub struct FsStateStore {
  path: PathBuf,
  records: RwLock<HashMap<String, StateRecord>>,
  commit_lock: Mutex<()>,
}

impl FsStateStore {
  /// Open the store at `path`. A missing file is an empty store.
  pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let path = path.into();
    let records = match fs::read(&path).await {
      Ok(bytes) => {
        let document: StateDocument =
          serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            message: format!("{}: {}", path.display(), e),
          })?;
        if document.version != FORMAT_VERSION {
          return Err(StoreError::Corrupt {
            message: format!(
              "{}: unsupported format version {}",
              path.display(),
              document.version
            ),
          });
        }
        document.resources.into_iter().collect()
      }
      Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
      Err(e) => return Err(StoreError::StorageUnavailable(e)),
    };

    debug!(path = %path.display(), records = records.len(), "state_store_opened");

    Ok(Self {
      path,
      records: RwLock::new(records),
      commit_lock: Mutex::new(()),
    })
  }

  /// Location of the state document.
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn temp_path(&self) -> PathBuf {
    let file_name = self
      .path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "state".to_string());
    self.path.with_file_name(format!(".{}.tmp", file_name))
  }

  /// Write the document to a temp file and rename it over the current one.
  /// Once this returns `Ok` the new document is what a reopen will read.
  async fn write_document(&self, document: &StateDocument) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(document).map_err(|e| StoreError::Corrupt {
      message: format!("failed to encode state document: {}", e),
    })?;

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent).await?;
    }

    let temp_path = self.temp_path();
    let mut file = File::create(&temp_path).await?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, &self.path).await {
      let _ = fs::remove_file(&temp_path).await;
      return Err(e.into());
    }
    Ok(())
  }
}

/// Persist a rename inside `path`'s directory.
#[cfg(unix)]
async fn sync_parent(path: &Path) -> std::io::Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    File::open(parent).await?.sync_all().await?;
  }
  Ok(())
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> std::io::Result<()> {
  Ok(())
}

#[async_trait]
impl StateStore for FsStateStore {
  async fn get(&self, name: &str) -> Result<Option<StateRecord>, StoreError> {
    let records = self.records.read().unwrap_or_else(|e| e.into_inner());
    Ok(records.get(name).copied())
  }

  async fn commit(&self, batch: StateBatch) -> Result<(), StoreError> {
    let _guard = self.commit_lock.lock().await;
    let count = batch.len();

    let mut next = {
      let records = self.records.read().unwrap_or_else(|e| e.into_inner());
      records.clone()
    };
    next.extend(batch.into_records(Utc::now()));

    let document = StateDocument {
      version: FORMAT_VERSION,
      resources: next.iter().map(|(k, v)| (k.clone(), *v)).collect(),
    };
    self.write_document(&document).await?;

    // The renamed document is what the next open reads, so the view follows
    // it even if the directory entry cannot be flushed.
    *self.records.write().unwrap_or_else(|e| e.into_inner()) = next;
    if let Err(e) = sync_parent(&self.path).await {
      warn!(path = %self.path.display(), error = %e, "state_dir_sync_failed");
    }

    info!(path = %self.path.display(), records = count, "state_committed");
    Ok(())
  }

  async fn list(&self) -> Result<Vec<(String, StateRecord)>, StoreError> {
    let records = self.records.read().unwrap_or_else(|e| e.into_inner());
    let mut all: Vec<_> = records.iter().map(|(k, v)| (k.clone(), *v)).collect();
    all.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(all)
  }
}
