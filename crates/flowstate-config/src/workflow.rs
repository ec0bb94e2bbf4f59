use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A workflow as written on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDef {
  /// Directory commands run in and relative paths resolve against. A
  /// relative value is taken relative to the workflow file.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub root_directory: Option<PathBuf>,
  pub tasks: Vec<TaskDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  pub command: String,
  /// File produced by the command.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub creates: Option<String>,
  /// Task names, created files or existing input files this task reads.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub depends: Vec<String>,
}

impl TaskDef {
  /// Name the task is registered under: its `name`, or the command itself.
  pub fn resource_name(&self) -> &str {
    self.name.as_deref().unwrap_or(&self.command)
  }
}

impl WorkflowDef {
  pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&json)
  }

  /// Root directory of the workflow, given the directory holding its file.
  pub fn resolve_root(&self, base_dir: &Path) -> PathBuf {
    match &self.root_directory {
      Some(root) if root.is_absolute() => root.clone(),
      Some(root) => base_dir.join(root),
      None => base_dir.to_path_buf(),
    }
  }
}
