use flowstate_resource::ResourceError;
use flowstate_store::StoreError;
use thiserror::Error;

/// Graph construction errors. All of them are fatal before execution starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("resource '{name}' already exists in this graph")]
  DuplicateResource { name: String },

  #[error("unknown resource: {name}")]
  UnknownResource { name: String },

  #[error("resource '{name}' cannot depend on itself")]
  SelfDependency { name: String },

  #[error("cyclic dependency: {}", cycle.join(" -> "))]
  CyclicDependency { cycle: Vec<String> },
}

/// Errors from a sync check of a single resource.
#[derive(Debug, Error)]
pub enum SyncError {
  /// No previous state was ever committed (first run for this name).
  #[error("no previous state recorded for resource '{name}'")]
  UnknownResource { name: String },

  #[error(transparent)]
  State(#[from] ResourceError),

  #[error(transparent)]
  Storage(#[from] StoreError),
}

impl SyncError {
  /// Whether the error only means the resource never completed a run.
  pub fn is_first_run(&self) -> bool {
    matches!(self, Self::UnknownResource { .. })
  }
}
