use std::path::PathBuf;

use flowstate_graph::GraphError;

/// Errors raised while reading a workflow or building its graph.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read workflow '{}': {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid workflow definition: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("task #{index} has an empty command")]
  EmptyCommand { index: usize },

  #[error(transparent)]
  Graph(#[from] GraphError),
}
