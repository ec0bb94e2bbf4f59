//! Scheduler errors.

use flowstate_graph::GraphError;
use flowstate_store::StoreError;

/// Errors that abort a whole run.
///
/// Per-resource problems (apply failures, unreadable state) never surface
/// here; they are reported as outcomes in the [`RunReport`](crate::RunReport).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
  /// The graph cannot be ordered (a cycle). Nothing was applied.
  #[error("invalid resource graph: {0}")]
  Graph(#[from] GraphError),

  /// The state store failed; nothing from this run was committed.
  #[error("state store failed: {0}")]
  Storage(#[from] StoreError),
}
