use std::num::NonZeroUsize;
use std::time::Duration;

/// Configuration for a scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
  /// Maximum number of resources evaluated concurrently within a layer.
  pub max_parallel: usize,
  /// Cancel the run once this much time has elapsed.
  pub timeout: Option<Duration>,
  /// Commit the resources applied before a cancellation instead of nothing.
  pub commit_on_cancel: bool,
}

impl SchedulerConfig {
  /// Run one resource at a time, in dependency order.
  pub fn sequential() -> Self {
    Self {
      max_parallel: 1,
      ..Self::default()
    }
  }
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      max_parallel: std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1),
      timeout: None,
      commit_on_cancel: false,
    }
  }
}
