//! Run outcomes returned to the caller.

use serde::{Deserialize, Serialize};

/// Lifecycle of a run.
///
/// `Planning -> Executing -> Committing -> Done`, with `Failed` reachable
/// from `Executing` or `Committing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
  Planning,
  Executing,
  Committing,
  Done,
  Failed,
}

/// Why a resource had to be (re)applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
  /// Nothing was ever committed for this resource.
  NoPreviousState,
  /// The current fingerprint differs from the committed one.
  ContentChanged,
  /// An upstream producer was applied in this run.
  UpstreamStale,
  /// The current state could not be read.
  StateUnavailable,
}

/// Final outcome of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  /// Unchanged and consistent with its producers; not applied.
  Fresh,
  /// Applied successfully; its new state is part of the commit.
  Applied,
  /// Applying it, or reading a required state, failed.
  Failed,
  /// Not attempted: a producer failed or the run was cancelled.
  Skipped,
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Succeeded,
  Failed,
  Cancelled,
}

/// Outcome of a single resource within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
  pub name: String,
  pub kind: String,
  pub outcome: Outcome,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<StaleReason>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

/// Result of a complete run, resources listed in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
  pub run_id: String,
  pub status: RunStatus,
  /// Whether the applied states were committed to the store.
  pub committed: bool,
  pub resources: Vec<ResourceReport>,
}

impl RunReport {
  pub fn outcome(&self, name: &str) -> Option<Outcome> {
    self
      .resources
      .iter()
      .find(|r| r.name == name)
      .map(|r| r.outcome)
  }

  pub fn is_success(&self) -> bool {
    self.status == RunStatus::Succeeded
  }

  /// Names of resources with the given outcome, in registration order.
  pub fn with_outcome(&self, outcome: Outcome) -> Vec<&str> {
    self
      .resources
      .iter()
      .filter(|r| r.outcome == outcome)
      .map(|r| r.name.as_str())
      .collect()
  }

  pub fn failed(&self) -> Vec<&str> {
    self.with_outcome(Outcome::Failed)
  }

  pub fn skipped(&self) -> Vec<&str> {
    self.with_outcome(Outcome::Skipped)
  }

  pub fn applied(&self) -> Vec<&str> {
    self.with_outcome(Outcome::Applied)
  }
}
