//! Run events and notifiers for observability.
//!
//! Events are emitted while a run progresses so consumers can stream
//! progress, persist history, or drive a UI.

use flowstate_resource::Fingerprint;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::report::{RunPhase, RunStatus, StaleReason};

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEvent {
  /// A run has started.
  RunStarted { run_id: String, resources: usize },

  /// The run moved to a new phase.
  PhaseChanged { run_id: String, phase: RunPhase },

  /// A stale resource is being applied.
  ResourceStarted {
    run_id: String,
    resource: String,
    reason: StaleReason,
  },

  /// A resource was found unchanged.
  ResourceFresh { run_id: String, resource: String },

  /// A resource was applied and its new state staged.
  ResourceApplied {
    run_id: String,
    resource: String,
    fingerprint: Fingerprint,
  },

  /// A resource failed.
  ResourceFailed {
    run_id: String,
    resource: String,
    error: String,
  },

  /// A resource was not attempted.
  ResourceSkipped {
    run_id: String,
    resource: String,
    reason: String,
  },

  /// The run has finished.
  RunFinished { run_id: String, status: RunStatus },
}

/// Trait for receiving run events.
///
/// The scheduler calls `notify` for each event; implementations decide what
/// to do with them.
pub trait RunNotifier: Send + Sync {
  fn notify(&self, event: RunEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl RunNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls a run; volume is a handful of
/// events per resource.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl RunNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}

impl<N: RunNotifier + ?Sized> RunNotifier for std::sync::Arc<N> {
  fn notify(&self, event: RunEvent) {
    (**self).notify(event);
  }
}
