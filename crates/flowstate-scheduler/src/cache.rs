//! Per-run memoization of resource states.
//!
//! Computing a state can be expensive (hashing a large file) and the content
//! may be rewritten by a downstream task, so each resource's state is
//! observed at most once before it is applied. A successful apply replaces
//! the entry with the freshly produced state.

use std::future::Future;

use flowstate_graph::ResourceId;
use flowstate_resource::{Fingerprint, ResourceError};
use tokio::sync::Mutex;

type Observation = Result<Fingerprint, ResourceError>;

/// One slot per resource of the graph, each behind its own lock.
pub struct StateCache {
  slots: Vec<Mutex<Option<Observation>>>,
}

impl StateCache {
  pub fn new(len: usize) -> Self {
    Self {
      slots: (0..len).map(|_| Mutex::new(None)).collect(),
    }
  }

  /// Return the memoized observation, computing it on first use.
  ///
  /// Concurrent callers for the same resource wait for the first one.
  pub async fn get_or_compute<F>(&self, id: ResourceId, compute: F) -> Observation
  where
    F: Future<Output = Observation>,
  {
    let mut slot = self.slots[id.index()].lock().await;
    if let Some(observed) = slot.as_ref() {
      return observed.clone();
    }
    let observed = compute.await;
    *slot = Some(observed.clone());
    observed
  }

  /// Replace the observation after the resource was applied.
  pub async fn replace(&self, id: ResourceId, observed: Observation) {
    *self.slots[id.index()].lock().await = Some(observed);
  }

  pub async fn get(&self, id: ResourceId) -> Option<Observation> {
    self.slots[id.index()].lock().await.clone()
  }
}
