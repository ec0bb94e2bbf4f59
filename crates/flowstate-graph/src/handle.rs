use std::path::Path;
use std::sync::Arc;

use flowstate_resource::{Fingerprint, Resource, ResourceContext};
use flowstate_store::StateStore;

use crate::error::SyncError;
use crate::graph::{ResourceGraph, ResourceId};

/// Non-owning handle to a registered resource: the graph plus an index.
#[derive(Clone, Copy)]
pub struct ResourceHandle<'g> {
  graph: &'g ResourceGraph,
  id: ResourceId,
}

impl<'g> ResourceHandle<'g> {
  pub(crate) fn new(graph: &'g ResourceGraph, id: ResourceId) -> Self {
    Self { graph, id }
  }

  pub fn id(&self) -> ResourceId {
    self.id
  }

  pub fn name(&self) -> &'g str {
    self.graph.name(self.id)
  }

  pub fn kind(&self) -> &'static str {
    self.graph.resource(self.id).kind()
  }

  pub fn resource(&self) -> &'g Arc<dyn Resource> {
    self.graph.resource(self.id)
  }

  pub fn root_directory(&self) -> &'g Path {
    self.graph.root_directory()
  }

  pub fn context(&self) -> ResourceContext<'g> {
    self.graph.context(self.id)
  }

  /// Producers this resource depends on.
  pub fn dependencies(&self) -> impl Iterator<Item = ResourceHandle<'g>> + 'g {
    let graph = self.graph;
    graph
      .dependencies(self.id)
      .iter()
      .map(move |&id| ResourceHandle::new(graph, id))
  }

  /// Compute the current state. Not memoized; the scheduler caches per run.
  pub async fn current_state(&self) -> Result<Fingerprint, SyncError> {
    let ctx = self.context();
    Ok(self.resource().current_state(&ctx).await?)
  }

  /// State committed at the end of the last successful run.
  ///
  /// Fails with [`SyncError::UnknownResource`] when nothing was ever committed
  /// under this name.
  pub async fn previous_state(&self, store: &dyn StateStore) -> Result<Fingerprint, SyncError> {
    store
      .get(self.name())
      .await?
      .map(|record| record.fingerprint)
      .ok_or_else(|| SyncError::UnknownResource {
        name: self.name().to_string(),
      })
  }

  /// Whether the previous and current states match.
  ///
  /// A first run surfaces as [`SyncError::UnknownResource`]; callers should
  /// treat it as out of sync rather than abort.
  pub async fn is_in_sync(&self, store: &dyn StateStore) -> Result<bool, SyncError> {
    let previous = self.previous_state(store).await?;
    let current = self.current_state().await?;
    Ok(previous == current)
  }
}

impl std::fmt::Debug for ResourceHandle<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.name(), self.id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use flowstate_resource::ResourceError;
  use flowstate_store::{MemoryStateStore, StateBatch};

  #[derive(Debug)]
  struct Fixed(&'static [u8]);

  #[async_trait]
  impl Resource for Fixed {
    fn kind(&self) -> &'static str {
      "fixed"
    }

    async fn current_state(&self, _ctx: &ResourceContext<'_>) -> Result<Fingerprint, ResourceError> {
      Ok(Fingerprint::of_bytes(self.0))
    }
  }

  #[derive(Debug)]
  struct Unreadable;

  #[async_trait]
  impl Resource for Unreadable {
    fn kind(&self) -> &'static str {
      "unreadable"
    }

    async fn current_state(&self, ctx: &ResourceContext<'_>) -> Result<Fingerprint, ResourceError> {
      Err(ResourceError::state_unavailable(ctx.name(), "gone"))
    }
  }

  #[tokio::test]
  async fn test_first_run_is_unknown_resource() {
    let mut graph = ResourceGraph::new("/work");
    graph.register("a", Fixed(b"a")).unwrap();
    let store = MemoryStateStore::new();

    let err = graph.get("a").unwrap().is_in_sync(&store).await.unwrap_err();
    assert!(err.is_first_run());
  }

  #[tokio::test]
  async fn test_in_sync_compares_previous_and_current() {
    let mut graph = ResourceGraph::new("/work");
    graph.register("a", Fixed(b"a")).unwrap();
    graph.register("b", Fixed(b"b")).unwrap();

    let store = MemoryStateStore::new();
    let mut batch = StateBatch::new();
    batch.put("a", Fingerprint::of_bytes(b"a"));
    batch.put("b", Fingerprint::of_bytes(b"stale"));
    store.commit(batch).await.unwrap();

    assert!(graph.get("a").unwrap().is_in_sync(&store).await.unwrap());
    assert!(!graph.get("b").unwrap().is_in_sync(&store).await.unwrap());
  }

  #[tokio::test]
  async fn test_unreadable_state_propagates() {
    let mut graph = ResourceGraph::new("/work");
    graph.register("a", Unreadable).unwrap();

    let store = MemoryStateStore::new();
    let mut batch = StateBatch::new();
    batch.put("a", Fingerprint::of_bytes(b"a"));
    store.commit(batch).await.unwrap();

    let err = graph.get("a").unwrap().is_in_sync(&store).await.unwrap_err();
    assert!(matches!(
      err,
      SyncError::State(ResourceError::StateUnavailable { .. })
    ));
  }

  #[test]
  fn test_dependencies_iterate_handles() {
    let mut graph = ResourceGraph::new("/work");
    graph.register("a", Fixed(b"a")).unwrap();
    graph.register("b", Fixed(b"b")).unwrap();
    graph.add_dependency("b", "a").unwrap();

    let b = graph.get("b").unwrap();
    let deps: Vec<&str> = b.dependencies().map(|h| h.name()).collect();
    assert_eq!(deps, vec!["a"]);
    assert_eq!(b.kind(), "fixed");
  }
}
