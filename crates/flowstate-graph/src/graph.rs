use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flowstate_resource::{Resource, ResourceContext};
use tracing::debug;

use crate::error::GraphError;
use crate::handle::ResourceHandle;

/// Index of a resource in its graph. Ids follow registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(usize);

impl ResourceId {
  pub fn index(self) -> usize {
    self.0
  }
}

impl fmt::Display for ResourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

struct Entry {
  name: String,
  resource: Arc<dyn Resource>,
  /// Producers this resource depends on, in declaration order.
  dependencies: Vec<ResourceId>,
  /// Consumers depending on this resource, in declaration order.
  dependents: Vec<ResourceId>,
}

/// Owns all resources of a workflow by name, and the edges between them.
pub struct ResourceGraph {
  root_directory: PathBuf,
  entries: Vec<Entry>,
  index: HashMap<String, ResourceId>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
  Unvisited,
  InProgress,
  Done,
}

impl ResourceGraph {
  /// Create an empty graph whose resources resolve paths against `root_directory`.
  pub fn new(root_directory: impl Into<PathBuf>) -> Self {
    Self {
      root_directory: root_directory.into(),
      entries: Vec::new(),
      index: HashMap::new(),
    }
  }

  /// Register a resource under a unique name.
  ///
  /// A second registration under the same name fails and leaves the first
  /// one in place.
  pub fn register<R>(&mut self, name: impl Into<String>, resource: R) -> Result<ResourceId, GraphError>
  where
    R: Resource + 'static,
  {
    self.register_shared(name, Arc::new(resource))
  }

  /// Register an already shared resource under a unique name.
  pub fn register_shared(
    &mut self,
    name: impl Into<String>,
    resource: Arc<dyn Resource>,
  ) -> Result<ResourceId, GraphError> {
    let name = name.into();
    if self.index.contains_key(&name) {
      return Err(GraphError::DuplicateResource { name });
    }

    let id = ResourceId(self.entries.len());
    debug!(resource = %name, kind = resource.kind(), id = %id, "resource_registered");
    self.index.insert(name.clone(), id);
    self.entries.push(Entry {
      name,
      resource,
      dependencies: Vec::new(),
      dependents: Vec::new(),
    });
    Ok(id)
  }

  /// Declare that `consumer` depends on `producer`. Repeating an edge is a no-op.
  pub fn add_dependency(&mut self, consumer: &str, producer: &str) -> Result<(), GraphError> {
    let consumer_id = self.require(consumer)?;
    let producer_id = self.require(producer)?;
    if consumer_id == producer_id {
      return Err(GraphError::SelfDependency {
        name: consumer.to_string(),
      });
    }

    if self.entries[consumer_id.0]
      .dependencies
      .contains(&producer_id)
    {
      return Ok(());
    }

    self.entries[consumer_id.0].dependencies.push(producer_id);
    self.entries[producer_id.0].dependents.push(consumer_id);
    Ok(())
  }

  fn require(&self, name: &str) -> Result<ResourceId, GraphError> {
    self.id(name).ok_or_else(|| GraphError::UnknownResource {
      name: name.to_string(),
    })
  }

  /// Root directory shared by all resources.
  pub fn root_directory(&self) -> &Path {
    &self.root_directory
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Look up the id of a registered name.
  pub fn id(&self, name: &str) -> Option<ResourceId> {
    self.index.get(name).copied()
  }

  /// Look up a resource by name.
  pub fn get(&self, name: &str) -> Option<ResourceHandle<'_>> {
    self.id(name).map(|id| ResourceHandle::new(self, id))
  }

  /// Handle for an id issued by this graph.
  ///
  /// # Panics
  /// Panics if `id` was not issued by this graph.
  pub fn handle(&self, id: ResourceId) -> ResourceHandle<'_> {
    assert!(id.0 < self.entries.len(), "resource id {} out of range", id);
    ResourceHandle::new(self, id)
  }

  /// All resources in registration order.
  pub fn iter(&self) -> impl Iterator<Item = ResourceHandle<'_>> {
    (0..self.entries.len()).map(move |i| ResourceHandle::new(self, ResourceId(i)))
  }

  pub fn name(&self, id: ResourceId) -> &str {
    &self.entries[id.0].name
  }

  pub fn resource(&self, id: ResourceId) -> &Arc<dyn Resource> {
    &self.entries[id.0].resource
  }

  /// Call context for a resource: its name plus the shared root directory.
  pub fn context(&self, id: ResourceId) -> ResourceContext<'_> {
    ResourceContext::new(&self.entries[id.0].name, &self.root_directory)
  }

  /// Producers `id` depends on.
  pub fn dependencies(&self, id: ResourceId) -> &[ResourceId] {
    &self.entries[id.0].dependencies
  }

  /// Consumers depending on `id`.
  pub fn dependents(&self, id: ResourceId) -> &[ResourceId] {
    &self.entries[id.0].dependents
  }

  /// Check the edge set for cycles.
  pub fn validate(&self) -> Result<(), GraphError> {
    match self.find_cycle() {
      Some(cycle) => Err(GraphError::CyclicDependency { cycle }),
      None => Ok(()),
    }
  }

  /// Depth-first search with three colors. A back edge to an in-progress
  /// resource closes a cycle; the returned path starts and ends with the
  /// same name and follows producer -> consumer edges.
  fn find_cycle(&self) -> Option<Vec<String>> {
    fn visit(
      graph: &ResourceGraph,
      id: ResourceId,
      color: &mut [Color],
      path: &mut Vec<ResourceId>,
    ) -> Option<Vec<String>> {
      color[id.0] = Color::InProgress;
      path.push(id);

      for &next in graph.dependents(id) {
        match color[next.0] {
          Color::InProgress => {
            let start = path.iter().position(|&p| p == next).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..]
              .iter()
              .map(|&p| graph.name(p).to_string())
              .collect();
            cycle.push(graph.name(next).to_string());
            return Some(cycle);
          }
          Color::Unvisited => {
            if let Some(cycle) = visit(graph, next, color, path) {
              return Some(cycle);
            }
          }
          Color::Done => {}
        }
      }

      path.pop();
      color[id.0] = Color::Done;
      None
    }

    let mut color = vec![Color::Unvisited; self.entries.len()];
    let mut path = Vec::new();
    for i in 0..self.entries.len() {
      if color[i] == Color::Unvisited
        && let Some(cycle) = visit(self, ResourceId(i), &mut color, &mut path)
      {
        return Some(cycle);
      }
    }
    None
  }

  /// Total order consistent with every edge: producers come before their
  /// consumers, and among resources with no relative dependency the one
  /// registered first comes first.
  pub fn topological_order(&self) -> Result<Vec<ResourceId>, GraphError> {
    self.validate()?;

    let mut pending: Vec<usize> = self.entries.iter().map(|e| e.dependencies.len()).collect();
    let mut ready: BinaryHeap<Reverse<ResourceId>> = (0..self.entries.len())
      .filter(|&i| pending[i] == 0)
      .map(|i| Reverse(ResourceId(i)))
      .collect();

    let mut order = Vec::with_capacity(self.entries.len());
    while let Some(Reverse(id)) = ready.pop() {
      order.push(id);
      for &consumer in self.dependents(id) {
        pending[consumer.0] -= 1;
        if pending[consumer.0] == 0 {
          ready.push(Reverse(consumer));
        }
      }
    }

    Ok(order)
  }

  /// Partition resources into layers that can run in parallel.
  ///
  /// A resource's layer is one past the deepest layer among its producers,
  /// so no two resources in a layer share an edge and every producer sits in
  /// an earlier layer. Each layer is in registration order.
  pub fn independent_layers(&self) -> Result<Vec<Vec<ResourceId>>, GraphError> {
    let order = self.topological_order()?;

    let mut depth = vec![0usize; self.entries.len()];
    let mut layers: Vec<Vec<ResourceId>> = Vec::new();
    for id in order {
      let layer = self
        .dependencies(id)
        .iter()
        .map(|p| depth[p.0] + 1)
        .max()
        .unwrap_or(0);
      depth[id.0] = layer;
      if layers.len() <= layer {
        layers.resize_with(layer + 1, Vec::new);
      }
      layers[layer].push(id);
    }

    for layer in &mut layers {
      layer.sort();
    }
    Ok(layers)
  }
}

impl fmt::Debug for ResourceGraph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResourceGraph")
      .field("root_directory", &self.root_directory)
      .field(
        "resources",
        &self.entries.iter().map(|e| &e.name).collect::<Vec<_>>(),
      )
      .finish()
  }
}
