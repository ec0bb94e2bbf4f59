//! Build a resource graph from a workflow definition.

use std::collections::HashSet;
use std::path::Path;

use flowstate_graph::ResourceGraph;
use flowstate_resource::{CommandResource, FileResource};
use tracing::debug;

use crate::error::ConfigError;
use crate::workflow::WorkflowDef;

/// Build the graph of a workflow whose file lives in `base_dir`.
///
/// Every task becomes a command resource and every `creates` path a file
/// resource produced by that task. The task's own state covers the content
/// of what it creates, so a deleted or edited output re-runs its producer.
/// A `depends` entry naming a task or a created file links to it; any other
/// entry is an input file that must already exist. A workflow whose
/// dependencies form a cycle is rejected.
pub fn load_graph(def: &WorkflowDef, base_dir: &Path) -> Result<ResourceGraph, ConfigError> {
  let mut graph = ResourceGraph::new(def.resolve_root(base_dir));

  for (index, task) in def.tasks.iter().enumerate() {
    if task.command.trim().is_empty() {
      return Err(ConfigError::EmptyCommand { index });
    }
    let name = task.resource_name();
    let mut command = CommandResource::new(&task.command);
    if let Some(creates) = &task.creates {
      command = command.creating(creates);
    }
    graph.register(name, command)?;

    if let Some(creates) = &task.creates {
      graph.register(creates.as_str(), FileResource::new(creates))?;
      graph.add_dependency(creates, name)?;
    }
  }

  let declared: HashSet<&str> = def
    .tasks
    .iter()
    .flat_map(|task| std::iter::once(task.resource_name()).chain(task.creates.as_deref()))
    .collect();

  for task in &def.tasks {
    for dependency in &task.depends {
      if !declared.contains(dependency.as_str()) && graph.id(dependency).is_none() {
        debug!(input = %dependency, "registering input file");
        graph.register(dependency.as_str(), FileResource::input(dependency))?;
      }
      graph.add_dependency(task.resource_name(), dependency)?;
    }
  }

  graph.validate()?;
  debug!(resources = graph.len(), "workflow graph loaded");
  Ok(graph)
}
