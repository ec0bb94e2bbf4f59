use std::path::{Path, PathBuf};

/// Borrowed view of the owning graph handed to every resource call.
///
/// Resources never hold a reference to their graph. Whatever graph-wide
/// configuration they need (their registered name, the shared root directory)
/// arrives through this context for the duration of a single call.
#[derive(Debug, Clone, Copy)]
pub struct ResourceContext<'a> {
  name: &'a str,
  root_directory: &'a Path,
}

impl<'a> ResourceContext<'a> {
  pub fn new(name: &'a str, root_directory: &'a Path) -> Self {
    Self {
      name,
      root_directory,
    }
  }

  /// The name the resource was registered under.
  pub fn name(&self) -> &'a str {
    self.name
  }

  /// Root directory shared by every resource of the graph.
  pub fn root_directory(&self) -> &'a Path {
    self.root_directory
  }

  /// Resolve a path relative to the root directory. Absolute paths are
  /// returned unchanged.
  pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
    self.root_directory.join(path)
  }
}
