use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tracing::debug;

use crate::context::ResourceContext;
use crate::error::ResourceError;
use crate::fingerprint::Fingerprint;
use crate::resource::Resource;

/// A file on disk, resolved against the graph's root directory.
///
/// The state is the streamed hash of the file's bytes. Applying a file is a
/// no-op: files are produced by the task they depend on.
#[derive(Debug, Clone)]
pub struct FileResource {
  path: PathBuf,
  must_exist: bool,
}

impl FileResource {
  /// A file that may be absent before its producer runs.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      must_exist: false,
    }
  }

  /// A source file with no producer; it must exist for the run to use it.
  pub fn input(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      must_exist: true,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[async_trait]
impl Resource for FileResource {
  fn kind(&self) -> &'static str {
    "file"
  }

  async fn current_state(&self, ctx: &ResourceContext<'_>) -> Result<Fingerprint, ResourceError> {
    let path = ctx.resolve(&self.path);
    let file = File::open(&path).await.map_err(|e| {
      let message = if e.kind() == ErrorKind::NotFound {
        format!("file not found: {}", path.display())
      } else {
        format!("failed to open {}: {}", path.display(), e)
      };
      ResourceError::state_unavailable(ctx.name(), message)
    })?;

    let fingerprint = Fingerprint::from_reader(file).await.map_err(|e| {
      ResourceError::state_unavailable(
        ctx.name(),
        format!("failed to read {}: {}", path.display(), e),
      )
    })?;

    debug!(resource = %ctx.name(), path = %path.display(), fingerprint = %fingerprint, "file_hashed");
    Ok(fingerprint)
  }

  fn must_exist(&self) -> bool {
    self.must_exist
  }
}
