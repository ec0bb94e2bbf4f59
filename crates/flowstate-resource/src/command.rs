use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::context::ResourceContext;
use crate::error::ResourceError;
use crate::fingerprint::Fingerprint;
use crate::resource::Resource;

/// Maximum number of stderr bytes carried into an apply error.
const STDERR_TAIL: usize = 2048;

/// A task that runs a shell command in the graph's root directory.
///
/// The state of a command is the hash of its text together with the content
/// of every output it creates. Editing the command, or editing or deleting one
/// of its outputs, makes the task (and everything downstream of it) stale.
#[derive(Debug, Clone)]
pub struct CommandResource {
  command: String,
  outputs: Vec<PathBuf>,
}

impl CommandResource {
  pub fn new(command: impl Into<String>) -> Self {
    Self {
      command: command.into(),
      outputs: Vec::new(),
    }
  }

  /// Declare a file the command produces, relative to the root directory.
  pub fn creating(mut self, path: impl Into<PathBuf>) -> Self {
    self.outputs.push(path.into());
    self
  }

  pub fn command(&self) -> &str {
    &self.command
  }

  pub fn outputs(&self) -> &[PathBuf] {
    &self.outputs
  }

  async fn output_state(
    &self,
    ctx: &ResourceContext<'_>,
    output: &Path,
  ) -> Result<Fingerprint, ResourceError> {
    let path = ctx.resolve(output);
    let file = File::open(&path).await.map_err(|e| {
      let message = if e.kind() == ErrorKind::NotFound {
        format!("output not found: {}", path.display())
      } else {
        format!("failed to open output {}: {}", path.display(), e)
      };
      ResourceError::state_unavailable(ctx.name(), message)
    })?;

    Fingerprint::from_reader(file).await.map_err(|e| {
      ResourceError::state_unavailable(
        ctx.name(),
        format!("failed to read output {}: {}", path.display(), e),
      )
    })
  }
}

#[async_trait]
impl Resource for CommandResource {
  fn kind(&self) -> &'static str {
    "command"
  }

  async fn current_state(&self, ctx: &ResourceContext<'_>) -> Result<Fingerprint, ResourceError> {
    if self.outputs.is_empty() {
      return Ok(Fingerprint::of_bytes(self.command.as_bytes()));
    }

    // Length-prefixed parts so that moving bytes between the command and
    // an output path cannot produce the same digest.
    let mut hasher = Sha256::new();
    hasher.update((self.command.len() as u64).to_le_bytes());
    hasher.update(self.command.as_bytes());
    for output in &self.outputs {
      let path = output.to_string_lossy();
      let fingerprint = self.output_state(ctx, output).await?;
      hasher.update((path.len() as u64).to_le_bytes());
      hasher.update(path.as_bytes());
      hasher.update(fingerprint.as_bytes());
    }

    let fingerprint = Fingerprint::from_bytes(hasher.finalize().into());
    debug!(resource = %ctx.name(), outputs = self.outputs.len(), fingerprint = %fingerprint, "command_hashed");
    Ok(fingerprint)
  }

  async fn apply(&self, ctx: &ResourceContext<'_>) -> Result<(), ResourceError> {
    debug!(resource = %ctx.name(), command = %self.command, "command_started");

    let output = Command::new("sh")
      .arg("-c")
      .arg(&self.command)
      .current_dir(ctx.root_directory())
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|e| ResourceError::apply(ctx.name(), format!("failed to spawn command: {}", e)))?;

    if !output.status.success() {
      let start = output.stderr.len().saturating_sub(STDERR_TAIL);
      let stderr = String::from_utf8_lossy(&output.stderr[start..]);
      let tail = stderr.trim();
      warn!(resource = %ctx.name(), status = %output.status, "command_failed");
      return Err(ResourceError::apply(
        ctx.name(),
        format!("command exited with {}: {}", output.status, tail),
      ));
    }

    Ok(())
  }
}
