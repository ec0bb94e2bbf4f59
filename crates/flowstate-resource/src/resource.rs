use std::fmt;

use async_trait::async_trait;

use crate::context::ResourceContext;
use crate::error::ResourceError;
use crate::fingerprint::Fingerprint;

/// A named node of the dependency graph with an observable content state.
///
/// Implementations are registered into a graph once and shared across the
/// scheduler's workers, hence `Send + Sync`.
#[async_trait]
pub trait Resource: Send + Sync + fmt::Debug {
  /// Short kind label used in logs and reports (e.g. "file", "command").
  fn kind(&self) -> &'static str;

  /// Compute the fingerprint of the resource's current content.
  ///
  /// Fails with [`ResourceError::StateUnavailable`] when the content cannot be
  /// read. Empty content is not an error.
  async fn current_state(&self, ctx: &ResourceContext<'_>) -> Result<Fingerprint, ResourceError>;

  /// Produce the resource. Kinds that are pure inputs keep the default no-op.
  async fn apply(&self, _ctx: &ResourceContext<'_>) -> Result<(), ResourceError> {
    Ok(())
  }

  /// Whether an unreadable state is a failure rather than a reason to re-run.
  fn must_exist(&self) -> bool {
    false
  }
}
