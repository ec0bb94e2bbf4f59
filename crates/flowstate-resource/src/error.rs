use thiserror::Error;

/// Errors reported by resource kinds.
///
/// Variants are cloneable so a failed state observation can be memoized for
/// the rest of a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
  /// The underlying content could not be read.
  #[error("state of resource '{name}' is unavailable: {message}")]
  StateUnavailable { name: String, message: String },

  /// The resource's apply step failed.
  #[error("apply failed for resource '{name}': {message}")]
  Apply { name: String, message: String },
}

impl ResourceError {
  pub fn state_unavailable(name: impl Into<String>, message: impl Into<String>) -> Self {
    Self::StateUnavailable {
      name: name.into(),
      message: message.into(),
    }
  }

  pub fn apply(name: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Apply {
      name: name.into(),
      message: message.into(),
    }
  }

  /// Name of the resource the error belongs to.
  pub fn resource_name(&self) -> &str {
    match self {
      Self::StateUnavailable { name, .. } | Self::Apply { name, .. } => name,
    }
  }
}

/// Errors decoding a stored fingerprint.
#[derive(Debug, Error)]
pub enum FingerprintError {
  #[error("invalid fingerprint hex: {0}")]
  InvalidHex(#[from] hex::FromHexError),

  #[error("invalid fingerprint length: expected {expected} bytes, got {actual}")]
  InvalidLength { expected: usize, actual: usize },
}
