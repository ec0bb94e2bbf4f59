//! Content fingerprints.
//!
//! A fingerprint is the SHA-256 digest of a resource's observable content.
//! Equal fingerprints mean the content is considered unchanged.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::FingerprintError;

/// Chunk size used when hashing streamed content.
pub const BLOCK_SIZE: usize = 1 << 20;

/// Fixed-length content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; Fingerprint::LEN]);

impl Fingerprint {
  /// Digest length in bytes.
  pub const LEN: usize = 32;

  pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
    Self(bytes)
  }

  /// Decode a fingerprint from raw digest bytes (e.g. a database blob).
  pub fn from_slice(bytes: &[u8]) -> Result<Self, FingerprintError> {
    let digest: [u8; Self::LEN] =
      bytes
        .try_into()
        .map_err(|_| FingerprintError::InvalidLength {
          expected: Self::LEN,
          actual: bytes.len(),
        })?;
    Ok(Self(digest))
  }

  /// Decode a fingerprint from its lowercase hex form.
  pub fn from_hex(s: &str) -> Result<Self, FingerprintError> {
    let bytes = hex::decode(s)?;
    Self::from_slice(&bytes)
  }

  /// Fingerprint of an in-memory byte string.
  pub fn of_bytes(data: impl AsRef<[u8]>) -> Self {
    Self(Sha256::digest(data.as_ref()).into())
  }

  /// Fingerprint of a stream, read in [`BLOCK_SIZE`] chunks so that peak
  /// memory stays bounded regardless of the content size.
  pub async fn from_reader<R>(mut reader: R) -> std::io::Result<Self>
  where
    R: AsyncRead + Unpin,
  {
    let mut hasher = Sha256::new();
    let mut block = vec![0u8; BLOCK_SIZE];
    loop {
      let read = reader.read(&mut block).await?;
      if read == 0 {
        break;
      }
      hasher.update(&block[..read]);
    }
    Ok(Self(hasher.finalize().into()))
  }

  pub fn as_bytes(&self) -> &[u8; Self::LEN] {
    &self.0
  }

  pub fn to_hex(&self) -> String {
    hex::encode(self.0)
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

impl fmt::Debug for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Fingerprint({})", self.to_hex())
  }
}

impl Serialize for Fingerprint {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_hex())
  }
}

impl<'de> Deserialize<'de> for Fingerprint {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Fingerprint::from_hex(&s).map_err(serde::de::Error::custom)
  }
}
