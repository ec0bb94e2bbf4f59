use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use flowstate_resource::Fingerprint;

use crate::StateRecord;

/// Writes staged for a single atomic commit.
///
/// Putting the same name twice keeps the last fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateBatch {
  entries: BTreeMap<String, Fingerprint>,
}

impl StateBatch {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stage a write.
  pub fn put(&mut self, name: impl Into<String>, fingerprint: Fingerprint) {
    self.entries.insert(name.into(), fingerprint);
  }

  pub fn get(&self, name: &str) -> Option<&Fingerprint> {
    self.entries.get(name)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }

  /// Turn the staged writes into records sharing one commit timestamp.
  pub(crate) fn into_records(self, committed_at: DateTime<Utc>) -> Vec<(String, StateRecord)> {
    self
      .entries
      .into_iter()
      .map(|(name, fingerprint)| {
        (
          name,
          StateRecord {
            fingerprint,
            committed_at,
          },
        )
      })
      .collect()
  }
}

impl FromIterator<(String, Fingerprint)> for StateBatch {
  fn from_iter<I: IntoIterator<Item = (String, Fingerprint)>>(iter: I) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}
