//! Staleness classification and dry-run plans.

use flowstate_graph::ResourceId;
use flowstate_resource::{Fingerprint, Resource, ResourceContext, ResourceError};
use serde::{Deserialize, Serialize};

use crate::cache::StateCache;
use crate::report::StaleReason;

/// Whether a resource has to be applied in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Classification {
  Fresh,
  Stale(StaleReason),
}

/// Classify one resource against its previous committed state.
///
/// The current state is only computed (through the run's cache) when
/// staleness is not already decided by a missing record or a stale producer.
/// An unreadable state makes the resource stale unless it must exist, in
/// which case the error is returned and the resource fails.
pub(crate) async fn classify(
  id: ResourceId,
  resource: &dyn Resource,
  ctx: &ResourceContext<'_>,
  previous: Option<Fingerprint>,
  upstream_stale: bool,
  cache: &StateCache,
) -> Result<Classification, ResourceError> {
  let Some(previous) = previous else {
    return Ok(Classification::Stale(StaleReason::NoPreviousState));
  };
  if upstream_stale {
    return Ok(Classification::Stale(StaleReason::UpstreamStale));
  }

  match cache.get_or_compute(id, resource.current_state(ctx)).await {
    Ok(current) if current == previous => Ok(Classification::Fresh),
    Ok(_) => Ok(Classification::Stale(StaleReason::ContentChanged)),
    Err(e) if resource.must_exist() => Err(e),
    Err(_) => Ok(Classification::Stale(StaleReason::StateUnavailable)),
  }
}

/// What a run would do with a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
  Fresh,
  Apply { reason: StaleReason },
  Fail { error: String },
  Skip { blocked_by: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedResource {
  pub name: String,
  pub kind: String,
  #[serde(flatten)]
  pub action: PlannedAction,
}

/// Dry-run classification of every resource, in registration order.
///
/// A plan assumes every stale resource would apply successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
  pub resources: Vec<PlannedResource>,
}

impl Plan {
  pub fn action(&self, name: &str) -> Option<&PlannedAction> {
    self
      .resources
      .iter()
      .find(|r| r.name == name)
      .map(|r| &r.action)
  }

  /// Names of resources that would be applied.
  pub fn to_apply(&self) -> Vec<&str> {
    self
      .resources
      .iter()
      .filter(|r| matches!(r.action, PlannedAction::Apply { .. }))
      .map(|r| r.name.as_str())
      .collect()
  }

  pub fn is_up_to_date(&self) -> bool {
    self
      .resources
      .iter()
      .all(|r| r.action == PlannedAction::Fresh)
  }
}
