//! Incremental run of a resource graph.

use std::sync::Arc;

use flowstate_graph::{ResourceGraph, ResourceId};
use flowstate_resource::Fingerprint;
use flowstate_store::{StateBatch, StateStore};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::cache::StateCache;
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::events::{NoopNotifier, RunEvent, RunNotifier};
use crate::plan::{Classification, Plan, PlannedAction, PlannedResource, classify};
use crate::report::{Outcome, ResourceReport, RunPhase, RunReport, RunStatus, StaleReason};

/// Brings a resource graph up to date, applying only what is stale.
///
/// A run walks the graph layer by layer. Within a layer, resources are
/// independent and evaluated concurrently (bounded by
/// [`SchedulerConfig::max_parallel`]). Applied states are staged and committed
/// to the store in a single batch once every layer has finished.
///
/// # Usage
///
/// ```ignore
/// let scheduler = Scheduler::new(graph, store, SchedulerConfig::default());
/// let report = scheduler.run(CancellationToken::new()).await?;
/// ```
pub struct Scheduler<N = NoopNotifier> {
  graph: Arc<ResourceGraph>,
  store: Arc<dyn StateStore>,
  config: SchedulerConfig,
  notifier: Arc<N>,
}

impl Scheduler<NoopNotifier> {
  pub fn new(
    graph: impl Into<Arc<ResourceGraph>>,
    store: Arc<dyn StateStore>,
    config: SchedulerConfig,
  ) -> Self {
    Self {
      graph: graph.into(),
      store,
      config,
      notifier: Arc::new(NoopNotifier),
    }
  }
}

impl<N: RunNotifier + 'static> Scheduler<N> {
  /// Replace the notifier receiving run events.
  pub fn with_notifier<M: RunNotifier + 'static>(self, notifier: M) -> Scheduler<M> {
    Scheduler {
      graph: self.graph,
      store: self.store,
      config: self.config,
      notifier: Arc::new(notifier),
    }
  }

  pub fn graph(&self) -> &ResourceGraph {
    &self.graph
  }

  pub fn store(&self) -> &Arc<dyn StateStore> {
    &self.store
  }

  pub fn config(&self) -> &SchedulerConfig {
    &self.config
  }

  /// Run the graph once.
  ///
  /// Per-resource failures are reported in the returned [`RunReport`]; only
  /// an invalid graph (nothing applied) or a store failure (nothing
  /// committed) abort the run with an error.
  ///
  /// Cancelling `cancel` stops new applies from starting. Applies already in
  /// flight are allowed to finish.
  #[instrument(name = "scheduler_run", skip(self, cancel), fields(resources = self.graph.len()))]
  pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, SchedulerError> {
    let run_id = uuid::Uuid::new_v4().to_string();

    info!(run_id = %run_id, resources = self.graph.len(), "run_started");
    self.notifier.notify(RunEvent::RunStarted {
      run_id: run_id.clone(),
      resources: self.graph.len(),
    });
    self.enter_phase(&run_id, RunPhase::Planning);

    let prepared = self.prepare().await;
    let (layers, previous) = match prepared {
      Ok(prepared) => prepared,
      Err(e) => {
        error!(run_id = %run_id, error = %e, "run_failed");
        self.finish(&run_id, RunPhase::Failed, RunStatus::Failed);
        return Err(e);
      }
    };

    let run_token = cancel.child_token();
    let _deadline = self.config.timeout.map(|timeout| {
      let token = run_token.clone();
      let run_id = run_id.clone();
      Deadline(tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!(run_id = %run_id, timeout = ?timeout, "run_timed_out");
        token.cancel();
      }))
    });

    self.enter_phase(&run_id, RunPhase::Executing);
    let run = Arc::new(RunContext {
      run_id: run_id.clone(),
      graph: self.graph.clone(),
      cache: StateCache::new(self.graph.len()),
      notifier: self.notifier.clone(),
      cancel: run_token.clone(),
      permits: Semaphore::new(self.config.max_parallel.max(1)),
    });

    let mut reports: Vec<Option<ResourceReport>> = vec![None; self.graph.len()];
    let mut batch = StateBatch::new();
    let mut cancelled = false;

    for layer in layers {
      if run_token.is_cancelled() {
        warn!(run_id = %run_id, "run_cancelled");
        cancelled = true;
        break;
      }

      let mut spawned = Vec::with_capacity(layer.len());
      let mut handles = Vec::with_capacity(layer.len());

      for id in layer {
        let dependencies = self.graph.dependencies(id);
        let blocker = dependencies.iter().copied().find(|dep| {
          matches!(
            outcome_of(&reports, *dep),
            Some(Outcome::Failed | Outcome::Skipped)
          )
        });
        if let Some(blocker) = blocker {
          let reason = format!("upstream resource '{}' did not complete", self.graph.name(blocker));
          reports[id.index()] = Some(self.skip(&run_id, id, None, reason));
          continue;
        }

        let upstream_stale = dependencies
          .iter()
          .any(|dep| outcome_of(&reports, *dep) == Some(Outcome::Applied));
        let previous = previous[id.index()];

        let run = run.clone();
        spawned.push(id);
        handles.push(tokio::spawn(async move {
          run.evaluate(id, previous, upstream_stale).await
        }));
      }

      let results = futures::future::join_all(handles).await;

      for (id, result) in spawned.into_iter().zip(results) {
        let evaluation = result.unwrap_or_else(|e| Evaluation::Failed {
          reason: None,
          error: format!("resource task panicked: {}", e),
        });
        if matches!(evaluation, Evaluation::Cancelled { .. }) {
          cancelled = true;
        }
        if let Evaluation::Applied { fingerprint, .. } = &evaluation {
          batch.put(self.graph.name(id), *fingerprint);
        }
        reports[id.index()] = Some(self.record(&run_id, id, evaluation));
      }
    }

    let reports: Vec<ResourceReport> = self
      .graph
      .iter()
      .zip(reports)
      .map(|(handle, report)| match report {
        Some(report) => report,
        None => self.skip(&run_id, handle.id(), None, "run cancelled".to_string()),
      })
      .collect();

    let status = if cancelled {
      RunStatus::Cancelled
    } else if reports.iter().any(|r| r.outcome == Outcome::Failed) {
      RunStatus::Failed
    } else {
      RunStatus::Succeeded
    };

    let committed = if status == RunStatus::Cancelled && !self.config.commit_on_cancel {
      info!(run_id = %run_id, staged = batch.len(), "commit_discarded");
      false
    } else if batch.is_empty() {
      false
    } else {
      self.enter_phase(&run_id, RunPhase::Committing);
      let staged = batch.len();
      if let Err(e) = self.store.commit(batch).await {
        error!(run_id = %run_id, error = %e, "commit_failed");
        self.finish(&run_id, RunPhase::Failed, RunStatus::Failed);
        return Err(e.into());
      }
      info!(run_id = %run_id, records = staged, "commit_completed");
      true
    };

    let phase = match status {
      RunStatus::Succeeded => RunPhase::Done,
      RunStatus::Failed | RunStatus::Cancelled => RunPhase::Failed,
    };
    info!(run_id = %run_id, status = ?status, committed, "run_finished");
    self.finish(&run_id, phase, status);

    Ok(RunReport {
      run_id,
      status,
      committed,
      resources: reports,
    })
  }

  /// Classify every resource without applying or committing anything.
  ///
  /// Stale resources are assumed to apply successfully, so their consumers
  /// are reported as stale too.
  #[instrument(name = "scheduler_plan", skip(self), fields(resources = self.graph.len()))]
  pub async fn plan(&self) -> Result<Plan, SchedulerError> {
    let order = self.graph.topological_order()?;
    let cache = StateCache::new(self.graph.len());
    let mut actions: Vec<Option<PlannedAction>> = vec![None; self.graph.len()];

    for id in order {
      let dependencies = self.graph.dependencies(id);
      let blocker = dependencies.iter().copied().find(|dep| {
        matches!(
          actions[dep.index()],
          Some(PlannedAction::Fail { .. } | PlannedAction::Skip { .. })
        )
      });
      if let Some(blocker) = blocker {
        actions[id.index()] = Some(PlannedAction::Skip {
          blocked_by: self.graph.name(blocker).to_string(),
        });
        continue;
      }

      let upstream_stale = dependencies
        .iter()
        .any(|dep| matches!(actions[dep.index()], Some(PlannedAction::Apply { .. })));
      let previous = self
        .store
        .get(self.graph.name(id))
        .await?
        .map(|record| record.fingerprint);

      let resource = self.graph.resource(id);
      let ctx = self.graph.context(id);
      let action = match classify(id, resource.as_ref(), &ctx, previous, upstream_stale, &cache).await {
        Ok(Classification::Fresh) => PlannedAction::Fresh,
        Ok(Classification::Stale(reason)) => PlannedAction::Apply { reason },
        Err(e) => PlannedAction::Fail {
          error: e.to_string(),
        },
      };
      actions[id.index()] = Some(action);
    }

    let resources = self
      .graph
      .iter()
      .zip(actions)
      .map(|(handle, action)| PlannedResource {
        name: handle.name().to_string(),
        kind: handle.kind().to_string(),
        action: action.unwrap_or(PlannedAction::Fresh),
      })
      .collect();

    Ok(Plan { resources })
  }

  /// Order the graph and load every previous state.
  async fn prepare(
    &self,
  ) -> Result<(Vec<Vec<ResourceId>>, Vec<Option<Fingerprint>>), SchedulerError> {
    let layers = self.graph.independent_layers()?;

    let mut previous = Vec::with_capacity(self.graph.len());
    for handle in self.graph.iter() {
      let record = self.store.get(handle.name()).await?;
      previous.push(record.map(|record| record.fingerprint));
    }

    Ok((layers, previous))
  }

  fn record(&self, run_id: &str, id: ResourceId, evaluation: Evaluation) -> ResourceReport {
    let name = self.graph.name(id);
    match evaluation {
      Evaluation::Fresh => {
        info!(run_id = %run_id, resource = %name, "resource_fresh");
        self.notifier.notify(RunEvent::ResourceFresh {
          run_id: run_id.to_string(),
          resource: name.to_string(),
        });
        self.report(id, Outcome::Fresh, None, None)
      }
      Evaluation::Applied {
        reason,
        fingerprint,
      } => {
        info!(run_id = %run_id, resource = %name, fingerprint = %fingerprint, "resource_applied");
        self.notifier.notify(RunEvent::ResourceApplied {
          run_id: run_id.to_string(),
          resource: name.to_string(),
          fingerprint,
        });
        self.report(id, Outcome::Applied, Some(reason), None)
      }
      Evaluation::Failed { reason, error } => {
        error!(run_id = %run_id, resource = %name, error = %error, "resource_failed");
        self.notifier.notify(RunEvent::ResourceFailed {
          run_id: run_id.to_string(),
          resource: name.to_string(),
          error: error.clone(),
        });
        self.report(id, Outcome::Failed, reason, Some(error))
      }
      Evaluation::Cancelled { reason } => self.skip(run_id, id, reason, "run cancelled".to_string()),
    }
  }

  fn skip(
    &self,
    run_id: &str,
    id: ResourceId,
    stale: Option<StaleReason>,
    reason: String,
  ) -> ResourceReport {
    let name = self.graph.name(id);
    info!(run_id = %run_id, resource = %name, reason = %reason, "resource_skipped");
    self.notifier.notify(RunEvent::ResourceSkipped {
      run_id: run_id.to_string(),
      resource: name.to_string(),
      reason,
    });
    self.report(id, Outcome::Skipped, stale, None)
  }

  fn report(
    &self,
    id: ResourceId,
    outcome: Outcome,
    reason: Option<StaleReason>,
    error: Option<String>,
  ) -> ResourceReport {
    let handle = self.graph.handle(id);
    ResourceReport {
      name: handle.name().to_string(),
      kind: handle.kind().to_string(),
      outcome,
      reason,
      error,
    }
  }

  fn enter_phase(&self, run_id: &str, phase: RunPhase) {
    self.notifier.notify(RunEvent::PhaseChanged {
      run_id: run_id.to_string(),
      phase,
    });
  }

  fn finish(&self, run_id: &str, phase: RunPhase, status: RunStatus) {
    self.enter_phase(run_id, phase);
    self.notifier.notify(RunEvent::RunFinished {
      run_id: run_id.to_string(),
      status,
    });
  }
}

fn outcome_of(reports: &[Option<ResourceReport>], id: ResourceId) -> Option<Outcome> {
  reports[id.index()].as_ref().map(|r| r.outcome)
}

/// Aborts the timeout task when the run ends first.
struct Deadline(JoinHandle<()>);

impl Drop for Deadline {
  fn drop(&mut self) {
    self.0.abort();
  }
}

/// Result of evaluating one resource inside a worker task.
enum Evaluation {
  Fresh,
  Applied {
    reason: StaleReason,
    fingerprint: Fingerprint,
  },
  Failed {
    reason: Option<StaleReason>,
    error: String,
  },
  /// Stale, but the run was cancelled before it could be applied.
  Cancelled { reason: Option<StaleReason> },
}

/// State shared by the worker tasks of one run.
struct RunContext<N> {
  run_id: String,
  graph: Arc<ResourceGraph>,
  cache: StateCache,
  notifier: Arc<N>,
  cancel: CancellationToken,
  permits: Semaphore,
}

impl<N: RunNotifier> RunContext<N> {
  async fn evaluate(
    &self,
    id: ResourceId,
    previous: Option<Fingerprint>,
    upstream_stale: bool,
  ) -> Evaluation {
    let Ok(_permit) = self.permits.acquire().await else {
      return Evaluation::Cancelled { reason: None };
    };

    let name = self.graph.name(id);
    let resource = self.graph.resource(id);
    let ctx = self.graph.context(id);

    let reason = match classify(
      id,
      resource.as_ref(),
      &ctx,
      previous,
      upstream_stale,
      &self.cache,
    )
    .await
    {
      Ok(Classification::Fresh) => return Evaluation::Fresh,
      Ok(Classification::Stale(reason)) => reason,
      Err(e) => {
        return Evaluation::Failed {
          reason: None,
          error: e.to_string(),
        };
      }
    };

    if self.cancel.is_cancelled() {
      return Evaluation::Cancelled {
        reason: Some(reason),
      };
    }

    info!(run_id = %self.run_id, resource = %name, reason = ?reason, "resource_started");
    self.notifier.notify(RunEvent::ResourceStarted {
      run_id: self.run_id.clone(),
      resource: name.to_string(),
      reason,
    });

    if let Err(e) = resource.apply(&ctx).await {
      return Evaluation::Failed {
        reason: Some(reason),
        error: e.to_string(),
      };
    }

    let observed = resource.current_state(&ctx).await;
    self.cache.replace(id, observed.clone()).await;
    match observed {
      Ok(fingerprint) => Evaluation::Applied {
        reason,
        fingerprint,
      },
      Err(e) => Evaluation::Failed {
        reason: Some(reason),
        error: e.to_string(),
      },
    }
  }
}
