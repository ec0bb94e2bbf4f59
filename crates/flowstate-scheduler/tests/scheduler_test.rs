//! Integration tests for the scheduler using in-memory resources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flowstate_graph::{GraphError, ResourceGraph};
use flowstate_resource::{
  CommandResource, FileResource, Fingerprint, Resource, ResourceContext, ResourceError,
};
use flowstate_scheduler::{
  ChannelNotifier, Outcome, PlannedAction, RunEvent, RunPhase, RunReport, RunStatus,
  Scheduler, SchedulerConfig, SchedulerError, StaleReason,
};
use flowstate_store::{
  FsStateStore, MemoryStateStore, StateBatch, StateRecord, StateStore, StoreError,
};
use tokio_util::sync::CancellationToken;

/// Shared content of a test resource, with call counters.
#[derive(Debug, Default)]
struct Slot {
  content: Mutex<Option<String>>,
  observations: AtomicUsize,
  applies: AtomicUsize,
}

impl Slot {
  fn with(content: &str) -> Arc<Self> {
    let slot = Arc::new(Self::default());
    slot.set(content);
    slot
  }

  fn empty() -> Arc<Self> {
    Arc::new(Self::default())
  }

  fn set(&self, content: &str) {
    *self.content.lock().unwrap() = Some(content.to_string());
  }

  fn clear(&self) {
    *self.content.lock().unwrap() = None;
  }

  fn content(&self) -> Option<String> {
    self.content.lock().unwrap().clone()
  }

  fn observations(&self) -> usize {
    self.observations.load(Ordering::SeqCst)
  }

  fn applies(&self) -> usize {
    self.applies.load(Ordering::SeqCst)
  }
}

/// Tracks how many applies run at the same time.
#[derive(Debug, Default)]
struct Gauge {
  current: AtomicUsize,
  peak: AtomicUsize,
}

impl Gauge {
  fn enter(&self) {
    let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
  }

  fn exit(&self) {
    self.current.fetch_sub(1, Ordering::SeqCst);
  }

  fn peak(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }
}

/// A resource whose state is the hash of its slot content.
///
/// Applying it derives the content from its input slot (if any), or writes
/// a fixed value when there is no content yet.
#[derive(Debug)]
struct TestResource {
  slot: Arc<Slot>,
  input: Option<Arc<Slot>>,
  fail_apply: bool,
  must_exist: bool,
  delay: Duration,
  gauge: Option<Arc<Gauge>>,
}

impl TestResource {
  fn new(slot: &Arc<Slot>) -> Self {
    Self {
      slot: slot.clone(),
      input: None,
      fail_apply: false,
      must_exist: false,
      delay: Duration::ZERO,
      gauge: None,
    }
  }

  fn reading(mut self, input: &Arc<Slot>) -> Self {
    self.input = Some(input.clone());
    self
  }

  fn failing(mut self) -> Self {
    self.fail_apply = true;
    self
  }

  fn required(mut self) -> Self {
    self.must_exist = true;
    self
  }

  fn slow(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  fn gauged(mut self, gauge: &Arc<Gauge>) -> Self {
    self.gauge = Some(gauge.clone());
    self
  }
}

#[async_trait]
impl Resource for TestResource {
  fn kind(&self) -> &'static str {
    "test"
  }

  async fn current_state(&self, ctx: &ResourceContext<'_>) -> Result<Fingerprint, ResourceError> {
    self.slot.observations.fetch_add(1, Ordering::SeqCst);
    match self.slot.content() {
      Some(content) => Ok(Fingerprint::of_bytes(content)),
      None => Err(ResourceError::state_unavailable(ctx.name(), "no content")),
    }
  }

  async fn apply(&self, ctx: &ResourceContext<'_>) -> Result<(), ResourceError> {
    self.slot.applies.fetch_add(1, Ordering::SeqCst);
    if let Some(gauge) = &self.gauge {
      gauge.enter();
    }
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    if let Some(gauge) = &self.gauge {
      gauge.exit();
    }

    if self.fail_apply {
      return Err(ResourceError::apply(ctx.name(), "boom"));
    }
    match &self.input {
      Some(input) => {
        let upstream = input.content().unwrap_or_default();
        self.slot.set(&format!("from:{}", upstream));
      }
      None if self.slot.content().is_none() => self.slot.set("built"),
      None => {}
    }
    Ok(())
  }

  fn must_exist(&self) -> bool {
    self.must_exist
  }
}

/// A store whose commits always fail.
#[derive(Default)]
struct FailingStore {
  inner: MemoryStateStore,
  commits: AtomicUsize,
}

#[async_trait]
impl StateStore for FailingStore {
  async fn get(&self, name: &str) -> Result<Option<StateRecord>, StoreError> {
    self.inner.get(name).await
  }

  async fn commit(&self, _batch: StateBatch) -> Result<(), StoreError> {
    self.commits.fetch_add(1, Ordering::SeqCst);
    Err(StoreError::StorageUnavailable(std::io::Error::other("disk full")))
  }

  async fn list(&self) -> Result<Vec<(String, StateRecord)>, StoreError> {
    self.inner.list().await
  }
}

/// `a -> b -> c`, where each consumer derives its content from its producer.
struct Chain {
  a: Arc<Slot>,
  b: Arc<Slot>,
  c: Arc<Slot>,
  graph: ResourceGraph,
}

fn chain() -> Chain {
  let (a, b, c) = (Slot::with("x"), Slot::empty(), Slot::empty());
  let mut graph = ResourceGraph::new("/work");
  graph.register("a", TestResource::new(&a)).unwrap();
  graph.register("b", TestResource::new(&b).reading(&a)).unwrap();
  graph.register("c", TestResource::new(&c).reading(&b)).unwrap();
  graph.add_dependency("b", "a").unwrap();
  graph.add_dependency("c", "b").unwrap();
  Chain { a, b, c, graph }
}

fn memory_store() -> Arc<MemoryStateStore> {
  Arc::new(MemoryStateStore::new())
}

async fn stored(store: &dyn StateStore, name: &str) -> Option<Fingerprint> {
  store.get(name).await.unwrap().map(|r| r.fingerprint)
}

#[tokio::test]
async fn test_first_run_applies_everything() {
  let Chain { a, b, c, graph } = chain();
  let store = memory_store();
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());

  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.status, RunStatus::Succeeded);
  assert!(report.committed);
  assert_eq!(report.applied(), vec!["a", "b", "c"]);
  assert!(
    report
      .resources
      .iter()
      .all(|r| r.reason == Some(StaleReason::NoPreviousState))
  );

  // Consumers ran after their producers.
  assert_eq!(c.content().as_deref(), Some("from:from:x"));
  assert_eq!(stored(store.as_ref(), "a").await, Some(Fingerprint::of_bytes("x")));
  assert_eq!(stored(store.as_ref(), "c").await, Some(Fingerprint::of_bytes("from:from:x")));
  assert_eq!((a.applies(), b.applies(), c.applies()), (1, 1, 1));
}

#[tokio::test]
async fn test_second_run_is_fresh() {
  let Chain { a, b, c, graph } = chain();
  let scheduler = Scheduler::new(graph, memory_store(), SchedulerConfig::default());

  scheduler.run(CancellationToken::new()).await.unwrap();
  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.status, RunStatus::Succeeded);
  assert!(!report.committed);
  assert_eq!(report.with_outcome(Outcome::Fresh), vec!["a", "b", "c"]);
  assert_eq!((a.applies(), b.applies(), c.applies()), (1, 1, 1));
}

#[tokio::test]
async fn test_change_propagates_downstream() {
  let Chain { a, b, c, mut graph } = chain();
  let other = Slot::with("unrelated");
  graph.register("other", TestResource::new(&other)).unwrap();
  let store = memory_store();
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());
  scheduler.run(CancellationToken::new()).await.unwrap();

  a.set("y");
  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.applied(), vec!["a", "b", "c"]);
  assert_eq!(report.outcome("other"), Some(Outcome::Fresh));
  let reasons: Vec<_> = report.resources.iter().map(|r| r.reason).collect();
  assert_eq!(
    reasons,
    vec![
      Some(StaleReason::ContentChanged),
      Some(StaleReason::UpstreamStale),
      Some(StaleReason::UpstreamStale),
      None,
    ]
  );
  assert_eq!(c.content().as_deref(), Some("from:from:y"));
  assert_eq!(stored(store.as_ref(), "b").await, Some(Fingerprint::of_bytes("from:y")));
  assert_eq!((b.applies(), other.applies()), (2, 1));
}

#[tokio::test]
async fn test_cycle_aborts_before_any_apply() {
  let (a, b) = (Slot::with("a"), Slot::with("b"));
  let mut graph = ResourceGraph::new("/work");
  graph.register("a", TestResource::new(&a)).unwrap();
  graph.register("b", TestResource::new(&b)).unwrap();
  graph.add_dependency("a", "b").unwrap();
  graph.add_dependency("b", "a").unwrap();
  let store = memory_store();
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());

  let err = scheduler.run(CancellationToken::new()).await.unwrap_err();

  assert!(matches!(
    err,
    SchedulerError::Graph(GraphError::CyclicDependency { .. })
  ));
  assert_eq!((a.applies(), b.applies()), (0, 0));
  assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failure_skips_consumers_only() {
  let (a, b, c) = (Slot::empty(), Slot::empty(), Slot::with("c"));
  let mut graph = ResourceGraph::new("/work");
  graph.register("a", TestResource::new(&a).failing()).unwrap();
  graph.register("b", TestResource::new(&b).reading(&a)).unwrap();
  graph.register("c", TestResource::new(&c)).unwrap();
  graph.add_dependency("b", "a").unwrap();
  let store = memory_store();
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());

  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.status, RunStatus::Failed);
  assert_eq!(report.outcome("a"), Some(Outcome::Failed));
  assert_eq!(report.outcome("b"), Some(Outcome::Skipped));
  assert_eq!(report.outcome("c"), Some(Outcome::Applied));
  assert!(report.resources[0].error.as_deref().unwrap().contains("boom"));
  assert_eq!(b.applies(), 0);

  // Only the applied resource was committed.
  assert!(report.committed);
  assert_eq!(stored(store.as_ref(), "a").await, None);
  assert_eq!(stored(store.as_ref(), "b").await, None);
  assert_eq!(stored(store.as_ref(), "c").await, Some(Fingerprint::of_bytes("c")));
}

#[tokio::test]
async fn test_state_observed_at_most_once_per_run() {
  let (a, b, c) = (Slot::with("a"), Slot::with("b"), Slot::with("c"));
  let mut graph = ResourceGraph::new("/work");
  graph.register("a", TestResource::new(&a)).unwrap();
  graph.register("b", TestResource::new(&b)).unwrap();
  graph.register("c", TestResource::new(&c)).unwrap();
  graph.add_dependency("b", "a").unwrap();
  graph.add_dependency("c", "a").unwrap();
  let scheduler = Scheduler::new(graph, memory_store(), SchedulerConfig::default());

  // First run: no previous record, so only the post-apply observation.
  scheduler.run(CancellationToken::new()).await.unwrap();
  assert_eq!((a.observations(), b.observations(), c.observations()), (1, 1, 1));

  // Second run: one pre-apply observation each, none after (nothing applied).
  scheduler.run(CancellationToken::new()).await.unwrap();
  assert_eq!((a.observations(), b.observations(), c.observations()), (2, 2, 2));
}

#[tokio::test]
async fn test_cancelled_before_start_applies_nothing() {
  let Chain { a, graph, .. } = chain();
  let store = memory_store();
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());
  let cancel = CancellationToken::new();
  cancel.cancel();

  let report = scheduler.run(cancel).await.unwrap();

  assert_eq!(report.status, RunStatus::Cancelled);
  assert!(!report.committed);
  assert_eq!(report.skipped(), vec!["a", "b", "c"]);
  assert_eq!(a.applies(), 0);
  assert!(store.list().await.unwrap().is_empty());
}

fn slow_chain(delay: Duration) -> (Arc<Slot>, Arc<Slot>, ResourceGraph) {
  let (a, b) = (Slot::empty(), Slot::empty());
  let mut graph = ResourceGraph::new("/work");
  graph.register("a", TestResource::new(&a).slow(delay)).unwrap();
  graph.register("b", TestResource::new(&b).reading(&a)).unwrap();
  graph.add_dependency("b", "a").unwrap();
  (a, b, graph)
}

#[tokio::test]
async fn test_cancel_mid_run_discards_commit() {
  let (a, b, graph) = slow_chain(Duration::from_millis(100));
  let store = memory_store();
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());
  let cancel = CancellationToken::new();

  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(20)).await;
    trigger.cancel();
  });
  let report = scheduler.run(cancel).await.unwrap();

  // The in-flight apply finished; its consumer never started.
  assert_eq!(report.status, RunStatus::Cancelled);
  assert_eq!(report.outcome("a"), Some(Outcome::Applied));
  assert_eq!(report.outcome("b"), Some(Outcome::Skipped));
  assert_eq!((a.applies(), b.applies()), (1, 0));
  assert!(!report.committed);
  assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commit_on_cancel_keeps_applied_states() {
  let (_a, _b, graph) = slow_chain(Duration::from_millis(100));
  let store = memory_store();
  let config = SchedulerConfig {
    commit_on_cancel: true,
    ..SchedulerConfig::default()
  };
  let scheduler = Scheduler::new(graph, store.clone(), config);
  let cancel = CancellationToken::new();

  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(20)).await;
    trigger.cancel();
  });
  let report = scheduler.run(cancel).await.unwrap();

  assert_eq!(report.status, RunStatus::Cancelled);
  assert!(report.committed);
  assert_eq!(stored(store.as_ref(), "a").await, Some(Fingerprint::of_bytes("built")));
  assert_eq!(stored(store.as_ref(), "b").await, None);
}

#[tokio::test]
async fn test_timeout_cancels_run() {
  let (_a, b, graph) = slow_chain(Duration::from_millis(200));
  let config = SchedulerConfig {
    timeout: Some(Duration::from_millis(20)),
    ..SchedulerConfig::default()
  };
  let scheduler = Scheduler::new(graph, memory_store(), config);

  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.status, RunStatus::Cancelled);
  assert_eq!(report.outcome("b"), Some(Outcome::Skipped));
  assert_eq!(b.applies(), 0);
}

#[tokio::test]
async fn test_storage_failure_is_fatal() {
  let Chain { graph, .. } = chain();
  let store = Arc::new(FailingStore::default());
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());

  let err = scheduler.run(CancellationToken::new()).await.unwrap_err();

  assert!(matches!(err, SchedulerError::Storage(StoreError::StorageUnavailable(_))));
  assert_eq!(store.commits.load(Ordering::SeqCst), 1);
  assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreadable_state_is_stale() {
  let a = Slot::with("a");
  let mut graph = ResourceGraph::new("/work");
  graph.register("a", TestResource::new(&a)).unwrap();
  let store = memory_store();
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());
  scheduler.run(CancellationToken::new()).await.unwrap();

  a.clear();
  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.outcome("a"), Some(Outcome::Applied));
  assert_eq!(report.resources[0].reason, Some(StaleReason::StateUnavailable));
  assert_eq!(stored(store.as_ref(), "a").await, Some(Fingerprint::of_bytes("built")));
}

#[tokio::test]
async fn test_missing_required_resource_fails() {
  let (input, out) = (Slot::with("in"), Slot::empty());
  let mut graph = ResourceGraph::new("/work");
  graph.register("input", TestResource::new(&input).required()).unwrap();
  graph.register("out", TestResource::new(&out).reading(&input)).unwrap();
  graph.add_dependency("out", "input").unwrap();
  let scheduler = Scheduler::new(graph, memory_store(), SchedulerConfig::default());
  scheduler.run(CancellationToken::new()).await.unwrap();

  input.clear();
  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.status, RunStatus::Failed);
  assert_eq!(report.outcome("input"), Some(Outcome::Failed));
  assert_eq!(report.outcome("out"), Some(Outcome::Skipped));
  assert_eq!(out.applies(), 1);
}

#[tokio::test]
async fn test_parallelism_is_bounded() {
  let gauge = Arc::new(Gauge::default());
  let mut graph = ResourceGraph::new("/work");
  for name in ["a", "b", "c", "d"] {
    let resource = TestResource::new(&Slot::empty())
      .slow(Duration::from_millis(30))
      .gauged(&gauge);
    graph.register(name, resource).unwrap();
  }
  let config = SchedulerConfig {
    max_parallel: 2,
    ..SchedulerConfig::default()
  };
  let scheduler = Scheduler::new(graph, memory_store(), config);

  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.applied(), vec!["a", "b", "c", "d"]);
  assert_eq!(gauge.peak(), 2);
}

#[tokio::test]
async fn test_sequential_runs_one_at_a_time() {
  let gauge = Arc::new(Gauge::default());
  let mut graph = ResourceGraph::new("/work");
  for name in ["a", "b", "c"] {
    let resource = TestResource::new(&Slot::empty())
      .slow(Duration::from_millis(10))
      .gauged(&gauge);
    graph.register(name, resource).unwrap();
  }
  let scheduler = Scheduler::new(graph, memory_store(), SchedulerConfig::sequential());

  scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(gauge.peak(), 1);
}

#[tokio::test]
async fn test_events_are_emitted() {
  let Chain { graph, .. } = chain();
  let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
  let scheduler = Scheduler::new(graph, memory_store(), SchedulerConfig::default())
    .with_notifier(ChannelNotifier::new(tx));

  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }

  assert!(matches!(
    events.first(),
    Some(RunEvent::RunStarted { resources: 3, .. })
  ));
  assert!(matches!(
    events.last(),
    Some(RunEvent::RunFinished {
      status: RunStatus::Succeeded,
      ..
    })
  ));
  let phases: Vec<RunPhase> = events
    .iter()
    .filter_map(|e| match e {
      RunEvent::PhaseChanged { phase, .. } => Some(*phase),
      _ => None,
    })
    .collect();
  assert_eq!(
    phases,
    vec![
      RunPhase::Planning,
      RunPhase::Executing,
      RunPhase::Committing,
      RunPhase::Done
    ]
  );
  let applied = events
    .iter()
    .filter(|e| matches!(e, RunEvent::ResourceApplied { .. }))
    .count();
  assert_eq!(applied, 3);
  assert!(events.iter().all(|e| match e {
    RunEvent::RunStarted { run_id, .. }
    | RunEvent::PhaseChanged { run_id, .. }
    | RunEvent::ResourceStarted { run_id, .. }
    | RunEvent::ResourceFresh { run_id, .. }
    | RunEvent::ResourceApplied { run_id, .. }
    | RunEvent::ResourceFailed { run_id, .. }
    | RunEvent::ResourceSkipped { run_id, .. }
    | RunEvent::RunFinished { run_id, .. } => *run_id == report.run_id,
  }));
}

#[tokio::test]
async fn test_plan_is_a_dry_run() {
  let Chain { a, b, graph, .. } = chain();
  let store = memory_store();
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());
  scheduler.run(CancellationToken::new()).await.unwrap();
  let before = store.list().await.unwrap();

  assert!(scheduler.plan().await.unwrap().is_up_to_date());

  a.set("changed");
  let plan = scheduler.plan().await.unwrap();

  assert_eq!(
    plan.action("a"),
    Some(&PlannedAction::Apply {
      reason: StaleReason::ContentChanged
    })
  );
  assert_eq!(
    plan.action("c"),
    Some(&PlannedAction::Apply {
      reason: StaleReason::UpstreamStale
    })
  );
  assert_eq!(plan.to_apply(), vec!["a", "b", "c"]);
  assert_eq!(b.applies(), 1);
  assert_eq!(store.list().await.unwrap(), before);
}

/// `build` runs a shell command that creates `out.txt`.
fn build_graph(root: &std::path::Path) -> Arc<ResourceGraph> {
  let mut graph = ResourceGraph::new(root);
  graph
    .register(
      "build",
      CommandResource::new("printf hello > out.txt").creating("out.txt"),
    )
    .unwrap();
  graph.register("out.txt", FileResource::new("out.txt")).unwrap();
  graph.add_dependency("out.txt", "build").unwrap();
  Arc::new(graph)
}

fn reason(report: &RunReport, name: &str) -> Option<StaleReason> {
  report
    .resources
    .iter()
    .find(|r| r.name == name)
    .and_then(|r| r.reason)
}

#[tokio::test]
async fn test_command_and_file_on_disk() {
  let dir = tempfile::tempdir().unwrap();
  let state_path = dir.path().join("state").join("build.state.json");

  let graph = build_graph(dir.path());

  let store: Arc<dyn StateStore> = Arc::new(FsStateStore::open(&state_path).await.unwrap());
  let scheduler = Scheduler::new(graph.clone(), store, SchedulerConfig::default());
  let report = scheduler.run(CancellationToken::new()).await.unwrap();
  assert_eq!(report.applied(), vec!["build", "out.txt"]);
  assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hello");

  // A fresh process reading the same state file sees nothing to do.
  let store: Arc<dyn StateStore> = Arc::new(FsStateStore::open(&state_path).await.unwrap());
  let scheduler = Scheduler::new(graph, store.clone(), SchedulerConfig::default());
  let report = scheduler.run(CancellationToken::new()).await.unwrap();
  assert_eq!(report.with_outcome(Outcome::Fresh), vec!["build", "out.txt"]);
  assert_eq!(
    stored(store.as_ref(), "out.txt").await,
    Some(Fingerprint::of_bytes("hello"))
  );
}

#[tokio::test]
async fn test_deleted_output_reruns_producer() {
  let dir = tempfile::tempdir().unwrap();
  let out = dir.path().join("out.txt");
  let scheduler = Scheduler::new(
    build_graph(dir.path()),
    memory_store(),
    SchedulerConfig::default(),
  );
  scheduler.run(CancellationToken::new()).await.unwrap();

  std::fs::remove_file(&out).unwrap();
  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.status, RunStatus::Succeeded);
  assert_eq!(report.applied(), vec!["build", "out.txt"]);
  assert_eq!(reason(&report, "build"), Some(StaleReason::StateUnavailable));
  assert_eq!(reason(&report, "out.txt"), Some(StaleReason::UpstreamStale));
  assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello");

  let report = scheduler.run(CancellationToken::new()).await.unwrap();
  assert_eq!(report.with_outcome(Outcome::Fresh), vec!["build", "out.txt"]);
}

#[tokio::test]
async fn test_edited_output_is_rebuilt() {
  let dir = tempfile::tempdir().unwrap();
  let out = dir.path().join("out.txt");
  let store = memory_store();
  let scheduler = Scheduler::new(
    build_graph(dir.path()),
    store.clone(),
    SchedulerConfig::default(),
  );
  scheduler.run(CancellationToken::new()).await.unwrap();

  std::fs::write(&out, "edited by hand").unwrap();
  let report = scheduler.run(CancellationToken::new()).await.unwrap();

  assert_eq!(report.applied(), vec!["build", "out.txt"]);
  assert_eq!(reason(&report, "build"), Some(StaleReason::ContentChanged));
  assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello");
  assert_eq!(
    stored(store.as_ref(), "out.txt").await,
    Some(Fingerprint::of_bytes("hello"))
  );
}
