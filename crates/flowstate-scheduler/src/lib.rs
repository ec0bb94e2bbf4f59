//! Flowstate Scheduler
//!
//! This crate drives a [`ResourceGraph`](flowstate_graph::ResourceGraph) to
//! an up-to-date state. A run:
//! - orders the graph into layers of independent resources (cycles abort
//!   the run before anything is applied)
//! - classifies each resource as fresh or stale against the state store,
//!   observing each current state at most once per run
//! - applies stale resources, concurrently within a layer, skipping the
//!   consumers of anything that failed
//! - commits every newly applied state in one atomic batch
//!
//! Progress is reported through [`RunEvent`]s delivered to a [`RunNotifier`].

mod cache;
mod config;
mod error;
mod events;
mod plan;
mod report;
mod scheduler;

pub use cache::StateCache;
pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use events::{ChannelNotifier, NoopNotifier, RunEvent, RunNotifier};
pub use plan::{Plan, PlannedAction, PlannedResource};
pub use report::{Outcome, ResourceReport, RunPhase, RunReport, RunStatus, StaleReason};
pub use scheduler::Scheduler;
