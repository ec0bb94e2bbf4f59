//! Flowstate Resource
//!
//! This crate provides the resource abstraction for flowstate. A resource is
//! any named node of a workflow (a file on disk, a database row, a task) that
//! can report a content-derived [`Fingerprint`] of its current state.
//!
//! Concrete kinds implement the [`Resource`] trait:
//! - `current_state` is required and must not mutate anything
//! - `apply` is optional and is the only state-changing operation
//!
//! Two kinds are shipped for use by the workflow loader: [`FileResource`]
//! and [`CommandResource`].

mod command;
mod context;
mod error;
mod file;
mod fingerprint;
mod resource;

pub use command::CommandResource;
pub use context::ResourceContext;
pub use error::{FingerprintError, ResourceError};
pub use file::FileResource;
pub use fingerprint::{BLOCK_SIZE, Fingerprint};
pub use resource::Resource;
